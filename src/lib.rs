pub mod app;

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use app::adb::locator::{resolve_adb_program, validate_adb_program};
use app::adb::runner::{AdbProcessRunner, ProcessRunner};
use app::config::ServerConfig;
use app::device::{discover_device_ids, AdbDevice, DeviceRegistry};
use app::endpoints::{AndroidEndpoint, PropertiesEndpoint, Router};
use app::error::AppError;

/// Wires the endpoints to their collaborators. Prefixes are tried in registration order.
pub fn build_router(
    config: &ServerConfig,
    devices: Arc<DeviceRegistry>,
    runner: Arc<dyn ProcessRunner>,
    adb_program: &str,
) -> Router {
    Router::new()
        .register(
            "/android",
            Arc::new(AndroidEndpoint::new(devices, runner, adb_program)),
        )
        .register(
            "/properties",
            Arc::new(PropertiesEndpoint::new(&config.properties_path)),
        )
}

/// Registers the configured devices, or every online device when none are configured.
pub fn register_devices(
    config: &ServerConfig,
    registry: &DeviceRegistry,
    runner: Arc<dyn ProcessRunner>,
    adb_program: &str,
    trace_id: &str,
) -> Result<usize, AppError> {
    let device_ids = if config.app.device_ids.is_empty() {
        discover_device_ids(runner.as_ref(), adb_program, trace_id).map_err(|err| {
            AppError::dependency(format!("Failed to list devices: {err}"), trace_id)
        })?
    } else {
        config.app.device_ids.clone()
    };
    if config.app.package_name.trim().is_empty() {
        warn!(trace_id, "no application under test configured; clearApp will fail");
    }

    for device_id in &device_ids {
        info!(trace_id, device_id = %device_id, package_name = %config.app.package_name, "registering device");
        registry.register(Arc::new(AdbDevice::new(
            device_id.clone(),
            config.app.package_name.clone(),
            adb_program,
            config.permissions.clone(),
            config.representation.clone(),
            Arc::clone(&runner),
        )));
    }
    Ok(device_ids.len())
}

pub fn run(config: ServerConfig) -> Result<(), AppError> {
    let trace_id = "startup";
    let adb_program = resolve_adb_program(&config.adb.command_path);
    validate_adb_program(&adb_program).map_err(|message| AppError::validation(message, trace_id))?;

    let runner: Arc<dyn ProcessRunner> = Arc::new(AdbProcessRunner::new(Duration::from_secs(
        config.adb.command_timeout_secs,
    )));
    let devices = Arc::new(DeviceRegistry::new());
    let registered = register_devices(&config, &devices, Arc::clone(&runner), &adb_program, trace_id)?;
    if registered == 0 {
        warn!(trace_id, "no online devices found");
    }

    let router = build_router(&config, devices, runner, &adb_program);
    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .map_err(|err| AppError::system(format!("Failed to bind {address}: {err}"), trace_id))?;
    app::server::serve(listener, Arc::new(router))
}
