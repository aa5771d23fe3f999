use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use crate::app::adb::parse::{
    parse_adb_devices, parse_package_activities, parse_resumed_activity, UNKNOWN_ACTIVITY,
};
use crate::app::adb::runner::ProcessRunner;
use crate::app::config::RepresentationSettings;
use crate::app::error::AppError;

/// A live device session as seen by the endpoints.
pub trait Device: Send + Sync {
    fn device_id(&self) -> &str;

    /// Package name of the application under test.
    fn package_name(&self) -> &str;

    fn activities(&self, trace_id: &str) -> Result<Vec<String>, AppError>;

    fn current_activity(&self, trace_id: &str) -> Result<String, AppError>;

    fn grant_permissions(&self, package_name: &str, trace_id: &str) -> bool;

    fn kill_representation_layer(&self, trace_id: &str) -> bool;

    fn launch_representation_layer(&self, trace_id: &str) -> bool;
}

pub struct AdbDevice {
    device_id: String,
    package_name: String,
    adb_program: String,
    permissions: Vec<String>,
    representation: RepresentationSettings,
    runner: Arc<dyn ProcessRunner>,
}

impl AdbDevice {
    pub fn new(
        device_id: impl Into<String>,
        package_name: impl Into<String>,
        adb_program: impl Into<String>,
        permissions: Vec<String>,
        representation: RepresentationSettings,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            package_name: package_name.into(),
            adb_program: adb_program.into(),
            permissions,
            representation,
            runner,
        }
    }

    fn shell_args(&self, command: &[&str]) -> Vec<String> {
        let mut args = vec![
            "-s".to_string(),
            self.device_id.clone(),
            "shell".to_string(),
        ];
        args.extend(command.iter().map(|part| part.to_string()));
        args
    }

    fn shell(&self, command: &[&str], trace_id: &str) -> Result<Vec<String>, String> {
        self.runner
            .run_process(&self.adb_program, &self.shell_args(command), trace_id)
    }
}

impl Device for AdbDevice {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn package_name(&self) -> &str {
        &self.package_name
    }

    fn activities(&self, trace_id: &str) -> Result<Vec<String>, AppError> {
        let lines = self
            .shell(&["dumpsys", "package", &self.package_name], trace_id)
            .map_err(|err| {
                AppError::dependency(format!("Failed to dump package info: {err}"), trace_id)
            })?;
        Ok(parse_package_activities(&self.package_name, &lines))
    }

    fn current_activity(&self, trace_id: &str) -> Result<String, AppError> {
        let lines = self
            .shell(&["dumpsys", "activity", "activities"], trace_id)
            .map_err(|err| {
                AppError::dependency(format!("Failed to dump activity stack: {err}"), trace_id)
            })?;
        Ok(parse_resumed_activity(&lines).unwrap_or_else(|| UNKNOWN_ACTIVITY.to_string()))
    }

    fn grant_permissions(&self, package_name: &str, trace_id: &str) -> bool {
        let mut granted = true;
        for permission in &self.permissions {
            if let Err(err) = self.shell(&["pm", "grant", package_name, permission], trace_id) {
                warn!(trace_id, device_id = %self.device_id, permission = %permission, error = %err, "grant failed");
                granted = false;
            }
        }
        granted
    }

    fn kill_representation_layer(&self, trace_id: &str) -> bool {
        match self.shell(&["am", "force-stop", &self.representation.package], trace_id) {
            Ok(_) => true,
            Err(err) => {
                warn!(trace_id, device_id = %self.device_id, error = %err, "failed to stop representation layer");
                false
            }
        }
    }

    fn launch_representation_layer(&self, trace_id: &str) -> bool {
        let args = self.shell_args(&[
            "am",
            "instrument",
            "-w",
            "-e",
            "class",
            &self.representation.test_class,
            &self.representation.instrumentation_runner,
        ]);
        match self.runner.spawn_process(&self.adb_program, &args, trace_id) {
            Ok(()) => true,
            Err(err) => {
                warn!(trace_id, device_id = %self.device_id, error = %err, "failed to launch representation layer");
                false
            }
        }
    }
}

/// Device sessions keyed by device id. Lookups take a shared lock, so concurrent requests
/// against different devices do not contend.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, Arc<dyn Device>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, device: Arc<dyn Device>) -> Option<Arc<dyn Device>> {
        let mut guard = self
            .devices
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(device.device_id().to_string(), device)
    }

    pub fn get(&self, device_id: &str) -> Option<Arc<dyn Device>> {
        let guard = self
            .devices
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.get(device_id).cloned()
    }

    pub fn remove(&self, device_id: &str) -> Option<Arc<dyn Device>> {
        let mut guard = self
            .devices
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.remove(device_id)
    }

    pub fn device_ids(&self) -> Vec<String> {
        let guard = self
            .devices
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut ids: Vec<String> = guard.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Resolves a request's device id, failing with a validation error for unknown ids.
    pub fn resolve(&self, device_id: &str, trace_id: &str) -> Result<Arc<dyn Device>, AppError> {
        self.get(device_id)
            .ok_or_else(|| AppError::validation(format!("Unknown device: {device_id}"), trace_id))
    }
}

/// Lists online device serials reported by `adb devices -l`.
pub fn discover_device_ids(
    runner: &dyn ProcessRunner,
    adb_program: &str,
    trace_id: &str,
) -> Result<Vec<String>, String> {
    let args = ["devices".to_string(), "-l".to_string()];
    let lines = runner.run_process(adb_program, &args, trace_id)?;
    let devices = parse_adb_devices(&lines.join("\n"));
    for device in &devices {
        if device.is_online() {
            info!(trace_id, serial = %device.serial, model = device.model.as_deref().unwrap_or("unknown"), "found online device");
        } else {
            info!(trace_id, serial = %device.serial, state = %device.state, "skipping device that is not online");
        }
    }
    Ok(devices
        .into_iter()
        .filter(|device| device.is_online())
        .map(|device| device.serial)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{FakeDevice, FakeRunner};

    fn adb_device(runner: Arc<FakeRunner>) -> AdbDevice {
        AdbDevice::new(
            "emulator-5554",
            "com.example",
            "adb",
            vec![
                "android.permission.CAMERA".to_string(),
                "android.permission.READ_CONTACTS".to_string(),
            ],
            RepresentationSettings::default(),
            runner,
        )
    }

    #[test]
    fn activities_are_parsed_from_dumpsys() {
        let runner = Arc::new(FakeRunner::new(|_args| {
            Ok(vec![
                "Activity Resolver Table:".to_string(),
                "      1a2b3c com.example/.MainActivity filter 4d5e6f".to_string(),
            ])
        }));
        let device = adb_device(Arc::clone(&runner));
        let activities = device.activities("trace").expect("activities");
        assert_eq!(activities, vec!["com.example/com.example.MainActivity".to_string()]);
        assert_eq!(
            runner.calls()[0],
            vec!["-s", "emulator-5554", "shell", "dumpsys", "package", "com.example"]
        );
    }

    #[test]
    fn activity_query_failure_is_a_dependency_error() {
        let runner = Arc::new(FakeRunner::new(|_args| Err("device offline".to_string())));
        let device = adb_device(runner);
        let err = device.activities("trace-a").unwrap_err();
        assert_eq!(err.code, "ERR_DEPENDENCY");
        assert!(err.error.contains("device offline"));
        assert_eq!(device.current_activity("trace-a").unwrap_err().code, "ERR_DEPENDENCY");
    }

    #[test]
    fn current_activity_falls_back_to_unknown() {
        let runner = Arc::new(FakeRunner::new(|_args| Ok(vec!["no resumed".to_string()])));
        let device = adb_device(runner);
        assert_eq!(device.current_activity("trace").expect("activity"), UNKNOWN_ACTIVITY);
    }

    #[test]
    fn grant_reports_false_when_any_permission_fails() {
        let runner = Arc::new(FakeRunner::new(|args| {
            if args.last().map(String::as_str) == Some("android.permission.READ_CONTACTS") {
                Err("Exception occurred while executing 'grant'".to_string())
            } else {
                Ok(Vec::new())
            }
        }));
        let device = adb_device(Arc::clone(&runner));
        assert!(!device.grant_permissions("com.example", "trace-g"));
        assert_eq!(runner.calls().len(), 2);
        assert_eq!(runner.trace_ids(), vec!["trace-g", "trace-g"]);
    }

    #[test]
    fn launch_spawns_instrumentation_without_waiting() {
        let runner = Arc::new(FakeRunner::new(|_args| Ok(Vec::new())));
        let device = adb_device(Arc::clone(&runner));
        assert!(device.kill_representation_layer("trace-l"));
        assert!(device.launch_representation_layer("trace-l"));
        let spawned = runner.spawned();
        assert_eq!(spawned.len(), 1);
        assert!(spawned[0].contains(&"instrument".to_string()));
        assert_eq!(
            runner.calls()[0][3..],
            ["am", "force-stop", "org.mate.representation"]
        );
        assert_eq!(runner.trace_ids(), vec!["trace-l", "trace-l"]);
    }

    #[test]
    fn launch_reports_false_when_spawning_fails() {
        let runner = Arc::new(
            FakeRunner::new(|_args| Ok(Vec::new())).failing_spawns("Failed to spawn command: not found"),
        );
        let device = adb_device(Arc::clone(&runner));
        assert!(!device.launch_representation_layer("trace-f"));
        assert_eq!(runner.spawned().len(), 1);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn registry_registers_and_resolves() {
        let registry = DeviceRegistry::new();
        registry.register(Arc::new(FakeDevice::new("emulator-5556")));
        registry.register(Arc::new(FakeDevice::new("emulator-5554")));
        assert_eq!(registry.device_ids(), vec!["emulator-5554", "emulator-5556"]);
        assert!(registry.resolve("emulator-5554", "t").is_ok());

        let err = registry.resolve("missing", "trace-r").err().expect("unknown device");
        assert_eq!(err.code, "ERR_VALIDATION");
        assert_eq!(err.trace_id, "trace-r");

        assert!(registry.remove("emulator-5554").is_some());
        assert!(registry.get("emulator-5554").is_none());
    }

    #[test]
    fn discovers_only_online_devices() {
        let runner = FakeRunner::new(|_args| {
            Ok(vec![
                "List of devices attached".to_string(),
                "emulator-5554          device product:sdk model:Pixel".to_string(),
                "R58M                   offline".to_string(),
            ])
        });
        let ids = discover_device_ids(&runner, "adb", "trace-d").expect("ids");
        assert_eq!(ids, vec!["emulator-5554".to_string()]);
        assert_eq!(runner.trace_ids(), vec!["trace-d"]);
    }
}
