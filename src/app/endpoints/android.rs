use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::app::adb::reset::ResetWorkflow;
use crate::app::adb::runner::ProcessRunner;
use crate::app::device::DeviceRegistry;
use crate::app::endpoints::{dispatch, Endpoint};
use crate::app::error::AppError;
use crate::app::models::Message;
use crate::app::scheduler::DeviceLocks;


type Handler = fn(&AndroidEndpoint, &Message, &str) -> Result<Message, AppError>;

const ROUTES: &[(&str, Handler)] = &[
    ("/android/clearApp", AndroidEndpoint::clear_app as Handler),
    ("/android/get_activities", AndroidEndpoint::get_activities as Handler),
    ("/android/get_current_activity", AndroidEndpoint::get_current_activity as Handler),
    ("/android/grant_runtime_permissions", AndroidEndpoint::grant_runtime_permissions as Handler),
    ("/android/launch_representation_layer", AndroidEndpoint::launch_representation_layer as Handler),
];

/// Device-control requests under `/android`.
pub struct AndroidEndpoint {
    devices: Arc<DeviceRegistry>,
    runner: Arc<dyn ProcessRunner>,
    adb_program: String,
    reset_locks: DeviceLocks,
}

impl AndroidEndpoint {
    pub fn new(
        devices: Arc<DeviceRegistry>,
        runner: Arc<dyn ProcessRunner>,
        adb_program: impl Into<String>,
    ) -> Self {
        Self {
            devices,
            runner,
            adb_program: adb_program.into(),
            reset_locks: DeviceLocks::new(),
        }
    }

    fn clear_app(&self, request: &Message, trace_id: &str) -> Result<Message, AppError> {
        let device_id = request.require("deviceId", trace_id)?;
        let device = self.devices.resolve(device_id, trace_id)?;

        let lock = self.reset_locks.device_lock(device_id);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let workflow =
            ResetWorkflow::new(self.runner.as_ref(), &self.adb_program, device_id, trace_id);
        match workflow.run(device.package_name()) {
            Ok(()) => Ok(Message::new("/android/clearApp")),
            Err(diagnostic) => {
                warn!(trace_id, device_id, error = %diagnostic, "clearing app failed");
                Ok(Message::error(diagnostic))
            }
        }
    }

    fn get_activities(&self, request: &Message, trace_id: &str) -> Result<Message, AppError> {
        let device_id = request.require("deviceId", trace_id)?;
        let device = self.devices.resolve(device_id, trace_id)?;
        let activities = device.activities(trace_id)?.join("\n");

        Ok(Message::new("/android/get_activities").with_parameter("activities", activities))
    }

    fn get_current_activity(&self, request: &Message, trace_id: &str) -> Result<Message, AppError> {
        let device_id = request.require("deviceId", trace_id)?;
        let device = self.devices.resolve(device_id, trace_id)?;
        let activity = device.current_activity(trace_id)?;

        Ok(Message::new("/android/get_current_activity").with_parameter("activity", activity))
    }

    /// A failed grant is reported as `response = "false"`, never as an error message.
    fn grant_runtime_permissions(
        &self,
        request: &Message,
        trace_id: &str,
    ) -> Result<Message, AppError> {
        let device_id = request.require("deviceId", trace_id)?;
        let package_name = request.require("packageName", trace_id)?;
        let device = self.devices.resolve(device_id, trace_id)?;

        let granted = device.grant_permissions(package_name, trace_id);
        info!(trace_id, device_id, package_name, granted, "granted runtime permissions");

        Ok(Message::new("/android/grant_runtime_permissions")
            .with_parameter("response", granted.to_string()))
    }

    fn launch_representation_layer(
        &self,
        request: &Message,
        trace_id: &str,
    ) -> Result<Message, AppError> {
        let device_id = request.require("deviceId", trace_id)?;
        let device = self.devices.resolve(device_id, trace_id)?;

        // The layer may not be running yet, so a failed kill is expected and not reported.
        let killed = device.kill_representation_layer(trace_id);
        debug!(trace_id, device_id, killed, "stopped representation layer");
        let launched = device.launch_representation_layer(trace_id);
        info!(trace_id, device_id, launched, "launched representation layer");

        Ok(Message::new("/android/launch_representation_layer")
            .with_parameter("response", launched.to_string()))
    }
}

impl Endpoint for AndroidEndpoint {
    fn handle(&self, request: &Message, trace_id: &str) -> Result<Message, AppError> {
        dispatch(self, ROUTES, request, trace_id)
    }
}
