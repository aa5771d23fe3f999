//! Scripted collaborators for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::app::adb::runner::ProcessRunner;
use crate::app::device::Device;
use crate::app::error::AppError;

type Script = Box<dyn Fn(&[String]) -> Result<Vec<String>, String> + Send + Sync>;

/// Records every invocation and answers `run_process` from a script. Spawning succeeds
/// unless `failing_spawns` set a diagnostic.
pub struct FakeRunner {
    script: Script,
    spawn_failure: Option<String>,
    calls: Mutex<Vec<Vec<String>>>,
    spawned: Mutex<Vec<Vec<String>>>,
    trace_ids: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&[String]) -> Result<Vec<String>, String> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            spawn_failure: None,
            calls: Mutex::new(Vec::new()),
            spawned: Mutex::new(Vec::new()),
            trace_ids: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_spawns(mut self, diagnostic: &str) -> Self {
        self.spawn_failure = Some(diagnostic.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn spawned(&self) -> Vec<Vec<String>> {
        self.spawned.lock().expect("spawned lock").clone()
    }

    /// Trace ids of every run and spawn, in call order.
    pub fn trace_ids(&self) -> Vec<String> {
        self.trace_ids.lock().expect("trace lock").clone()
    }
}

impl ProcessRunner for FakeRunner {
    fn run_process(
        &self,
        _program: &str,
        args: &[String],
        trace_id: &str,
    ) -> Result<Vec<String>, String> {
        self.trace_ids.lock().expect("trace lock").push(trace_id.to_string());
        self.calls.lock().expect("calls lock").push(args.to_vec());
        (self.script)(args)
    }

    fn spawn_process(&self, _program: &str, args: &[String], trace_id: &str) -> Result<(), String> {
        self.trace_ids.lock().expect("trace lock").push(trace_id.to_string());
        self.spawned.lock().expect("spawned lock").push(args.to_vec());
        match &self.spawn_failure {
            Some(diagnostic) => Err(diagnostic.clone()),
            None => Ok(()),
        }
    }
}

pub struct FakeDevice {
    pub id: String,
    pub package: String,
    pub activities: Vec<String>,
    pub current_activity: String,
    pub grant_result: bool,
    pub kill_result: bool,
    pub launch_result: bool,
    pub fail_queries: bool,
    pub granted: Mutex<Vec<String>>,
    pub kill_calls: AtomicUsize,
    pub launch_calls: AtomicUsize,
}

impl FakeDevice {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            package: "com.example".to_string(),
            activities: Vec::new(),
            current_activity: "com.example/com.example.MainActivity".to_string(),
            grant_result: true,
            kill_result: true,
            launch_result: true,
            fail_queries: false,
            granted: Mutex::new(Vec::new()),
            kill_calls: AtomicUsize::new(0),
            launch_calls: AtomicUsize::new(0),
        }
    }
}

impl Device for FakeDevice {
    fn device_id(&self) -> &str {
        &self.id
    }

    fn package_name(&self) -> &str {
        &self.package
    }

    fn activities(&self, trace_id: &str) -> Result<Vec<String>, AppError> {
        if self.fail_queries {
            return Err(AppError::dependency("device offline", trace_id));
        }
        Ok(self.activities.clone())
    }

    fn current_activity(&self, trace_id: &str) -> Result<String, AppError> {
        if self.fail_queries {
            return Err(AppError::dependency("device offline", trace_id));
        }
        Ok(self.current_activity.clone())
    }

    fn grant_permissions(&self, package_name: &str, _trace_id: &str) -> bool {
        self.granted
            .lock()
            .expect("granted lock")
            .push(package_name.to_string());
        self.grant_result
    }

    fn kill_representation_layer(&self, _trace_id: &str) -> bool {
        self.kill_calls.fetch_add(1, Ordering::SeqCst);
        self.kill_result
    }

    fn launch_representation_layer(&self, _trace_id: &str) -> bool {
        self.launch_calls.fetch_add(1, Ordering::SeqCst);
        self.launch_result
    }
}
