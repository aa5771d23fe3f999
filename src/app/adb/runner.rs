use std::io::Read;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::app::error::AppError;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// Runs external command lines on behalf of the device layer.
pub trait ProcessRunner: Send + Sync {
    /// Runs to completion. `Ok` carries the stdout lines, `Err` a diagnostic describing why
    /// the command did not succeed.
    fn run_process(&self, program: &str, args: &[String], trace_id: &str)
        -> Result<Vec<String>, String>;

    /// Starts the command and returns as soon as it is running.
    fn spawn_process(&self, program: &str, args: &[String], trace_id: &str) -> Result<(), String>;
}

pub struct AdbProcessRunner {
    timeout: Duration,
}

impl AdbProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ProcessRunner for AdbProcessRunner {
    fn run_process(
        &self,
        program: &str,
        args: &[String],
        trace_id: &str,
    ) -> Result<Vec<String>, String> {
        debug!(trace_id, program, args = ?args, "running process");
        let output = run_command_with_timeout(program, args, self.timeout, trace_id).map_err(|err| {
            warn!(trace_id = %err.trace_id, code = %err.code, error = %err.error, "process failed to run");
            err.error
        })?;
        output_to_result(output)
    }

    fn spawn_process(&self, program: &str, args: &[String], trace_id: &str) -> Result<(), String> {
        debug!(trace_id, program, args = ?args, "spawning process");
        spawn_detached(program, args, trace_id).map_err(|err| {
            warn!(trace_id = %err.trace_id, code = %err.code, error = %err.error, "process failed to spawn");
            err.error
        })
    }
}

fn output_to_result(output: CommandOutput) -> Result<Vec<String>, String> {
    if output.exit_code == Some(0) {
        return Ok(output.stdout.lines().map(str::to_string).collect());
    }
    let stderr = output.stderr.trim();
    if !stderr.is_empty() {
        return Err(stderr.to_string());
    }
    let stdout = output.stdout.trim();
    if !stdout.is_empty() {
        return Err(stdout.to_string());
    }
    match output.exit_code {
        Some(code) => Err(format!("Process exited with code {code}")),
        None => Err("Process terminated by signal".to_string()),
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buffer = Vec::<u8>::new();
        let mut temp = [0u8; 4096];
        loop {
            match reader.read(&mut temp) {
                Ok(0) => break,
                Ok(count) => buffer.extend_from_slice(&temp[..count]),
                Err(_) => break,
            }
        }
        buffer
    })
}

pub fn run_command_with_timeout(
    program: &str,
    args: &[String],
    timeout: Duration,
    trace_id: &str,
) -> Result<CommandOutput, AppError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| AppError::system(format!("Failed to spawn command: {err}"), trace_id))?;

    // Both pipes must be drained while waiting, or a chatty child blocks on a full buffer.
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stdout", trace_id))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stderr", trace_id))?;
    let stdout_handle = drain(stdout);
    let stderr_handle = drain(stderr);

    let start = Instant::now();
    let exit_code = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status.code(),
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = stdout_handle.join();
                    let _ = stderr_handle.join();
                    return Err(AppError::system(
                        format!("Command timed out after {}s: {program}", timeout.as_secs()),
                        trace_id,
                    ));
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(err) => {
                let _ = stdout_handle.join();
                let _ = stderr_handle.join();
                return Err(AppError::system(
                    format!("Failed to poll command: {err}"),
                    trace_id,
                ));
            }
        }
    };

    let stdout_bytes = stdout_handle.join().unwrap_or_default();
    let stderr_bytes = stderr_handle.join().unwrap_or_default();

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&stdout_bytes).to_string(),
        stderr: String::from_utf8_lossy(&stderr_bytes).to_string(),
        exit_code,
    })
}

/// Starts a command without waiting for it. Used for long-lived device-side processes such as
/// an instrumentation run.
pub fn spawn_detached(program: &str, args: &[String], trace_id: &str) -> Result<(), AppError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|err| AppError::system(format!("Failed to spawn command: {err}"), trace_id))?;
    // Reap the child once it exits.
    std::thread::spawn(move || {
        let _ = child.wait();
    });
    Ok(())
}
