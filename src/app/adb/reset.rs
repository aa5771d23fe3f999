use tracing::{debug, info, warn};

use crate::app::adb::parse::parse_ls_recursive;
use crate::app::adb::runner::ProcessRunner;

pub const SHARED_STORAGE_ROOT: &str = "/sdcard/";
pub const COVERAGE_FILE: &str = "files/coverage.exec";

/// Returns an application under test to empty storage and prepares its coverage sink.
///
/// Steps run strictly in order and at most one bridge process is alive at a time. Clearing
/// package data, creating `files/` and creating the coverage file are fatal: the first failure
/// aborts the workflow and its diagnostic is returned verbatim. Nothing is rolled back, so a
/// failed reset leaves the device in an intermediate state. Shared-storage cleanup never fails
/// the workflow.
pub struct ResetWorkflow<'a> {
    runner: &'a dyn ProcessRunner,
    adb_program: &'a str,
    device_id: &'a str,
    trace_id: &'a str,
}

impl<'a> ResetWorkflow<'a> {
    pub fn new(
        runner: &'a dyn ProcessRunner,
        adb_program: &'a str,
        device_id: &'a str,
        trace_id: &'a str,
    ) -> Self {
        Self {
            runner,
            adb_program,
            device_id,
            trace_id,
        }
    }

    pub fn run(&self, package_name: &str) -> Result<(), String> {
        info!(trace_id = %self.trace_id, device_id = %self.device_id, package_name, "resetting application state");

        self.shell(&["pm", "clear", package_name])?;
        let deleted = self.clear_shared_storage();
        debug!(trace_id = %self.trace_id, device_id = %self.device_id, deleted, "shared storage cleanup finished");
        self.shell(&["run-as", package_name, "mkdir -p files"])?;
        self.shell(&["run-as", package_name, &format!("touch {COVERAGE_FILE}")])?;
        Ok(())
    }

    /// Deletes every non-directory entry under the shared storage root. Returns how many
    /// deletions were attempted.
    ///
    /// `rm` without `-r` fails on directories, which leaves them in place. Per-path failures
    /// are ignored, and a failed listing skips the cleanup entirely. Paths are quoted because
    /// the device shell re-splits the command line and file names come from the app under test.
    pub fn clear_shared_storage(&self) -> usize {
        let lines = match self.shell(&["ls", "-R", SHARED_STORAGE_ROOT]) {
            Ok(lines) => lines,
            Err(err) => {
                warn!(trace_id = %self.trace_id, device_id = %self.device_id, error = %err, "unable to list shared storage, skipping cleanup");
                return 0;
            }
        };

        let paths = parse_ls_recursive(&lines);
        for path in &paths {
            if let Err(err) = self.shell(&["rm", &shell_quote(path)]) {
                debug!(trace_id = %self.trace_id, device_id = %self.device_id, path = %path, error = %err, "rm failed");
            }
        }
        paths.len()
    }

    fn shell(&self, command: &[&str]) -> Result<Vec<String>, String> {
        let mut args = vec![
            "-s".to_string(),
            self.device_id.to_string(),
            "shell".to_string(),
        ];
        args.extend(command.iter().map(|part| part.to_string()));
        self.runner.run_process(self.adb_program, &args, self.trace_id)
    }
}

/// Wraps `raw` in single quotes for the device's `sh`, so blanks, globs and `$` stay literal.
pub fn shell_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "'\\''"))
}
