use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::app::models::DeviceSummary;

pub const UNKNOWN_ACTIVITY: &str = "unknown";

pub fn parse_adb_devices(output: &str) -> Vec<DeviceSummary> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.trim_start().starts_with('*'))
        .filter(|line| !line.to_lowercase().contains("list of devices"))
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 2 {
                return None;
            }
            let model = tokens
                .iter()
                .skip(2)
                .find_map(|token| token.strip_prefix("model:"))
                .map(str::to_string);
            Some(DeviceSummary {
                serial: tokens[0].to_string(),
                state: tokens[1].to_string(),
                model,
            })
        })
        .collect()
}

/// Flattens `ls -R` output into file paths.
///
/// A line ending in `:` switches the current directory. Every other non-empty line names an
/// entry of that directory. Entries seen before the first directory line are dropped.
pub fn parse_ls_recursive<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let mut paths = Vec::new();
    let mut current_dir: Option<String> = None;
    for line in lines {
        let line = line.as_ref();
        if line.is_empty() {
            continue;
        }
        if let Some(dir) = line.strip_suffix(':') {
            current_dir = Some(dir.to_string());
        } else if let Some(dir) = current_dir.as_deref() {
            paths.push(format!("{dir}/{line}"));
        }
    }
    paths
}

fn component_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([A-Za-z0-9_.]+)/(\.?[A-Za-z0-9_.$]+)").expect("valid component regex")
    })
}

fn expand_component(package: &str, class: &str) -> String {
    if class.starts_with('.') {
        format!("{package}/{package}{class}")
    } else {
        format!("{package}/{class}")
    }
}

/// Collects the activity components of `package_name` from `dumpsys package` output, in
/// first-seen order. Only the activity resolver table is considered.
pub fn parse_package_activities<S: AsRef<str>>(package_name: &str, lines: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut activities = Vec::new();
    let mut in_activity_table = false;
    for line in lines {
        let line = line.as_ref();
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        // Table headers sit at column zero, entries are indented.
        if !line.starts_with(' ') {
            in_activity_table = trimmed.starts_with("Activity Resolver Table");
            continue;
        }
        if !in_activity_table {
            continue;
        }
        for caps in component_regex().captures_iter(trimmed) {
            if &caps[1] != package_name {
                continue;
            }
            let component = expand_component(&caps[1], &caps[2]);
            if seen.insert(component.clone()) {
                activities.push(component);
            }
        }
    }
    activities
}

/// Extracts the resumed activity component from `dumpsys activity activities` output.
pub fn parse_resumed_activity<S: AsRef<str>>(lines: &[S]) -> Option<String> {
    lines
        .iter()
        .map(|line| line.as_ref().trim())
        .filter(|line| {
            line.starts_with("mResumedActivity")
                || line.starts_with("topResumedActivity")
                || line.starts_with("ResumedActivity")
        })
        .find_map(|line| {
            component_regex()
                .captures(line)
                .map(|caps| expand_component(&caps[1], &caps[2]))
        })
}
