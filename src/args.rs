//! Translation of a [`BuildConfiguration`] into CMake command lines.
//!
//! Nothing in here touches a subprocess; the functions only build token lists
//! that the runner later passes to the child as discrete argv entries.

use std::path::Path;

use crate::{
    cmake,
    config::{BuildConfiguration, non_empty},
};

/// Which CMake invocation to synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Configure,
    Build,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Configure => f.write_str("configure"),
            Phase::Build => f.write_str("build"),
        }
    }
}

/// Full command line for `phase`, sized for the current host.
pub fn command_line(config: &BuildConfiguration, phase: Phase) -> Vec<String> {
    command_line_for_host(config, phase, host_threads())
}

/// Full command line for `phase` on a host with `host_threads` logical processors.
pub fn command_line_for_host(
    config: &BuildConfiguration,
    phase: Phase,
    host_threads: usize,
) -> Vec<String> {
    let mut params = env_prefix(config);
    params.push(config.executable.clone());

    match phase {
        Phase::Configure => params.extend(configure_args(config)),
        Phase::Build => params.extend(build_args(config)),
    }

    let native = match phase {
        Phase::Configure => Vec::new(),
        Phase::Build => native_tool_args(config, host_threads),
    };
    if !native.is_empty() {
        params.push("--".to_string());
        params.extend(native);
    }

    params
}

/// `<exe> -E env K=V ...`, or nothing when no variables are set.
pub fn env_prefix(config: &BuildConfiguration) -> Vec<String> {
    if config.environment.is_empty() {
        return Vec::new();
    }

    let mut params = vec![config.executable.clone(), "-E".to_string(), "env".to_string()];
    params.extend(
        config
            .environment
            .iter()
            .map(|(key, value)| format!("{key}={value}")),
    );
    params
}

/// Configure-phase arguments following the executable token.
pub fn configure_args(config: &BuildConfiguration) -> Vec<String> {
    let mut params = Vec::new();

    if let Some(generator) = config.generator() {
        params.extend(["-G".to_string(), generator.to_string()]);
    }
    if let Some(platform) = non_empty(&config.platform) {
        params.extend(["-A".to_string(), platform.to_string()]);
    }
    if let Some(toolset) = non_empty(&config.toolset) {
        params.extend(["-T".to_string(), toolset.to_string()]);
    }
    if let Some(types) = non_empty(&config.configuration_types) {
        params.push(format!("-DCMAKE_CONFIGURATION_TYPES={types}"));
    }
    if let Some(prefix) = non_empty(&config.install_prefix) {
        params.push(format!("-DCMAKE_INSTALL_PREFIX={prefix}"));
    }
    if let Some(shared) = config.build_shared_libs {
        params.push(format!("-DBUILD_SHARED_LIBS={}", on_off(shared)));
    }
    if let Some(static_libs) = config.build_static_libs {
        params.push(format!("-DBUILD_STATIC_LIBS={}", on_off(static_libs)));
    }
    params.extend(
        config
            .definitions
            .iter()
            .map(|(key, value)| format!("-D{key}={value}")),
    );

    params.push(absolute(&config.source_folder));
    params
}

/// Build-phase arguments following the executable token.
///
/// The build directory is always `.` because the child runs inside the
/// working folder.
pub fn build_args(config: &BuildConfiguration) -> Vec<String> {
    let mut params = vec!["--build".to_string(), ".".to_string()];

    if let Some(build_config) = non_empty(&config.build_config) {
        params.extend(["--config".to_string(), build_config.to_string()]);
    }
    if let Some(target) = non_empty(&config.build_target) {
        params.extend(["--target".to_string(), target.to_string()]);
    }
    if config.build_clean {
        params.push("--clean-first".to_string());
    }

    params
}

/// Arguments for the generator's native tool, placed after `--`.
pub fn native_tool_args(config: &BuildConfiguration, host_threads: usize) -> Vec<String> {
    match config.generator() {
        Some(generator) if cmake::accepts_parallel_jobs(generator) => {
            let jobs = config
                .jobs
                .filter(|jobs| *jobs > 0)
                .unwrap_or_else(|| optimal_thread_count(host_threads));
            vec!["-j".to_string(), jobs.to_string()]
        }
        _ => Vec::new(),
    }
}

/// `max(min(n, 2), n - 2)`: keep two cores free on larger hosts without
/// starving machines that only have one or two.
pub fn optimal_thread_count(host_threads: usize) -> usize {
    host_threads.min(2).max(host_threads.saturating_sub(2))
}

/// Logical processors on this host, falling back to one.
pub fn host_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn on_off(flag: bool) -> &'static str {
    if flag { "ON" } else { "OFF" }
}

fn absolute(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}
