use std::path::PathBuf;

/// Per-project run-state directory: `~/.devdock/run/<project-name>`.
///
/// The heartbeat and watchdog PID files both live here; the paths are a
/// fixed function of the project name so that the foreground process and
/// the detached monitor agree without any handshake.
pub fn run_dir(project_name: &str) -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".devdock")
        .join("run")
        .join(project_name)
}

pub fn heartbeat_path(project_name: &str) -> PathBuf {
    run_dir(project_name).join("heartbeat")
}

pub fn watchdog_pid_path(project_name: &str) -> PathBuf {
    run_dir(project_name).join("watchdog.pid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_keyed_by_project_name() {
        let a = heartbeat_path("myapp-repo");
        let b = heartbeat_path("myapp-repo-feature-x");
        assert_ne!(a, b);
        assert!(a.ends_with("myapp-repo/heartbeat"));
        assert!(watchdog_pid_path("myapp-repo").ends_with("myapp-repo/watchdog.pid"));
    }
}
