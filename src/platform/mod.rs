use tokio::process::Command;

#[cfg(unix)]
mod unix;

#[cfg(unix)]
use unix as imp;

/// Create a platform-appropriate shell command: `$SHELL -l -c <command>`.
pub fn shell_command(command: &str) -> Command {
    imp::shell_command(command)
}

/// Configure the command to run in its own process group so signals can be
/// delivered to the whole tree.
pub fn configure_process_group(cmd: &mut Command) {
    imp::configure_process_group(cmd)
}

/// Check if a process with the given PID is still alive.
pub fn is_process_alive(pid: u32) -> bool {
    imp::is_process_alive(pid)
}

/// Send SIGTERM to a process group rooted at `pid`.
pub fn terminate_group(pid: u32) {
    imp::terminate_group(pid)
}
