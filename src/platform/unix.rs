use tokio::process::Command;
use tracing::debug;

use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;

/// Return the user's default shell from `$SHELL`, falling back to `sh`.
fn user_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "sh".to_string())
}

pub fn shell_command(command: &str) -> Command {
    let shell = user_shell();
    let mut cmd = Command::new(&shell);
    // Login shell (-l) sources the user's profile/rc files so that
    // PATH and other environment customisations are available.
    cmd.arg("-l").arg("-c").arg(command);
    cmd
}

pub fn configure_process_group(cmd: &mut Command) {
    cmd.process_group(0);
}

pub fn is_process_alive(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

pub fn terminate_group(pid: u32) {
    match killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => debug!(pid, "sent SIGTERM to process group"),
        Err(nix::errno::Errno::ESRCH) => debug!(pid, "process group already exited"),
        Err(e) => {
            debug!(pid, error = %e, "killpg failed, sending SIGTERM to pid only");
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }
    }
}
