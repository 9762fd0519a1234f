use std::time::Duration;

use tokio::process::Child;
use tracing::debug;

/// How long a terminated process group gets before it is killed.
pub(crate) const TERM_TIMEOUT: Duration = Duration::from_secs(5);

/// SIGTERM the child's process group, then SIGKILL whatever is left after `timeout`.
#[cfg(target_family = "unix")]
pub(crate) async fn kill_graceful(child: &mut Child, timeout: Duration) -> std::io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };
    signal_group(pid, libc::SIGTERM);
    if tokio::time::timeout(timeout, child.wait()).await.is_ok() {
        debug!(target: "shipyard.exec", pid, "process group terminated");
        return Ok(());
    }
    signal_group(pid, libc::SIGKILL);
    child.kill().await
}

#[cfg(target_family = "unix")]
fn signal_group(pid: u32, signal: libc::c_int) {
    // Children are spawned as group leaders, so the negated pid names the whole group.
    let rc = unsafe { libc::kill(-(pid as libc::pid_t), signal) };
    if rc != 0 {
        debug!(target: "shipyard.exec", pid, signal, "signal delivery failed");
    }
}

#[cfg(target_family = "windows")]
pub(crate) async fn kill_graceful(child: &mut Child, _timeout: Duration) -> std::io::Result<()> {
    child.kill().await
}
