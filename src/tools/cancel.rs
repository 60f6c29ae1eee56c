//! Cancellation and Process-Tree Termination
//!
//! The runner places every child in its own process group (a new process
//! group on Windows too), so the whole tree, background jobs included, can
//! be killed as a unit. Killing is fire-and-forget: the runner keeps waiting
//! for the child's own exit notification.

use tracing::{debug, info, warn};

/// Reacts to the external abort signal for one run
///
/// Armed with the child's process id right after spawning and dropped once
/// the run loop observes exit, so the listener never outlives the run.
#[derive(Debug)]
pub struct CancellationController {
    pid: Option<u32>,
    fired: bool,
}

impl CancellationController {
    /// Arm the controller for the process tree rooted at `pid`
    pub fn arm(pid: Option<u32>) -> Self {
        Self { pid, fired: false }
    }

    /// Whether a termination has already been requested
    pub fn fired(&self) -> bool {
        self.fired
    }

    /// Handle the abort signal
    ///
    /// Issues a forceful tree kill if the process has not exited yet and a
    /// process id is known. Returns whether a kill was issued. Repeated calls,
    /// and calls after exit, do nothing.
    pub fn on_abort(&mut self, exited: bool) -> bool {
        if self.fired || exited {
            debug!("Abort ignored (fired: {}, exited: {})", self.fired, exited);
            return false;
        }

        match self.pid {
            Some(pid) => {
                self.fired = true;
                info!(pid, "Cancellation requested, killing process tree");
                kill_process_tree(pid);
                crate::metrics::PROCESS_TREE_KILLS_TOTAL.inc();
                true
            }
            None => false,
        }
    }
}

/// Forcefully terminate the process tree rooted at `pid`
///
/// On Unix this sends SIGKILL to the process group led by `pid`.
#[cfg(unix)]
pub fn kill_process_tree(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        warn!(pid, "Process id out of range, cannot kill process group");
        return;
    };

    // SAFETY: killpg only sends a signal; a stale or foreign pgid makes it
    // fail with ESRCH/EPERM, which is reported below.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        warn!(pid, "Failed to kill process group: {}", err);
    }
}

/// Forcefully terminate the process tree rooted at `pid`
///
/// On Windows this launches `taskkill /T /F` without waiting for it.
#[cfg(windows)]
pub fn kill_process_tree(pid: u32) {
    let spawned = std::process::Command::new("taskkill")
        .args(["/pid", &pid.to_string(), "/T", "/F"])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn();

    if let Err(e) = spawned {
        warn!(pid, "Failed to launch taskkill: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_without_pid_is_noop() {
        let mut controller = CancellationController::arm(None);
        assert!(!controller.on_abort(false));
        assert!(!controller.fired());
    }

    #[test]
    fn test_abort_after_exit_is_noop() {
        let mut controller = CancellationController::arm(Some(u32::MAX));
        assert!(!controller.on_abort(true));
        assert!(!controller.fired());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_abort_kills_process_group_once() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .process_group(0)
            .spawn()
            .unwrap();

        let mut controller = CancellationController::arm(child.id());
        assert!(controller.on_abort(false));
        assert!(controller.fired());

        // second signal is a no-op
        assert!(!controller.on_abort(false));

        let status = child.wait().await.unwrap();
        assert!(!status.success());
    }

    /// Live, non-zombie process
    #[cfg(unix)]
    fn process_running(pid: libc::pid_t) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit_once(") ")
                .map_or(true, |(_, rest)| !rest.starts_with('Z')),
            Err(_) if std::path::Path::new("/proc/self").exists() => false,
            Err(_) => unsafe { libc::kill(pid, 0) == 0 },
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_process_tree_reaches_grandchildren() {
        use std::os::unix::process::ExitStatusExt;
        use std::time::{Duration, Instant};
        use tokio::io::{AsyncBufReadExt, BufReader};

        // bash reports its background sleep and waits on it
        let mut child = tokio::process::Command::new("bash")
            .args(["-c", "sleep 30 & echo $!; wait"])
            .stdout(std::process::Stdio::piped())
            .process_group(0)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();

        let stdout = child.stdout.take().unwrap();
        let mut line = String::new();
        BufReader::new(stdout).read_line(&mut line).await.unwrap();
        let grandchild: libc::pid_t = line.trim().parse().unwrap();
        assert!(process_running(grandchild));

        kill_process_tree(pid);

        let status = child.wait().await.unwrap();
        assert_eq!(status.signal(), Some(libc::SIGKILL));

        let deadline = Instant::now() + Duration::from_secs(2);
        while process_running(grandchild) {
            assert!(
                Instant::now() < deadline,
                "grandchild {} outlived the process group kill",
                grandchild
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
