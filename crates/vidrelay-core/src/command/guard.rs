//! RAII guard that kills a child's whole process group when dropped.

/// Sends SIGKILL to the process group led by the child unless disarmed.
///
/// Children are spawned as group leaders, so tools that fork helpers
/// (the retrieval tool shelling out to a muxer) are torn down together.
pub(super) struct ProcessGroupGuard {
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    pub(super) fn new(pid: Option<u32>) -> Self {
        Self { pgid: pid }
    }

    /// The process exited on its own; nothing to kill.
    pub(super) fn disarm(mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };
        #[cfg(unix)]
        {
            // SAFETY: killpg only sends a signal; a stale group id yields ESRCH.
            let rc = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
            if rc == 0 {
                tracing::debug!(pgid, "killed process group");
            }
        }
        #[cfg(not(unix))]
        {
            // kill_on_drop on the direct child is all we can do here.
            tracing::debug!(pgid, "process group kill unsupported on this platform");
        }
    }
}
