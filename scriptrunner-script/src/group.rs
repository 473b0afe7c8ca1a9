//! Whole-tree cleanup for the interpreter.
//!
//! The interpreter is spawned as the leader of its own process group, so
//! everything it starts (a JVM behind a launcher script, a shell's
//! background jobs) can be killed with a single `killpg`.

use tokio::process::{Child, Command};

/// Make the spawned child lead a fresh process group.
pub(crate) fn isolate(command: &mut Command) {
    #[cfg(unix)]
    command.process_group(0);

    #[cfg(not(unix))]
    let _ = command;
}

/// Kills the child's process group when dropped, unless disarmed.
///
/// Dropped on timeout and when the surrounding task is aborted. On platforms
/// without process groups only `kill_on_drop` applies.
#[derive(Debug)]
pub(crate) struct GroupGuard {
    pgid: Option<i32>,
}

impl GroupGuard {
    pub(crate) fn leading(child: &Child) -> Self {
        Self {
            pgid: child.id().and_then(|id| i32::try_from(id).ok()),
        }
    }

    /// The run finished normally; leave its group alone.
    pub(crate) fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };

        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
                Ok(()) => tracing::debug!(pgid, "Killed interpreter process group"),
                Err(Errno::ESRCH) => {}
                Err(err) => tracing::warn!(pgid, error = %err, "Could not kill interpreter process group"),
            }
        }

        #[cfg(not(unix))]
        tracing::debug!(pgid, "Interpreter stopped via kill_on_drop");
    }
}
