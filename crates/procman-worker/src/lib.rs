//! Worker-protocol driver: spawns `./process <name>`, wraps its stdin/stdout
//! pipes, and drives it through the four synchronous protocol operations —
//! `start`, `suspend`, `continue`, `terminate`.
//!
//! `Worker` is the generic seam the scheduler cycle engine depends on, the
//! same way a hardware abstraction layer decouples a kernel core from the
//! concrete device underneath it: [`ChildWorker`] is the real implementation
//! over an OS child process; a pure in-memory fake lives in `procman-sim`'s
//! test module for property tests that shouldn't need to fork real
//! processes.

use std::io::{Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("io error talking to worker: {0}")]
    Io(#[from] std::io::Error),
    #[error("signal/wait error: {0}")]
    Signal(#[from] nix::Error),
    #[error("worker echoed byte {got:#04x}, expected {expected:#04x} (protocol mismatch)")]
    ProtocolMismatch { expected: u8, got: u8 },
    #[error("worker exited unexpectedly instead of stopping")]
    UnexpectedExit,
    #[error("failed to spawn worker process: {0}")]
    Spawn(std::io::Error),
}

/// Big-endian encoding of a simulated time value, as carried on the wire.
pub fn be_bytes(t: u32) -> [u8; 4] {
    t.to_be_bytes()
}

/// The generic seam between the scheduler cycle engine and a worker
/// implementation (real child process, or a test double).
pub trait Worker: Sized {
    fn spawn(name: &str) -> Result<Self, WorkerError>;
    fn start(&mut self, t: u32) -> Result<(), WorkerError>;
    fn suspend(&mut self, t: u32) -> Result<(), WorkerError>;
    fn continue_(&mut self, t: u32) -> Result<(), WorkerError>;
    /// Consumes the handle: the worker process and its pipes are gone after
    /// this returns, successfully or not.
    fn terminate(self, t: u32) -> Result<String, WorkerError>;
}

/// A real spawned `./process <name>` child, with its pipes and PID.
pub struct ChildWorker {
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
    pid: Pid,
}

impl ChildWorker {
    fn write_time(&mut self, t: u32) -> Result<(), WorkerError> {
        let bytes = be_bytes(t);
        self.stdin.write_all(&bytes)?;
        self.stdin.flush()?;
        Ok(())
    }

    fn read_ack(&mut self, expected_lsb: u8) -> Result<(), WorkerError> {
        let mut buf = [0u8; 1];
        self.stdout.read_exact(&mut buf)?;
        if buf[0] != expected_lsb {
            return Err(WorkerError::ProtocolMismatch {
                expected: expected_lsb,
                got: buf[0],
            });
        }
        Ok(())
    }
}

impl Worker for ChildWorker {
    fn spawn(name: &str) -> Result<Self, WorkerError> {
        let mut child = Command::new("./process")
            .arg(name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(WorkerError::Spawn)?;

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");
        let pid = Pid::from_raw(child.id() as i32);

        log::debug!("spawned worker {name} as pid {pid}");
        Ok(ChildWorker {
            child,
            stdin,
            stdout,
            pid,
        })
    }

    fn start(&mut self, t: u32) -> Result<(), WorkerError> {
        self.write_time(t)?;
        self.read_ack(be_bytes(t)[3])
    }

    fn suspend(&mut self, t: u32) -> Result<(), WorkerError> {
        self.write_time(t)?;
        kill(self.pid, Signal::SIGTSTP)?;
        loop {
            match waitpid(self.pid, Some(WaitPidFlag::WUNTRACED))? {
                WaitStatus::Stopped(_, _) => return Ok(()),
                WaitStatus::Exited(..) | WaitStatus::Signaled(..) => {
                    return Err(WorkerError::UnexpectedExit)
                }
                // spurious wakeup (e.g. WaitStatus::Continued/StillAlive) — loop and retry.
                _ => continue,
            }
        }
    }

    fn continue_(&mut self, t: u32) -> Result<(), WorkerError> {
        self.write_time(t)?;
        kill(self.pid, Signal::SIGCONT)?;
        self.read_ack(be_bytes(t)[3])
    }

    fn terminate(mut self, t: u32) -> Result<String, WorkerError> {
        self.write_time(t)?;
        kill(self.pid, Signal::SIGTERM)?;

        let mut digest = [0u8; 64];
        self.stdout.read_exact(&mut digest)?;

        // Reap the child so it doesn't linger as a zombie; a worker that
        // doesn't exit promptly after SIGTERM is the external binary's bug,
        // not ours to work around.
        let _ = self.child.wait();

        Ok(String::from_utf8_lossy(&digest).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn be_bytes_matches_big_endian_encoding() {
        assert_eq!(be_bytes(0x01020304), [0x01, 0x02, 0x03, 0x04]);
        assert_eq!(be_bytes(3215)[3], (3215u32 & 0xFF) as u8);
    }
}
