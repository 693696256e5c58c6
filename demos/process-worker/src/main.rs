//! Reference implementation of the `./process <name>` worker contract.
//!
//! Exercises the full protocol from `procman-worker`: a blocking `start`
//! handshake on plain stdin/stdout, then `SIGTSTP`/`SIGCONT`/`SIGTERM`
//! handlers that do the rest of each op's pipe I/O. `SIGTSTP`, not the
//! uncatchable `SIGSTOP`, is what the driver actually sends for `suspend` —
//! catching it here lets the handler drain the 4-byte payload before
//! self-raising a real `SIGSTOP`, so the byte never lingers unread on the
//! pipe to corrupt the following `continue`'s ack read.
//!
//! All handler-side I/O uses raw `libc::read`/`write`, which are
//! async-signal-safe; none of it goes through buffered `std::io`.

use std::env;
use std::os::unix::io::RawFd;

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

const STDIN_FD: RawFd = 0;
const STDOUT_FD: RawFd = 1;

/// Blocking read of exactly `buf.len()` bytes from `fd`, retrying on `EINTR`.
/// Safe to call from a signal handler: only issues the raw `read` syscall.
fn read_exact_raw(fd: RawFd, buf: &mut [u8]) {
    let mut filled = 0;
    while filled < buf.len() {
        let n = unsafe {
            libc::read(
                fd,
                buf[filled..].as_mut_ptr() as *mut libc::c_void,
                buf.len() - filled,
            )
        };
        if n < 0 {
            let err = unsafe { *libc::__errno_location() };
            if err == libc::EINTR {
                continue;
            }
            unsafe { libc::_exit(1) };
        }
        if n == 0 {
            // EOF: the driver closed the pipe. Nothing sensible to do but exit.
            unsafe { libc::_exit(1) };
        }
        filled += n as usize;
    }
}

fn write_all_raw(fd: RawFd, buf: &[u8]) {
    let mut written = 0;
    while written < buf.len() {
        let n = unsafe {
            libc::write(
                fd,
                buf[written..].as_ptr() as *const libc::c_void,
                buf.len() - written,
            )
        };
        if n < 0 {
            let err = unsafe { *libc::__errno_location() };
            if err == libc::EINTR {
                continue;
            }
            unsafe { libc::_exit(1) };
        }
        written += n as usize;
    }
}

extern "C" fn on_sigtstp(_sig: libc::c_int) {
    let mut payload = [0u8; 4];
    read_exact_raw(STDIN_FD, &mut payload);
    // No ack on suspend. Deliver the real stop state the driver's
    // `waitpid(..., WUNTRACED)` is blocked on.
    unsafe {
        libc::raise(libc::SIGSTOP);
    }
}

extern "C" fn on_sigcont(_sig: libc::c_int) {
    let mut payload = [0u8; 4];
    read_exact_raw(STDIN_FD, &mut payload);
    write_all_raw(STDOUT_FD, &[payload[3]]);
}

extern "C" fn on_sigterm(_sig: libc::c_int) {
    let mut payload = [0u8; 4];
    read_exact_raw(STDIN_FD, &mut payload);
    let digest = digest_for(payload);
    write_all_raw(STDOUT_FD, &digest);
    unsafe {
        libc::_exit(0);
    }
}

/// A deterministic, non-cryptographic 64-byte ASCII digest derived from the
/// final payload. The driver treats this opaquely; only its length and byte
/// content matter for the transcript.
fn digest_for(payload: [u8; 4]) -> [u8; 64] {
    let seed = u32::from_be_bytes(payload);
    let mut out = [0u8; 64];
    for (i, byte) in out.iter_mut().enumerate() {
        let v = seed.wrapping_mul(2654435761).wrapping_add(i as u32);
        *byte = b'a' + (v % 26) as u8;
    }
    out
}

fn install_handler(signal: Signal, handler: extern "C" fn(libc::c_int)) {
    let action = SigAction::new(
        SigHandler::Handler(handler),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    unsafe {
        sigaction(signal, &action).expect("sigaction should succeed for a supported signal");
    }
}

fn main() {
    env_logger::init();
    let name = env::args().nth(1).unwrap_or_else(|| "worker".to_string());
    log::debug!("process-worker {name} starting, pid={}", std::process::id());

    install_handler(Signal::SIGTSTP, on_sigtstp);
    install_handler(Signal::SIGCONT, on_sigcont);
    install_handler(Signal::SIGTERM, on_sigterm);

    // `start(t)` has no signal: plain blocking handshake before the
    // signal-driven part of the protocol takes over.
    let mut payload = [0u8; 4];
    read_exact_raw(STDIN_FD, &mut payload);
    write_all_raw(STDOUT_FD, &[payload[3]]);
    log::debug!("process-worker {name} started");

    loop {
        unsafe {
            libc::pause();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_64_bytes_of_lowercase_ascii() {
        let d = digest_for([0, 0, 0, 42]);
        assert_eq!(d.len(), 64);
        assert!(d.iter().all(|&b| (b'a'..=b'z').contains(&b)));
    }

    #[test]
    fn digest_is_deterministic_per_payload() {
        assert_eq!(digest_for([0, 0, 1, 0]), digest_for([0, 0, 1, 0]));
        assert_ne!(digest_for([0, 0, 1, 0]), digest_for([0, 0, 2, 0]));
    }
}
