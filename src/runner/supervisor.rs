//! Per-run supervisor
//!
//! The spawned process forks once more before exec. The child goes on to
//! become the program; the parent stays behind as a child subreaper, so every
//! descendant of the program is reparented to it rather than to init, even
//! after `setsid` or `setpgid`. When the program exits, or the supervisor
//! receives SIGTERM, the supervisor kills and reaps all remaining descendants
//! and then exits with the program's status.
//!
//! Everything here runs between fork and exec: raw system calls only, no
//! allocation.

use std::io;

use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
use nix::libc;
use nix::sys::prctl;
use nix::sys::resource::{setrlimit, Resource};
use nix::sys::signal::{kill, killpg, sigprocmask, signal, SigHandler, SigSet, SigmaskHow, Signal};
use nix::sys::stat::Mode;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{close, fork, getpgrp, getpid, getppid, read, ForkResult, Pid};

/// Direct children of the calling thread, space separated
const CHILDREN_PATH: &str = "/proc/thread-self/children";

/// Highest descriptor closed when `close_range` is unavailable
const FALLBACK_FD_LIMIT: i32 = 4096;

/// Exit code of a supervisor stopped by SIGTERM
const TERMINATED_EXIT: i32 = 128 + Signal::SIGTERM as i32;

/// `pre_exec` hook: turn the spawned process into a supervisor and continue
/// into exec in its child
pub(crate) fn contain() -> io::Result<()> {
    let signals = supervisor_signals();
    let mut previous = SigSet::empty();
    // Blocked before the fork so a SIGTERM can never skip the cleanup
    sigprocmask(SigmaskHow::SIG_BLOCK, Some(&signals), Some(&mut previous))?;
    prctl::set_child_subreaper(true)?;

    let supervisor = getpid();
    // SAFETY: the process is single threaded between fork and exec
    match unsafe { fork() }? {
        ForkResult::Child => {
            sigprocmask(SigmaskHow::SIG_SETMASK, Some(&previous), None)?;
            prctl::set_pdeathsig(Signal::SIGKILL)?;
            if getppid() != supervisor {
                // The supervisor is already gone
                return Err(Errno::ESRCH.into());
            }
            Ok(())
        }
        ForkResult::Parent { child } => supervise(child, &signals),
    }
}

fn supervisor_signals() -> SigSet {
    let mut signals = SigSet::empty();
    signals.add(Signal::SIGCHLD);
    signals.add(Signal::SIGTERM);
    signals
}

fn supervise(program: Pid, signals: &SigSet) -> ! {
    // Holding no descriptors: output pipes close with the program's tree and
    // the exec status pipe reports as soon as the program has exec'd
    close_all_fds();
    let _ = setrlimit(Resource::RLIMIT_CORE, 0, 0);

    loop {
        if let Ok(Signal::SIGTERM) = signals.wait() {
            kill_descendants();
            exit(TERMINATED_EXIT);
        }
        if let Some(status) = reap(program) {
            kill_descendants();
            mirror(status);
        }
    }
}

/// Reap every exited child; returns the program's status once it has exited
fn reap(program: Pid) -> Option<WaitStatus> {
    let mut finished = None;
    loop {
        match waitpid(any_child(), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) | Err(_) => return finished,
            Ok(status) => {
                let terminated = matches!(
                    status,
                    WaitStatus::Exited(..) | WaitStatus::Signaled(..)
                );
                if terminated && status.pid() == Some(program) {
                    finished = Some(status);
                }
            }
        }
    }
}

/// Kill and reap descendants until none are left
fn kill_descendants() {
    loop {
        match waitpid(any_child(), Some(WaitPidFlag::WNOHANG)) {
            Err(Errno::ECHILD) => return,
            Ok(WaitStatus::StillAlive) => {}
            Ok(_) => continue,
            Err(_) => return,
        }

        if !kill_children() {
            // No child list: the process group is the best remaining scope,
            // and it includes this supervisor
            let _ = killpg(getpgrp(), Signal::SIGKILL);
        }
        // Killed children can fork no further; orphans of theirs come back here
        let _ = waitpid(any_child(), None);
    }
}

/// SIGKILL every direct child; false when the child list is unreadable
fn kill_children() -> bool {
    let Ok(fd) = open(CHILDREN_PATH, OFlag::O_RDONLY | OFlag::O_CLOEXEC, Mode::empty()) else {
        return false;
    };

    let mut buf = [0u8; 4096];
    let mut pid: i32 = 0;
    let mut digits = false;
    loop {
        let n = match read(fd, &mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        for &byte in &buf[..n] {
            if byte.is_ascii_digit() {
                pid = pid.saturating_mul(10).saturating_add(i32::from(byte - b'0'));
                digits = true;
            } else if digits {
                let _ = kill(Pid::from_raw(pid), Signal::SIGKILL);
                pid = 0;
                digits = false;
            }
        }
    }
    if digits {
        let _ = kill(Pid::from_raw(pid), Signal::SIGKILL);
    }

    let _ = close(fd);
    true
}

/// Exit the way the program did
fn mirror(status: WaitStatus) -> ! {
    match status {
        WaitStatus::Exited(_, code) => exit(code),
        WaitStatus::Signaled(_, sig, _) => {
            // SAFETY: resetting to the default disposition installs no handler
            let _ = unsafe { signal(sig, SigHandler::SigDfl) };
            let mut set = SigSet::empty();
            set.add(sig);
            let _ = sigprocmask(SigmaskHow::SIG_UNBLOCK, Some(&set), None);
            let _ = kill(getpid(), sig);
            exit(128 + sig as i32)
        }
        _ => exit(1),
    }
}

fn any_child() -> Pid {
    Pid::from_raw(-1)
}

fn close_all_fds() {
    // SAFETY: close_range takes no pointers
    let rc = unsafe {
        libc::syscall(
            libc::SYS_close_range,
            0 as libc::c_uint,
            libc::c_uint::MAX,
            0 as libc::c_uint,
        )
    };
    if rc != 0 {
        for fd in 0..FALLBACK_FD_LIMIT {
            let _ = close(fd);
        }
    }
}

fn exit(code: i32) -> ! {
    // SAFETY: _exit skips atexit handlers and stdio flushing, which belong to
    // the parent process image
    unsafe { libc::_exit(code) }
}
