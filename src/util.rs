//! Shared utilities for the schemacheck codebase

use std::io;
use std::process::{Command, Output, Stdio};
use std::sync::mpsc;
use std::time::Duration;

/// How a time-bounded command ended.
#[derive(Debug)]
pub enum CmdOutcome {
    Completed(Output),
    TimedOut,
}

/// Kill the process group led by `pid`. Uses SIGKILL on Unix (Linux, macOS, WSL).
#[cfg(unix)]
fn kill_process_tree(pid: u32) {
    // SAFETY: kill(2) has no memory-safety preconditions; a stale group only
    // yields ESRCH, which is ignored.
    unsafe {
        libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_tree(pid: u32) {
    let _ = Command::new("taskkill")
        .args(["/F", "/T", "/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

/// Run a command with a timeout, killing the child and everything it
/// spawned on expiry. stdin is closed; stdout and stderr are captured.
pub fn run_cmd_with_timeout(mut cmd: Command, timeout: Duration) -> io::Result<CmdOutcome> {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Child leads its own group so descendants holding the pipes die too.
        cmd.process_group(0);
    }

    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let pid = child.id();
    let (sender, receiver) = mpsc::channel();

    std::thread::spawn(move || {
        let result = child.wait_with_output();
        let _ = sender.send(result);
    });

    match receiver.recv_timeout(timeout) {
        Ok(result) => result.map(CmdOutcome::Completed),
        Err(_) => {
            kill_process_tree(pid);
            // Pipes close once the whole group is gone and the waiter
            // finishes; the bound covers descendants that left the group.
            let _ = receiver.recv_timeout(Duration::from_secs(1));
            Ok(CmdOutcome::TimedOut)
        }
    }
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
