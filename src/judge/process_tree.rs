//! Platform-neutral "terminate process tree" primitive.
//!
//! A spawned program is placed in its own process group (unix) or process
//! group/console group (windows) so that everything it forks can be killed
//! together, not just the direct child.

use std::io;

use tokio::process::Command;

/// Configure `command` so its process tree can later be killed as a unit.
pub fn isolate_group(command: &mut Command) {
    #[cfg(unix)]
    {
        command.process_group(0);
    }

    #[cfg(windows)]
    {
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        command.creation_flags(CREATE_NEW_PROCESS_GROUP);
    }
}

/// Forcefully terminate the process `pid` and every process it spawned.
///
/// Terminating a tree that has already exited is not an error.
#[cfg(unix)]
pub async fn terminate_tree(pid: u32) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pgid = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

/// Forcefully terminate the process `pid` and every process it spawned.
///
/// Terminating a tree that has already exited is not an error.
#[cfg(windows)]
pub async fn terminate_tree(pid: u32) -> io::Result<()> {
    let output = Command::new("taskkill")
        .args(["/T", "/F", "/PID", &pid.to_string()])
        .output()
        .await?;

    // 128: no such process
    match output.status.code() {
        Some(0) | Some(128) => Ok(()),
        _ => Err(io::Error::other(format!(
            "taskkill failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ))),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Stdio;
    use std::time::Duration;

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_terminate_tree_kills_grandchildren() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("grandchild.pid");

        // The shell forks a long sleeper and records its pid.
        let script = format!("sleep 30 & echo $! > {}; wait", marker.display());
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&script)
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        isolate_group(&mut command);
        let mut child = command.spawn().unwrap();
        let pid = child.id().unwrap();

        let mut grandchild = None;
        for _ in 0..100 {
            if let Ok(text) = std::fs::read_to_string(&marker) {
                if let Ok(p) = text.trim().parse::<i32>() {
                    grandchild = Some(p);
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let grandchild = grandchild.expect("grandchild pid was not recorded");

        terminate_tree(pid).await.unwrap();
        child.wait().await.unwrap();

        let mut alive = true;
        for _ in 0..50 {
            if !is_running(grandchild) {
                alive = false;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!alive, "grandchild survived process tree termination");
    }

    #[cfg(target_os = "linux")]
    /// A killed orphan may linger as a zombie until init reaps it.
    fn is_running(pid: i32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(')')
                .map(|(_, rest)| !rest.trim_start().starts_with(['Z', 'X']))
                .unwrap_or(true),
            Err(_) => false,
        }
    }

    #[tokio::test]
    async fn test_terminate_exited_tree_is_ok() {
        let mut command = Command::new("true");
        isolate_group(&mut command);
        let mut child = command.spawn().unwrap();
        let pid = child.id().unwrap();
        child.wait().await.unwrap();

        terminate_tree(pid).await.unwrap();
    }
}
