use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::errors::{BootstrapError, Result};

#[derive(Clone, Debug)]
pub struct LaunchedProcess {
    pub pid: Option<u32>,
    pub executable: PathBuf,
    pub args: Vec<String>,
}

/// Spawns the installed player and holds the launch open for a short grace window.
/// A child that dies with a failure status inside the window fails the launch;
/// anything still alive afterwards is left running when the bootstrapper exits.
#[derive(Clone)]
pub struct ProcessSupervisor {
    ready_grace: Duration,
}

impl ProcessSupervisor {
    pub fn new(ready_grace: Duration) -> Self {
        Self { ready_grace }
    }

    pub async fn launch(&self, executable: &Path, args: &[String]) -> Result<LaunchedProcess> {
        let mut command = Command::new(executable);
        command
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(false);

        let mut child = command.spawn().map_err(|source| BootstrapError::Spawn {
            path: executable.to_path_buf(),
            source,
        })?;
        let pid = child.id();
        tracing::info!(
            "started {} (pid {:?}) with {} args",
            executable.display(),
            pid,
            args.len()
        );

        let launched = LaunchedProcess {
            pid,
            executable: executable.to_path_buf(),
            args: args.to_vec(),
        };
        if self.ready_grace.is_zero() {
            return Ok(launched);
        }

        match tokio::time::timeout(self.ready_grace, child.wait()).await {
            Err(_) => {
                tracing::debug!("process still running after {:?}", self.ready_grace);
                Ok(launched)
            }
            Ok(Ok(status)) if status.success() => {
                tracing::info!("process exited cleanly during startup");
                Ok(launched)
            }
            Ok(Ok(status)) => Err(BootstrapError::EarlyExit(status.to_string())),
            Ok(Err(err)) => {
                tracing::warn!("could not observe launched process: {}", err);
                Ok(launched)
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");
        path
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let missing = tmp.path().join("Player.app/Contents/MacOS/RobloxPlayer");

        let err = ProcessSupervisor::new(Duration::from_millis(50))
            .launch(&missing, &[])
            .await
            .expect_err("nothing to spawn");

        assert!(matches!(err, BootstrapError::Spawn { path, .. } if path == missing));
    }

    #[tokio::test]
    async fn non_executable_file_is_a_spawn_error() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let path = tmp.path().join("plain");
        std::fs::write(&path, b"not a program").expect("write file");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).expect("chmod");

        let err = ProcessSupervisor::new(Duration::ZERO)
            .launch(&path, &[])
            .await
            .expect_err("not executable");

        assert!(matches!(err, BootstrapError::Spawn { .. }));
    }

    #[tokio::test]
    async fn passes_argv_through_in_order() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let out = tmp.path().join("argv.txt");
        let exe = script(
            tmp.path(),
            "player",
            &format!("for a in \"$@\"; do echo \"$a\" >> '{}'; done", out.display()),
        );
        let args = vec!["-ticket".to_string(), "AAA".to_string(), "-rloc".to_string(), "en_us".to_string()];

        ProcessSupervisor::new(Duration::from_secs(5))
            .launch(&exe, &args)
            .await
            .expect("launch");

        let written = std::fs::read_to_string(&out).expect("argv file");
        assert_eq!(written.lines().collect::<Vec<_>>(), vec!["-ticket", "AAA", "-rloc", "en_us"]);
    }

    #[tokio::test]
    async fn long_running_child_counts_as_ready() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let exe = script(tmp.path(), "player", "sleep 5");

        let launched = ProcessSupervisor::new(Duration::from_millis(200))
            .launch(&exe, &[])
            .await
            .expect("launch");

        assert!(launched.pid.is_some());
        if let Some(pid) = launched.pid {
            let _ = std::process::Command::new("kill").arg(pid.to_string()).status();
        }
    }

    #[tokio::test]
    async fn failing_child_inside_grace_window_is_reported() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let exe = script(tmp.path(), "player", "exit 3");

        let err = ProcessSupervisor::new(Duration::from_secs(5))
            .launch(&exe, &[])
            .await
            .expect_err("early exit");

        assert!(matches!(err, BootstrapError::EarlyExit(_)));
    }
}
