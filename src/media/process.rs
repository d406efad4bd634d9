//! Subprocess execution with wall-clock timeouts.

use crate::error::{KvissError, Result};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::warn;

/// Run an external tool to completion, collecting its output.
///
/// A tool that exceeds `timeout` is killed and reported as Timeout; a missing
/// binary maps to ToolNotFound. An in-flight tool is otherwise never
/// interrupted, so partially written artifacts only appear on timeout paths.
pub async fn run_tool(mut cmd: Command, tool: &str, timeout: Duration) -> Result<Output> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(KvissError::ToolNotFound(tool.to_string()));
        }
        Err(e) => return Err(KvissError::Io(e)),
    };

    // Drain pipes concurrently so a chatty tool cannot fill its buffers and
    // deadlock against our wait().
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });

    let status = tokio::select! {
        status = child.wait() => status?,
        _ = tokio::time::sleep(timeout) => {
            warn!("{} exceeded {}s wall clock, killing", tool, timeout.as_secs());
            let _ = child.start_kill();
            let _ = child.wait().await;
            let _ = stdout_task.await;
            let _ = stderr_task.await;
            return Err(KvissError::Timeout(format!(
                "{} exceeded {}s",
                tool,
                timeout.as_secs()
            )));
        }
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_tool_maps_to_tool_not_found() {
        let cmd = Command::new("kviss-no-such-tool");
        let err = run_tool(cmd, "kviss-no-such-tool", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, KvissError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn test_captures_output() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo out; echo err >&2");

        let output = run_tool(cmd, "sh", Duration::from_secs(5)).await.unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "out");
        assert_eq!(String::from_utf8_lossy(&output.stderr).trim(), "err");
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("sleep 5");

        let err = run_tool(cmd, "sh", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, KvissError::Timeout(_)));
    }
}
