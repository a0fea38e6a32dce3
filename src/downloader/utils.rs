// Helper functions shared by the tools and service backends

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::errors::{DownloadError, Result};

/// Run command with timeout, capturing stdout and stderr
pub async fn run_output_with_timeout(
    program: &str,
    args: Vec<String>,
    timeout_secs: u64,
) -> Result<std::process::Output> {
    debug!("running {} {:?}", program, args);

    let mut child = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let mut stdout_pipe = child.stdout.take().ok_or_else(|| missing_pipe(program, "stdout"))?;
    let mut stderr_pipe = child.stderr.take().ok_or_else(|| missing_pipe(program, "stderr"))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await?;
        Ok::<Vec<u8>, std::io::Error>(buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await?;
        Ok::<Vec<u8>, std::io::Error>(buf)
    });

    match timeout(Duration::from_secs(timeout_secs), child.wait()).await {
        Ok(status) => {
            let status = status?;
            let stdout = stdout_task.await.map_err(std::io::Error::other)??;
            let stderr = stderr_task.await.map_err(std::io::Error::other)??;
            Ok(std::process::Output {
                status,
                stdout,
                stderr,
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(DownloadError::Subprocess {
                status: format!("timed out after {}s", timeout_secs),
                stderr: String::new(),
            })
        }
    }
}

fn missing_pipe(program: &str, pipe: &str) -> DownloadError {
    std::io::Error::other(format!("failed to capture {} from {}", pipe, program)).into()
}

/// Run `op` up to `attempts` times with a fixed delay between attempts.
/// Meant for small metadata fetches, never for media transfer.
pub async fn retry<T, F, Fut>(attempts: u32, delay: Duration, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(DownloadError::Cancelled) => return Err(DownloadError::Cancelled),
            Err(e) if attempt < attempts => {
                warn!("{} failed (attempt {}/{}): {}", what, attempt, attempts, e);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!("{} failed after {} attempts: {}", what, attempts, e);
                return Err(e);
            }
        }
    }
}
