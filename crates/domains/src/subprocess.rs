// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Shared subprocess helpers for domains that shell out to external tools
//! (`zip`, `osascript`, ...). A bounded timeout is mandatory: per the
//! daemon's cancellation contract, external collaborators are responsible
//! for bounding their own blocking time so cooperative cancellation
//! eventually converges.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

/// Result of running a subprocess to completion.
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status_code: i32,
}

/// Runs `program` with `args`, waiting up to `timeout` before killing it.
/// stdout and stderr are captured concurrently so a child that fills one
/// pipe without being read cannot deadlock the other.
pub async fn run_command(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<CommandOutput, String> {
    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("failed to spawn {program}: {e}"))?;

    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");

    let output_fut = async {
        use tokio::io::AsyncReadExt;
        let mut stdout = stdout;
        let mut stderr = stderr;
        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();
        let (out_res, err_res) = tokio::join!(
            stdout.read_to_end(&mut out_buf),
            stderr.read_to_end(&mut err_buf),
        );
        out_res.map_err(|e| e.to_string())?;
        err_res.map_err(|e| e.to_string())?;
        let status = child.wait().await.map_err(|e| e.to_string())?;
        Ok::<_, String>((out_buf, err_buf, status))
    };

    match tokio::time::timeout(timeout, output_fut).await {
        Ok(Ok((out_buf, err_buf, status))) => Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&out_buf).into_owned(),
            stderr: String::from_utf8_lossy(&err_buf).into_owned(),
            status_code: status.code().unwrap_or(-1),
        }),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(format!("command timed out after {:.1}s: {program}", timeout.as_secs_f64())),
    }
}

/// Runs an AppleScript snippet via `osascript` and returns its trimmed
/// stdout. Only meaningful on macOS; callers should treat a non-zero exit
/// or missing binary as a normal `TaskResult` failure, not a panic.
pub async fn run_osascript(script: &str, timeout: Duration) -> Result<String, String> {
    let output = run_command("osascript", &["-e", script], timeout).await?;
    if output.status_code != 0 {
        return Err(format!("osascript error (code {}): {}", output.status_code, output.stderr.trim()));
    }
    Ok(output.stdout.trim().to_string())
}
