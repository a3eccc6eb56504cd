//! `bash` tool: spawn a child process with the agent's
//! workspace as CWD, a sanitised environment, a hard per-stream output cap,
//! and a deny-list of destructive commands. Incremental, truncating reads
//! keep a runaway command from filling memory.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;

pub const MAX_OUTPUT_BYTES: usize = 10 * 1024;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const MAX_TIMEOUT_SECS: u64 = 120;

/// Patterns rejected pre-spawn.
fn deny_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"^\s*rm\s+-rf?\s+[/~]",
            r"^\s*sudo\b",
            r"^\s*mkfs\b",
            r"^\s*dd\s+if=",
            r">\s*/dev/",
            r":\(\)\s*\{\s*:\|:&\s*\}\s*;\s*:",
            r"^\s*chmod\s+-R?\s+777\s+/",
            r"^\s*chown\s+-R?\s+\S+\s+/",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("deny pattern is valid regex"))
        .collect()
    })
}

pub fn is_denied(command: &str) -> Option<&'static str> {
    deny_patterns().iter().find(|re| re.is_match(command)).map(|re| re.as_str())
}

fn truncate_stream(mut bytes: Vec<u8>) -> String {
    if bytes.len() > MAX_OUTPUT_BYTES {
        let original_len = bytes.len();
        bytes.truncate(MAX_OUTPUT_BYTES);
        let mut text = String::from_utf8_lossy(&bytes).into_owned();
        text.push_str(&format!("\n[...truncated {} characters...]", original_len - MAX_OUTPUT_BYTES));
        text
    } else {
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

async fn read_all<R: AsyncReadExt + Unpin>(mut reader: R) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    buf
}

pub struct BashOutcome {
    pub is_error: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

pub async fn run(command: &str, cwd: &Path, timeout_secs: Option<u64>) -> BashOutcome {
    if let Some(pattern) = is_denied(command) {
        return BashOutcome {
            is_error: true,
            stdout: String::new(),
            stderr: format!("command rejected by safety rule: {pattern}"),
            exit_code: None,
            duration_ms: 0,
        };
    }

    let timeout = Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS).min(MAX_TIMEOUT_SECS));
    let start = Instant::now();
    let command = command.to_string();
    let cwd = cwd.to_path_buf();

    let spawn_result = tokio::time::timeout(timeout, async move {
        let mut child = TokioCommand::new("/bin/bash")
            .arg("-c")
            .arg(&command)
            .current_dir(&cwd)
            .env_clear()
            .env("PATH", std::env::var("PATH").unwrap_or_else(|_| "/usr/bin:/bin".to_string()))
            .env("HOME", cwd.to_string_lossy().to_string())
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| e.to_string())?;

        let stdout_pipe = child.stdout.take().expect("stdout piped");
        let stderr_pipe = child.stderr.take().expect("stderr piped");
        let (stdout_bytes, stderr_bytes) = tokio::join!(read_all(stdout_pipe), read_all(stderr_pipe));
        let status = child.wait().await.map_err(|e| e.to_string())?;
        Ok::<_, String>((stdout_bytes, stderr_bytes, status.code()))
    })
    .await;

    let duration_ms = start.elapsed().as_millis() as u64;

    match spawn_result {
        Ok(Ok((stdout_bytes, stderr_bytes, exit_code))) => BashOutcome {
            is_error: exit_code != Some(0),
            stdout: truncate_stream(stdout_bytes),
            stderr: truncate_stream(stderr_bytes),
            exit_code,
            duration_ms,
        },
        Ok(Err(message)) => BashOutcome { is_error: true, stdout: String::new(), stderr: message, exit_code: None, duration_ms },
        Err(_) => BashOutcome {
            is_error: true,
            stdout: String::new(),
            stderr: format!("command exceeded {}s timeout", timeout.as_secs()),
            exit_code: None,
            duration_ms,
        },
    }
}
