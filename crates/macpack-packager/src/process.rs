//! Running external packaging tools

use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{PackError, Result};

/// Locate a tool on `PATH`
pub fn find_tool(tool: &str, install_hint: &str) -> Result<PathBuf> {
    which::which(tool).map_err(|_| PackError::tool_not_found(tool, install_hint))
}

/// Run a tool to completion, failing with its stderr on a non-zero exit
pub async fn run_tool<I, S>(tool: &str, program: impl AsRef<OsStr>, args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<S> = args.into_iter().collect();
    debug!(
        tool,
        args = ?args.iter().map(|a| a.as_ref().to_string_lossy()).collect::<Vec<_>>(),
        "running tool"
    );

    let output = Command::new(program)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let reason = if stderr.trim().is_empty() { stdout } else { stderr };
        return Err(PackError::ToolFailed {
            tool: tool.to_string(),
            reason: reason.trim().to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_missing_tool() {
        let err = find_tool("macpack-no-such-tool", "install it").unwrap_err();
        assert!(matches!(err, PackError::ToolNotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_failure_carries_stderr() {
        let err = run_tool("sh", "sh", ["-c", "echo broken >&2; exit 3"])
            .await
            .unwrap_err();
        match err {
            PackError::ToolFailed { tool, reason } => {
                assert_eq!(tool, "sh");
                assert_eq!(reason, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
