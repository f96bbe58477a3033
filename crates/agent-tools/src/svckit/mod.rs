//! Service Kit - Agent Tools
//!
//! Tools that implement `agent_core::Tool` over the workspace directory.

mod directory;
mod download;
mod edit_file;
mod list_files;
mod python;
mod read_file;
mod transfer;
mod video;

pub use directory::{CreateDirectoryTool, DeleteDirectoryTool};
pub use download::DownloadFromYoutubeTool;
pub use edit_file::EditFileTool;
pub use list_files::ListFilesTool;
pub use python::ExecutePythonFileTool;
pub use read_file::ReadFileTool;
pub use transfer::{CopyTool, MoveTool};
pub use video::{KeepSegmentsTool, RescaleVideoTool, TrimVideoTool};

use std::ffi::OsStr;
use std::path::Path;
use std::process::{Output, Stdio};

use serde::de::DeserializeOwned;
use tokio::process::Command;

use crate::error::{Result, ToolError};

/// Decode a tool's JSON input into its argument struct
fn parse_input<T: DeserializeOwned>(input: &[u8]) -> Result<T> {
    serde_json::from_slice(input).map_err(|e| ToolError::InvalidInput(e.to_string()))
}

/// Reject blank required strings with the tool's own wording
fn require<'a>(value: &'a str, message: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        Err(ToolError::InvalidInput(message.into()))
    } else {
        Ok(value)
    }
}

/// Run a program to completion in `cwd`. The child is killed if the
/// returned future is dropped, which is how tool timeouts and
/// cancellation reach it.
async fn run_program<I, S>(program: &'static str, args: I, cwd: &Path) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(program, command = ?command.as_std(), "Spawning process");
    let output = command
        .output()
        .await
        .map_err(|source| ToolError::Spawn { program, source })?;
    tracing::debug!(program, status = %output.status, "Process exited");

    Ok(output)
}
