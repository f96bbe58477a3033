//! # agent-tools
//!
//! File, script and video tools the assistant can call. Every tool works
//! inside a single workspace directory (`CAPRI_DIR`, default `~/Capri`).
//!
//! ## Tools
//!
//! ```text
//! ┌──────────────────────────┬──────────────────────────────────────┐
//! │  read_file               │  text contents of a file             │
//! │  edit_file               │  replace text, or create a file      │
//! │  list_files              │  {directories, files} as JSON        │
//! │  create_directory        │  mkdir -p                            │
//! │  delete_directory        │  rm -r, never the root               │
//! │  move_file_or_directory  │  rename / move into a directory      │
//! │  copy_file_or_directory  │  file copy or full tree copy         │
//! │  execute_python_file     │  python3 <file> <args>               │
//! │  trim_video              │  ffmpeg -ss/-to stream copy          │
//! │  rescale_video           │  ffmpeg scale + crop                 │
//! │  keep_segments_from_video│  ffmpeg trim + concat of ranges      │
//! │  download_from_youtube   │  yt-dlp to a timestamped mp4/mp3     │
//! └──────────────────────────┴──────────────────────────────────────┘
//! ```

pub mod error;
pub mod svckit;
pub mod workspace;

use std::sync::Arc;

use agent_core::ToolRegistry;

pub use error::{Result, ToolError};
pub use workspace::Workspace;

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{
        CopyTool, CreateDirectoryTool, DeleteDirectoryTool, DownloadFromYoutubeTool, EditFileTool,
        ExecutePythonFileTool, KeepSegmentsTool, ListFilesTool, MoveTool, ReadFileTool, RescaleVideoTool,
        TrimVideoTool,
    };
}

/// Register every workspace tool
pub fn register_all(registry: &mut ToolRegistry, workspace: &Arc<Workspace>) {
    use tools::*;

    registry.register(ReadFileTool::new(workspace.clone()));
    registry.register(EditFileTool::new(workspace.clone()));
    registry.register(ListFilesTool::new(workspace.clone()));
    registry.register(CreateDirectoryTool::new(workspace.clone()));
    registry.register(DeleteDirectoryTool::new(workspace.clone()));
    registry.register(MoveTool::new(workspace.clone()));
    registry.register(CopyTool::new(workspace.clone()));
    registry.register(ExecutePythonFileTool::new(workspace.clone()));
    registry.register(TrimVideoTool::new(workspace.clone()));
    registry.register(RescaleVideoTool::new(workspace.clone()));
    registry.register(KeepSegmentsTool::new(workspace.clone()));
    registry.register(DownloadFromYoutubeTool::new(workspace.clone()));

    tracing::debug!(count = registry.len(), "Registered workspace tools");
}

/// System prompt for the workspace assistant
pub const ASSISTANT_PROMPT: &str = r"Your name is Capri. You are a helpful assistant.

Your responses are short, professional, friendly and on point, like a chat message. You don't sugarcoat your responses.

## Working with files

You have a private workspace directory. All paths you pass to tools are relative to it.

- `list_files`, `read_file` - look around before changing anything
- `edit_file` - change text in a file; an empty old_str creates the file
- `create_directory`, `delete_directory`, `move_file_or_directory`, `copy_file_or_directory`
- `execute_python_file` - run a Python script from the workspace
- `trim_video`, `rescale_video`, `keep_segments_from_video` - edit videos with ffmpeg
- `download_from_youtube` - save a YouTube video (mp4) or its audio (mp3) into the workspace

Use the tools only when the user asks you to look at, save, write, edit or run something. Otherwise, just answer from what you know.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all() {
        let mut registry = ToolRegistry::new();
        register_all(&mut registry, &Arc::new(Workspace::new("/tmp/capri")));

        assert_eq!(
            registry.names(),
            [
                "copy_file_or_directory",
                "create_directory",
                "delete_directory",
                "download_from_youtube",
                "edit_file",
                "execute_python_file",
                "keep_segments_from_video",
                "list_files",
                "move_file_or_directory",
                "read_file",
                "rescale_video",
                "trim_video",
            ]
        );

        let trim = registry.lookup("trim_video").unwrap().schema().input_schema();
        assert_eq!(trim["required"], serde_json::json!(["input_file", "cut_from", "cut_to"]));

        let segments = registry.lookup("keep_segments_from_video").unwrap().schema().input_schema();
        assert_eq!(segments["properties"]["segments_to_keep"]["items"]["maxItems"], 2);
    }
}
