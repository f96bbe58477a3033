//! Read File Tool

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use agent_core::{ParameterSchema, Result as CoreResult, Tool, ToolSchema};

use super::{parse_input, require};
use crate::error::{Result, ToolError};
use crate::workspace::Workspace;

#[derive(Deserialize)]
struct Args {
    #[serde(default)]
    path: String,
}

/// Returns the contents of a text file
pub struct ReadFileTool {
    workspace: Arc<Workspace>,
}

impl ReadFileTool {
    pub const fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }

    async fn run(&self, input: &[u8]) -> Result<String> {
        let args: Args = parse_input(input)?;
        let path = require(&args.path, "No file path provided")?;
        let full = self.workspace.resolve(path)?;

        match tokio::fs::read_to_string(&full).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ToolError::not_found("File", path)),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "read_file".into(),
            description: "Read the contents of a given relative file path. Use this when you want to see what's inside a file.".into(),
            parameters: vec![ParameterSchema::string("path", "The relative path of a file in the working directory.").required()],
            has_side_effects: false,
        }
    }

    async fn execute(&self, input: &[u8]) -> CoreResult<String> {
        Ok(self.run(input).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_existing_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello\nworld").unwrap();
        let tool = ReadFileTool::new(Arc::new(Workspace::new(dir.path())));

        assert_eq!(tool.execute(br#"{"path":"notes.txt"}"#).await.unwrap(), "hello\nworld");

        let err = tool.execute(br#"{"path":"nope.txt"}"#).await.unwrap_err();
        assert_eq!(err.to_string(), "Tool execution error: File not found: nope.txt");

        let err = tool.execute(br#"{"path":"../secret"}"#).await.unwrap_err();
        assert!(err.to_string().contains("leaves the workspace"));
    }
}
