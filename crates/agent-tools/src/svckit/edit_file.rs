//! Edit File Tool
//!
//! Replaces text in a file, or creates the file when `old_str` is empty.

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
    #[serde(default)]
    old_str: String,
    #[serde(default)]
    new_str: String,
}

pub struct EditFileTool {
    workspace: Arc<Workspace>,
}

impl EditFileTool {
    pub const fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }

    async fn run(&self, input: &[u8]) -> Result<String> {
        let args: Args = parse_input(input)?;
        let path = require(&args.path, "No file path provided")?;
        let old_str = args.old_str.trim();
        let new_str = args.new_str.trim();

        if old_str == new_str {
            return Err(ToolError::Rejected("old_str and new_str must be different".into()));
        }

        let full = self.workspace.resolve(path)?;

        if old_str.is_empty() {
            if let Some(parent) = full.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&full, new_str).await?;
            tracing::info!(path, "Created file");
            return Ok(format!("Created new file: {path}"));
        }

        let content = match tokio::fs::read_to_string(&full).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ToolError::not_found("File", path)),
            Err(e) => return Err(e.into()),
        };

        if !content.contains(old_str) {
            return Err(ToolError::Rejected(format!("Text '{old_str}' not found in file")));
        }

        tokio::fs::write(&full, content.replace(old_str, new_str)).await?;
        tracing::info!(path, "Edited file");
        Ok("File updated successfully".into())
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "edit_file".into(),
            description: "Make edits to a text file or create a new one. Use empty old_str to create a new file.".into(),
            parameters: vec![
                ParameterSchema::string("path", "The path to the file").required(),
                ParameterSchema::string("old_str", "Text to search for - must match exactly").required(),
                ParameterSchema::string("new_str", "Text to replace old_str with").required(),
            ],
            has_side_effects: true,
        }
    }

    async fn execute(&self, input: &[u8]) -> CoreResult<String> {
        Ok(self.run(input).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(value: &serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(value).unwrap()
    }

    #[tokio::test]
    async fn test_create_then_edit() {
        let dir = tempfile::tempdir().unwrap();
        let tool = EditFileTool::new(Arc::new(Workspace::new(dir.path())));

        let out = tool
            .execute(&input(&json!({"path": "notes/todo.md", "old_str": "", "new_str": "buy milk\nbuy milk"})))
            .await
            .unwrap();
        assert_eq!(out, "Created new file: notes/todo.md");

        let out = tool
            .execute(&input(&json!({"path": "notes/todo.md", "old_str": "milk", "new_str": "oat milk"})))
            .await
            .unwrap();
        assert_eq!(out, "File updated successfully");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("notes/todo.md")).unwrap(),
            "buy oat milk\nbuy oat milk"
        );
    }

    #[tokio::test]
    async fn test_rejections() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        let tool = EditFileTool::new(Arc::new(Workspace::new(dir.path())));

        let err = tool
            .execute(&input(&json!({"path": "a.txt", "old_str": "x", "new_str": "x"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must be different"));

        let err = tool
            .execute(&input(&json!({"path": "a.txt", "old_str": "beta", "new_str": "gamma"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Text 'beta' not found in file"));

        let err = tool
            .execute(&input(&json!({"path": "missing.txt", "old_str": "a", "new_str": "b"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("File not found: missing.txt"));
    }
}
