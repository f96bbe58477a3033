//! Directory Tools
//!
//! Create and delete directories inside the workspace.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use agent_core::{ParameterSchema, Result as CoreResult, Tool, ToolSchema};

use super::{parse_input, require};
use crate::error::{Result, ToolError};
use crate::workspace::Workspace;

const fn yes() -> bool {
    true
}

#[derive(Deserialize)]
struct CreateArgs {
    #[serde(default)]
    path: String,
    #[serde(default = "yes")]
    exist_ok: bool,
}

#[derive(Deserialize)]
struct DeleteArgs {
    #[serde(default)]
    path: String,
    #[serde(default = "yes")]
    recursive: bool,
}

/// Creates a directory and any missing parents
pub struct CreateDirectoryTool {
    workspace: Arc<Workspace>,
}

impl CreateDirectoryTool {
    pub const fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }

    async fn run(&self, input: &[u8]) -> Result<String> {
        let args: CreateArgs = parse_input(input)?;
        let path = require(&args.path, "No directory path provided")?;
        let full = self.workspace.resolve(path)?;

        if !args.exist_ok && tokio::fs::try_exists(&full).await? {
            return Err(ToolError::Rejected(format!(
                "Directory already exists and exist_ok was set to False: {path}"
            )));
        }

        tokio::fs::create_dir_all(&full).await?;
        Ok(format!("Directory created successfully: {path}"))
    }
}

#[async_trait]
impl Tool for CreateDirectoryTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "create_directory".into(),
            description: "Create a directory and any necessary parent directories in the Capri data directory.".into(),
            parameters: vec![
                ParameterSchema::string("path", "The relative path of the directory to create in the Capri data directory.")
                    .required(),
                ParameterSchema::boolean("exist_ok", "If True, don't raise an error if the directory already exists.")
                    .with_default(true.into()),
            ],
            has_side_effects: true,
        }
    }

    async fn execute(&self, input: &[u8]) -> CoreResult<String> {
        Ok(self.run(input).await?)
    }
}

/// Deletes a directory, never the workspace root
pub struct DeleteDirectoryTool {
    workspace: Arc<Workspace>,
}

impl DeleteDirectoryTool {
    pub const fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }

    async fn run(&self, input: &[u8]) -> Result<String> {
        let args: DeleteArgs = parse_input(input)?;
        let path = require(&args.path, "No directory path provided")?;

        if path == "/" {
            return Err(ToolError::Rejected("Cannot delete the root directory".into()));
        }
        let full = self.workspace.resolve(path)?;
        if self.workspace.is_root(&full) {
            return Err(ToolError::Rejected("Cannot delete the root directory".into()));
        }

        let metadata = match tokio::fs::metadata(&full).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ToolError::not_found("Directory", path)),
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_dir() {
            return Err(ToolError::Rejected(format!("The specified path is not a directory: {path}")));
        }

        if args.recursive {
            tokio::fs::remove_dir_all(&full).await?;
        } else if let Err(e) = tokio::fs::remove_dir(&full).await {
            let non_empty = tokio::fs::read_dir(&full)
                .await?
                .next_entry()
                .await?
                .is_some();
            if non_empty {
                return Err(ToolError::Rejected(format!(
                    "Directory not empty and recursive is False: {path}"
                )));
            }
            return Err(e.into());
        }

        tracing::info!(path, recursive = args.recursive, "Deleted directory");
        Ok(format!("Directory deleted successfully: {path}"))
    }
}

#[async_trait]
impl Tool for DeleteDirectoryTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "delete_directory".into(),
            description: "Delete a directory from the Capri data directory, with option to recursively remove all contents.".into(),
            parameters: vec![
                ParameterSchema::string("path", "The relative path of the directory to delete in the Capri data directory.")
                    .required(),
                ParameterSchema::boolean("recursive", "If True, recursively remove directories and their contents.")
                    .with_default(true.into()),
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

    #[tokio::test]
    async fn test_create_directory() {
        let dir = tempfile::tempdir().unwrap();
        let tool = CreateDirectoryTool::new(Arc::new(Workspace::new(dir.path())));

        let out = tool.execute(br#"{"path":"a/b/c"}"#).await.unwrap();
        assert_eq!(out, "Directory created successfully: a/b/c");
        assert!(dir.path().join("a/b/c").is_dir());

        // exist_ok defaults to true
        assert!(tool.execute(br#"{"path":"a/b/c"}"#).await.is_ok());
        let err = tool
            .execute(br#"{"path":"a/b/c","exist_ok":false}"#)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_delete_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("full/inner")).unwrap();
        std::fs::write(dir.path().join("file.txt"), "x").unwrap();
        let tool = DeleteDirectoryTool::new(Arc::new(Workspace::new(dir.path())));

        let err = tool
            .execute(br#"{"path":"full","recursive":false}"#)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not empty"));

        let out = tool.execute(br#"{"path":"full"}"#).await.unwrap();
        assert_eq!(out, "Directory deleted successfully: full");
        assert!(!dir.path().join("full").exists());

        let err = tool.execute(br#"{"path":"file.txt"}"#).await.unwrap_err();
        assert!(err.to_string().contains("not a directory"));

        let err = tool.execute(br#"{"path":"gone"}"#).await.unwrap_err();
        assert!(err.to_string().contains("Directory not found: gone"));
    }

    #[tokio::test]
    async fn test_delete_refuses_root() {
        let dir = tempfile::tempdir().unwrap();
        let tool = DeleteDirectoryTool::new(Arc::new(Workspace::new(dir.path())));

        for path in [".", "/", "./"] {
            let input = serde_json::to_vec(&serde_json::json!({ "path": path })).unwrap();
            let err = tool.execute(&input).await.unwrap_err();
            assert!(err.to_string().contains("Cannot delete the root directory"), "{path}");
        }
        assert!(dir.path().exists());
    }
}
