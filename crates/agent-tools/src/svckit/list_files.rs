//! List Files Tool

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use agent_core::{ParameterSchema, Result as CoreResult, Tool, ToolSchema};

use super::parse_input;
use crate::error::{Result, ToolError};
use crate::workspace::Workspace;

#[derive(Deserialize)]
struct Args {
    #[serde(default)]
    path: String,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
struct Listing {
    directories: Vec<String>,
    files: Vec<String>,
}

pub struct ListFilesTool {
    workspace: Arc<Workspace>,
}

impl ListFilesTool {
    pub const fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }

    async fn run(&self, input: &[u8]) -> Result<String> {
        let args: Args = parse_input(input)?;
        let path = args.path.trim();
        let target = self.workspace.resolve(path)?;

        if !tokio::fs::metadata(&target).await.is_ok_and(|m| m.is_dir()) {
            return Err(ToolError::not_found("Directory", path));
        }

        let mut listing = Listing::default();
        let mut entries = tokio::fs::read_dir(&target).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await?.is_dir() {
                listing.directories.push(name);
            } else {
                listing.files.push(name);
            }
        }
        listing.directories.sort();
        listing.files.sort();

        Ok(serde_json::to_string_pretty(&listing)?)
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "list_files".into(),
            description: "List all files and directories in a specified path within the Capri data directory. Returns separate lists of files and directories.".into(),
            parameters: vec![ParameterSchema::string(
                "path",
                "The relative path of a directory in the Capri data directory. Leave empty to list files in the root Capri directory.",
            )],
            has_side_effects: false,
        }
    }

    async fn execute(&self, input: &[u8]) -> CoreResult<String> {
        Ok(self.run(input).await?)
    }
}
