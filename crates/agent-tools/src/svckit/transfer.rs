//! Move and Copy Tools

use std::path::{Path, PathBuf};
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
    source_path: String,
    #[serde(default)]
    destination_path: String,
}

struct Resolved<'a> {
    source: &'a str,
    destination: &'a str,
    full_source: PathBuf,
    full_destination: PathBuf,
    source_is_dir: bool,
}

async fn resolve_pair<'a>(workspace: &Workspace, args: &'a Args) -> Result<Resolved<'a>> {
    let source = require(&args.source_path, "No source path provided")?;
    let destination = require(&args.destination_path, "No destination path provided")?;
    let full_source = workspace.resolve(source)?;
    let full_destination = workspace.resolve(destination)?;

    let metadata = match tokio::fs::metadata(&full_source).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ToolError::not_found("Source", source)),
        Err(e) => return Err(e.into()),
    };

    Ok(Resolved {
        source,
        destination,
        full_source,
        full_destination,
        source_is_dir: metadata.is_dir(),
    })
}

fn transfer_parameters() -> Vec<ParameterSchema> {
    vec![
        ParameterSchema::string(
            "source_path",
            "The relative source path of a file or directory in the Capri data directory.",
        )
        .required(),
        ParameterSchema::string("destination_path", "The relative destination path in the Capri data directory.")
            .required(),
    ]
}

const fn kind(is_dir: bool) -> &'static str {
    if is_dir { "directory" } else { "file" }
}

/// Moves a file or directory. Moving onto an existing directory places the
/// source inside it.
pub struct MoveTool {
    workspace: Arc<Workspace>,
}

impl MoveTool {
    pub const fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }

    async fn run(&self, input: &[u8]) -> Result<String> {
        let args: Args = parse_input(input)?;
        let r = resolve_pair(&self.workspace, &args).await?;

        let mut target = r.full_destination.clone();
        if tokio::fs::metadata(&target).await.is_ok_and(|m| m.is_dir()) {
            if let Some(name) = r.full_source.file_name() {
                target.push(name);
            }
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::rename(&r.full_source, &target).await?;
        tracing::info!(source = r.source, destination = r.destination, "Moved");
        Ok(format!(
            "Successfully moved {} from {} to {}",
            kind(r.source_is_dir),
            r.source,
            r.destination
        ))
    }
}

#[async_trait]
impl Tool for MoveTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "move_file_or_directory".into(),
            description: "Move a file or directory from one location to another within the Capri data directory. Automatically detects whether the source is a file or directory.".into(),
            parameters: transfer_parameters(),
            has_side_effects: true,
        }
    }

    async fn execute(&self, input: &[u8]) -> CoreResult<String> {
        Ok(self.run(input).await?)
    }
}

/// Copies a file, or a directory tree to a destination that does not exist yet
pub struct CopyTool {
    workspace: Arc<Workspace>,
}

impl CopyTool {
    pub const fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }

    async fn run(&self, input: &[u8]) -> Result<String> {
        let args: Args = parse_input(input)?;
        let r = resolve_pair(&self.workspace, &args).await?;

        if r.source_is_dir {
            if r.full_destination.starts_with(&r.full_source) {
                return Err(ToolError::Rejected(format!(
                    "Cannot copy directory {} into itself ({})",
                    r.source, r.destination
                )));
            }
            if tokio::fs::try_exists(&r.full_destination).await? {
                return Err(ToolError::Rejected(format!("Destination already exists: {}", r.destination)));
            }
            copy_tree(&r.full_source, &r.full_destination).await?;
        } else {
            if let Some(parent) = r.full_destination.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(&r.full_source, &r.full_destination).await?;
        }

        tracing::info!(source = r.source, destination = r.destination, "Copied");
        Ok(format!(
            "Successfully copied {} from {} to {}",
            kind(r.source_is_dir),
            r.source,
            r.destination
        ))
    }
}

async fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    let mut pending = vec![(from.to_path_buf(), to.to_path_buf())];

    while let Some((src, dst)) = pending.pop() {
        // Listed before `dst` exists, and the destination root is never copied into itself
        let mut listing = Vec::new();
        let mut entries = tokio::fs::read_dir(&src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path == to {
                continue;
            }
            listing.push((path, entry.file_name(), entry.file_type().await?.is_dir()));
        }

        tokio::fs::create_dir_all(&dst).await?;
        for (path, name, is_dir) in listing {
            let target = dst.join(name);
            if is_dir {
                pending.push((path, target));
            } else {
                tokio::fs::copy(path, target).await?;
            }
        }
    }

    Ok(())
}

#[async_trait]
impl Tool for CopyTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "copy_file_or_directory".into(),
            description: "Copy a file or directory from one location to another within the Capri data directory. Automatically detects whether the source is a file or directory and performs the appropriate copy operation.".into(),
            parameters: transfer_parameters(),
            has_side_effects: true,
        }
    }

    async fn execute(&self, input: &[u8]) -> CoreResult<String> {
        Ok(self.run(input).await?)
    }
}
