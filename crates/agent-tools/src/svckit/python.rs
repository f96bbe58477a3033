//! Execute Python File Tool

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use agent_core::{ParameterSchema, Result as CoreResult, Tool, ToolSchema};

use super::{parse_input, require, run_program};
use crate::error::{Result, ToolError};
use crate::workspace::Workspace;

#[derive(Deserialize)]
struct Args {
    #[serde(default)]
    file_path: String,
    #[serde(default)]
    args: String,
}

/// Runs a script with `python3` from the workspace root
pub struct ExecutePythonFileTool {
    workspace: Arc<Workspace>,
}

impl ExecutePythonFileTool {
    pub const fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }

    async fn run(&self, input: &[u8]) -> Result<String> {
        let args: Args = parse_input(input)?;
        let file_path = require(&args.file_path, "No file path provided")?;
        let script = self.workspace.resolve(file_path)?;

        if !tokio::fs::metadata(&script).await.is_ok_and(|m| m.is_file()) {
            return Err(ToolError::not_found("File", file_path));
        }

        let argv = std::iter::once(script.into_os_string()).chain(args.args.split_whitespace().map(Into::into));
        let output = run_program("python3", argv, self.workspace.root()).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        if output.status.success() {
            return Ok(stdout.into_owned());
        }

        let code = output
            .status
            .code()
            .map_or_else(|| "terminated by signal".to_string(), |c| c.to_string());
        Ok(format!(
            "Exit code: {code}\nOutput: {stdout}\nError: {}",
            String::from_utf8_lossy(&output.stderr)
        ))
    }
}

#[async_trait]
impl Tool for ExecutePythonFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "execute_python_file".into(),
            description: "Execute a Python file as if from the command line. Paths are relative to the capri directory. Optionally provide command line arguments. Use this tool whenever you need to run a Python script or when asked to 'run a file' or 'run a script'.".into(),
            parameters: vec![
                ParameterSchema::string(
                    "file_path",
                    "The relative path of the Python file to execute (relative to the capri directory).",
                )
                .required(),
                ParameterSchema::string(
                    "args",
                    "Optional command line arguments to pass to the script (e.g., '--input file.txt --verbose').",
                ),
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
    async fn test_missing_script() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ExecutePythonFileTool::new(Arc::new(Workspace::new(dir.path())));

        let err = tool.execute(br#"{"file_path":"nope.py"}"#).await.unwrap_err();
        assert!(err.to_string().contains("File not found: nope.py"));

        let err = tool.execute(br#"{"file_path":""}"#).await.unwrap_err();
        assert!(err.to_string().contains("No file path provided"));
    }
}
