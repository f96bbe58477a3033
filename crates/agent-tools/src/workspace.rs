//! Workspace Root
//!
//! Every tool path is relative to one directory. Resolution is purely
//! lexical: absolute paths and `..` components are refused before anything
//! touches the filesystem.

use std::path::{Component, Path, PathBuf};

use crate::error::{Result, ToolError};

/// Directory the tools operate in
#[derive(Clone, Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root from `CAPRI_DIR`, or `~/Capri`. The directory is created if it
    /// does not exist yet.
    pub fn from_env() -> Result<Self> {
        let root = match std::env::var_os("CAPRI_DIR") {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::home_dir()
                .ok_or_else(|| ToolError::Config("no home directory; set CAPRI_DIR".into()))?
                .join("Capri"),
        };

        std::fs::create_dir_all(&root)?;
        tracing::info!(root = %root.display(), "Tool workspace ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join `relative` onto the root. Empty input and `.` resolve to the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let relative = Path::new(relative.trim());

        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(ToolError::OutsideWorkspace(relative.display().to_string()));
                }
            }
        }

        Ok(self.root.join(relative))
    }

    /// Whether `path` names the root itself
    pub fn is_root(&self, path: &Path) -> bool {
        path.components().eq(self.root.components())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_inside_root() {
        let ws = Workspace::new("/data/capri");
        assert_eq!(ws.resolve("docs/a.md").unwrap(), PathBuf::from("/data/capri/docs/a.md"));
        assert_eq!(ws.resolve("./docs").unwrap(), PathBuf::from("/data/capri/docs"));
        assert!(ws.is_root(&ws.resolve("").unwrap()));
        assert!(ws.is_root(&ws.resolve(".").unwrap()));
    }

    #[test]
    fn test_resolve_refuses_escape() {
        let ws = Workspace::new("/data/capri");
        assert!(matches!(ws.resolve("../etc/passwd"), Err(ToolError::OutsideWorkspace(_))));
        assert!(matches!(ws.resolve("docs/../../x"), Err(ToolError::OutsideWorkspace(_))));
        assert!(matches!(ws.resolve("/etc/passwd"), Err(ToolError::OutsideWorkspace(_))));
    }
}
