//! Multi-workspace file management.
//!
//! Each workspace (one factory floor, one store of operations) is a single
//! JSON file in the data directory with the naming convention
//! `<workspace_name>_workspace.json`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::store::Store;

/// Represents a workspace with its name and backing file path.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub name: String,
    pub display_name: String,
    pub file_path: PathBuf,
}

impl Workspace {
    /// Create a new workspace handle with the given display name.
    pub fn new(display_name: &str, data_dir: &Path) -> Self {
        let name = sanitize_workspace_name(display_name);
        let file_path = data_dir.join(format!("{}_workspace.json", name));

        Workspace {
            name,
            display_name: display_name.to_string(),
            file_path,
        }
    }

    /// Load a workspace handle from an existing file path.
    pub fn from_file(file_path: PathBuf) -> Option<Self> {
        let file_name = file_path.file_stem()?.to_str()?;

        if !file_name.ends_with("_workspace") {
            return None;
        }

        let name = file_name.strip_suffix("_workspace")?;
        let display_name = name.replace('_', " ");

        Some(Workspace {
            name: name.to_string(),
            display_name,
            file_path,
        })
    }

    /// Create the backing file if it doesn't exist, seeded with the factory
    /// default gate templates and a Supervisor admin.
    pub fn create_if_not_exists(&self) -> Result<(), std::io::Error> {
        if !self.file_path.exists() {
            let store = Store::seed();
            store.save(&self.file_path)?;
        }
        Ok(())
    }
}

/// Convert a display name to a safe workspace name for file naming.
/// Converts to lowercase and replaces spaces with underscores.
pub fn sanitize_workspace_name(display_name: &str) -> String {
    display_name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Discover all existing workspaces in the data directory.
pub fn discover_workspaces(data_dir: &Path) -> Result<Vec<Workspace>, std::io::Error> {
    let mut workspaces = Vec::new();

    if !data_dir.exists() {
        return Ok(workspaces);
    }

    for entry in fs::read_dir(data_dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() {
            if let Some(ws) = Workspace::from_file(path) {
                workspaces.push(ws);
            }
        }
    }

    workspaces.sort_by(|a, b| a.display_name.cmp(&b.display_name));

    Ok(workspaces)
}

/// Find the most recently modified workspace in the data directory.
pub fn get_most_recent_workspace(data_dir: &Path) -> Result<Option<Workspace>, std::io::Error> {
    let workspaces = discover_workspaces(data_dir)?;

    if workspaces.is_empty() {
        return Ok(None);
    }

    let mut most_recent: Option<(Workspace, std::time::SystemTime)> = None;

    for ws in workspaces {
        if let Ok(metadata) = fs::metadata(&ws.file_path) {
            if let Ok(modified) = metadata.modified() {
                match most_recent {
                    None => most_recent = Some((ws, modified)),
                    Some((_, current_time)) => {
                        if modified > current_time {
                            most_recent = Some((ws, modified));
                        }
                    }
                }
            }
        }
    }

    Ok(most_recent.map(|(ws, _)| ws))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_workspace_name() {
        assert_eq!(sanitize_workspace_name("Main Floor"), "main_floor");
        assert_eq!(sanitize_workspace_name("Line-2_East"), "line_2_east");
        assert_eq!(sanitize_workspace_name("Weld!@#Shop"), "weld_shop");
        assert_eq!(sanitize_workspace_name("  Multiple   Spaces  "), "multiple_spaces");
        assert_eq!(sanitize_workspace_name(""), "");
    }

    #[test]
    fn from_file_requires_the_naming_convention() {
        let ws = Workspace::from_file(PathBuf::from("/data/main_floor_workspace.json")).unwrap();
        assert_eq!(ws.name, "main_floor");
        assert_eq!(ws.display_name, "main floor");
        assert!(Workspace::from_file(PathBuf::from("/data/notes.json")).is_none());
    }

    #[test]
    fn discover_and_seed_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new("Main Floor", dir.path());
        ws.create_if_not_exists().unwrap();

        let found = discover_workspaces(dir.path()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "main_floor");

        let store = Store::load(&found[0].file_path);
        assert_eq!(store.users[0].name, "Supervisor");
    }
}
