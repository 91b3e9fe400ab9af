//! Write a project's artifacts to disk.

use anyhow::{Context, Result, bail};
use std::path::{Component, Path, PathBuf};
use vibeforge_common::Project;

/// Resolve an artifact name to a path under `root`. Absolute names and names
/// that climb out of `root` are rejected.
pub fn artifact_path(root: &Path, name: &str) -> Result<PathBuf> {
    let relative = Path::new(name.trim());
    if relative.as_os_str().is_empty() {
        bail!("Artifact has an empty name");
    }
    for component in relative.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                bail!("Artifact name escapes the export directory: {}", name)
            }
        }
    }
    Ok(root.join(relative))
}

/// Write every artifact with content under `dir`, creating parent
/// directories as needed. Returns the written paths in artifact order.
pub fn export_artifacts(project: &Project, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;

    let mut written = Vec::new();
    for artifact in project.files.iter().filter(|f| f.has_content()) {
        let path = artifact_path(dir, &artifact.name)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, &artifact.content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::debug!(path = %path.display(), "exported artifact");
        written.push(path);
    }
    Ok(written)
}
