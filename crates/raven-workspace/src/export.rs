//! Workspace export: writes the primary resource back to disk as an archive
//! or an exploded directory.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Result, WorkspaceError};
use crate::workspace::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    Archive,
    Directory,
}

impl OutputType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "archive" | "jar" | "zip" => Some(OutputType::Archive),
            "directory" | "dir" => Some(OutputType::Directory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    /// Mirror the original artifact's layout. Per-entry compression of the
    /// source archive is not tracked, so this behaves like `Smart`.
    MatchOriginal,
    /// Deflate everything except entries already in a compressed format.
    Smart,
    Always,
    Never,
}

impl CompressionMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "match-original" | "matchoriginal" => Some(CompressionMode::MatchOriginal),
            "smart" => Some(CompressionMode::Smart),
            "always" => Some(CompressionMode::Always),
            "never" => Some(CompressionMode::Never),
            _ => None,
        }
    }

    fn method_for(self, entry_name: &str, len: usize) -> CompressionMethod {
        match self {
            CompressionMode::Always => CompressionMethod::Deflated,
            CompressionMode::Never => CompressionMethod::Stored,
            CompressionMode::Smart | CompressionMode::MatchOriginal => {
                if len < 64 || has_compressed_extension(entry_name) {
                    CompressionMethod::Stored
                } else {
                    CompressionMethod::Deflated
                }
            }
        }
    }
}

fn has_compressed_extension(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    [".png", ".jpg", ".jpeg", ".gif", ".zip", ".jar", ".gz", ".xz"]
        .iter()
        .any(|ext| lower.ends_with(ext))
}

/// Writes the primary resource to `path`.
pub fn export_primary(
    workspace: &Workspace,
    path: &Path,
    output: OutputType,
    compression: CompressionMode,
) -> Result<()> {
    let entries = collect_entries(workspace);
    match output {
        OutputType::Archive => write_archive(path, &entries, compression)?,
        OutputType::Directory => write_directory(path, &entries)?,
    }
    info!(
        path = %path.display(),
        entries = entries.len(),
        "exported primary resource"
    );
    Ok(())
}

fn collect_entries(workspace: &Workspace) -> Vec<(String, std::sync::Arc<Vec<u8>>)> {
    let primary = workspace.primary();
    let mut entries = Vec::new();
    for class in primary.classes() {
        entries.push((format!("{}.class", class.name), class.bytes));
    }
    for (name, bytes) in primary.raw_classes() {
        let entry_name = if name.ends_with(".dex") {
            name
        } else {
            format!("{name}.class")
        };
        entries.push((entry_name, bytes));
    }
    for (name, entry) in primary.files() {
        entries.push((name, entry.bytes));
    }
    entries
}

fn write_archive(
    path: &Path,
    entries: &[(String, std::sync::Arc<Vec<u8>>)],
    compression: CompressionMode,
) -> Result<()> {
    let export_err = |source: std::io::Error| WorkspaceError::Export {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(export_err)?;
    let mut writer = ZipWriter::new(file);
    for (name, bytes) in entries {
        let options = SimpleFileOptions::default()
            .compression_method(compression.method_for(name, bytes.len()));
        writer
            .start_file(name.as_str(), options)
            .map_err(|source| WorkspaceError::Archive {
                path: path.to_path_buf(),
                source,
            })?;
        writer.write_all(bytes).map_err(export_err)?;
    }
    writer.finish().map_err(|source| WorkspaceError::Archive {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn write_directory(path: &Path, entries: &[(String, std::sync::Arc<Vec<u8>>)]) -> Result<()> {
    for (name, bytes) in entries {
        let target = path.join(name);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|source| WorkspaceError::Export {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&target, bytes.as_slice()).map_err(|source| WorkspaceError::Export {
            path: target.clone(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{LoadedClass, Resource, ResourceKind};
    use raven_classfile::ClassBuilder;

    fn workspace() -> Workspace {
        let primary = Resource::new("app.jar", ResourceKind::Primary);
        let bytes = ClassBuilder::new("com/x/A").build_bytes().unwrap();
        primary
            .insert_class(LoadedClass::parse(bytes).unwrap())
            .unwrap();
        primary
            .insert_entry("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n".to_vec())
            .unwrap();
        Workspace::from_primary(primary)
    }

    #[test]
    fn directory_export_round_trips_through_open() {
        let ws = workspace();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("exploded");
        export_primary(&ws, &out, OutputType::Directory, CompressionMode::Smart).unwrap();

        assert!(out.join("com/x/A.class").exists());
        assert!(out.join("META-INF/MANIFEST.MF").exists());

        let reopened = Workspace::open(&out).unwrap();
        assert!(reopened.lookup_class("com/x/A").is_some());
    }

    #[test]
    fn archive_export_round_trips_through_open() {
        let ws = workspace();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.jar");
        export_primary(&ws, &out, OutputType::Archive, CompressionMode::Always).unwrap();

        let reopened = Workspace::open(&out).unwrap();
        assert!(reopened.lookup_class("com/x/A").is_some());
        assert_eq!(reopened.snapshot_files(crate::ResourceScope::All).len(), 1);
    }

    #[test]
    fn mode_parsing_accepts_documented_values() {
        assert_eq!(
            CompressionMode::parse("match-original"),
            Some(CompressionMode::MatchOriginal)
        );
        assert_eq!(CompressionMode::parse("SMART"), Some(CompressionMode::Smart));
        assert_eq!(CompressionMode::parse("nope"), None);
        assert_eq!(OutputType::parse("jar"), Some(OutputType::Archive));
    }
}
