//! A resource: one artifact's classes and files, split into three bundles.
//!
//! Bundles are guarded by independent read-write locks so concurrent readers
//! never contend with each other; a writer takes the bundle lock exclusively
//! and the revision bump happens while it is still held (see
//! `Workspace::commit_mutation` callers).

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use raven_classfile::{content_hash, JvmClass};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::{Result, WorkspaceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Primary,
    Supporting,
}

/// Restricts iteration/search to a subset of the workspace's resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceScope {
    #[default]
    All,
    PrimaryOnly,
}

/// A parsed JVM class plus the raw bytes it came from.
///
/// Cloning is cheap: the bytes and the parsed model are shared.
#[derive(Debug, Clone)]
pub struct LoadedClass {
    pub name: String,
    pub bytes: Arc<Vec<u8>>,
    pub class: Arc<JvmClass>,
    pub content_hash: u32,
}

impl LoadedClass {
    pub fn parse(bytes: Vec<u8>) -> std::result::Result<Self, raven_classfile::Error> {
        let class = JvmClass::parse(&bytes)?;
        let hash = content_hash(&bytes);
        Ok(Self {
            name: class.name.clone(),
            class: Arc::new(class),
            content_hash: hash,
            bytes: Arc::new(bytes),
        })
    }
}

/// A non-class file entry with its text/binary classification.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub bytes: Arc<Vec<u8>>,
    pub text: bool,
}

pub struct Resource {
    name: String,
    kind: ResourceKind,
    jvm: RwLock<BTreeMap<String, LoadedClass>>,
    /// Opaque class-like entries: `.dex` files and `.class` entries that
    /// failed to parse. Kept for listings and export, excluded from analyses.
    raw_classes: RwLock<BTreeMap<String, Arc<Vec<u8>>>>,
    files: RwLock<BTreeMap<String, FileEntry>>,
}

impl Resource {
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            jvm: RwLock::new(BTreeMap::new()),
            raw_classes: RwLock::new(BTreeMap::new()),
            files: RwLock::new(BTreeMap::new()),
        }
    }

    /// Loads a resource from a jar/zip archive, an exploded directory, or a
    /// single `.class` file. The resource is fully built before being
    /// returned, so a failed import leaves no partial state behind.
    pub fn from_path(name: impl Into<String>, kind: ResourceKind, path: &Path) -> Result<Self> {
        let resource = Self::new(name, kind);
        if path.is_dir() {
            resource.load_directory(path, path)?;
        } else if path.extension().is_some_and(|ext| ext == "class") {
            let bytes = read_file(path)?;
            resource.insert_entry(&file_name_of(path), bytes)?;
        } else if path
            .extension()
            .is_some_and(|ext| matches!(ext.to_str(), Some("jar" | "zip" | "war" | "apk")))
        {
            resource.load_archive(path)?;
        } else {
            return Err(WorkspaceError::UnsupportedArtifact {
                path: path.to_path_buf(),
            });
        }
        debug!(
            resource = %resource.name,
            classes = resource.jvm.read().len(),
            files = resource.files.read().len(),
            "loaded resource"
        );
        Ok(resource)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Adds one archive/directory entry, classifying it into a bundle.
    pub fn insert_entry(&self, entry_name: &str, bytes: Vec<u8>) -> Result<()> {
        if entry_name.ends_with(".class") {
            match LoadedClass::parse(bytes.clone()) {
                Ok(loaded) => return self.insert_class(loaded),
                Err(err) => {
                    warn!(entry = entry_name, %err, "unparsable class kept as opaque entry");
                    let key = entry_name
                        .strip_suffix(".class")
                        .unwrap_or(entry_name)
                        .to_string();
                    self.raw_classes.write().insert(key, Arc::new(bytes));
                    return Ok(());
                }
            }
        }
        if entry_name.ends_with(".dex") {
            self.raw_classes
                .write()
                .insert(entry_name.to_string(), Arc::new(bytes));
            return Ok(());
        }
        let text = classify_text(&bytes);
        self.files.write().insert(
            entry_name.to_string(),
            FileEntry {
                bytes: Arc::new(bytes),
                text,
            },
        );
        Ok(())
    }

    pub fn insert_class(&self, loaded: LoadedClass) -> Result<()> {
        let mut jvm = self.jvm.write();
        if jvm.contains_key(&loaded.name) {
            return Err(WorkspaceError::DuplicateClass {
                name: loaded.name,
                resource: self.name.clone(),
            });
        }
        jvm.insert(loaded.name.clone(), loaded);
        Ok(())
    }

    /// Replaces an existing class's bytecode in place.
    pub fn replace_class(&self, loaded: LoadedClass) -> Result<()> {
        let mut jvm = self.jvm.write();
        if !jvm.contains_key(&loaded.name) {
            return Err(WorkspaceError::ClassNotFound { name: loaded.name });
        }
        jvm.insert(loaded.name.clone(), loaded);
        Ok(())
    }

    /// Removes a class, also accepting a rename-style replacement where the
    /// old entry goes away and a new one appears atomically.
    pub fn swap_class(&self, remove: &str, insert: LoadedClass) -> Result<()> {
        let mut jvm = self.jvm.write();
        if !jvm.contains_key(remove) {
            return Err(WorkspaceError::ClassNotFound {
                name: remove.to_string(),
            });
        }
        jvm.remove(remove);
        jvm.insert(insert.name.clone(), insert);
        Ok(())
    }

    /// Replaces the whole JVM bundle content in one write (the transform
    /// undo path restores an exact snapshot).
    pub fn reset_classes(&self, classes: Vec<LoadedClass>) {
        let mut jvm = self.jvm.write();
        jvm.clear();
        for class in classes {
            jvm.insert(class.name.clone(), class);
        }
    }

    pub fn remove_class(&self, name: &str) -> Result<()> {
        let mut jvm = self.jvm.write();
        if jvm.remove(name).is_none() {
            return Err(WorkspaceError::ClassNotFound {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn get_class(&self, name: &str) -> Option<LoadedClass> {
        self.jvm.read().get(name).cloned()
    }

    pub fn has_raw_class(&self, name: &str) -> bool {
        self.raw_classes.read().contains_key(name)
    }

    pub fn class_count(&self) -> usize {
        self.jvm.read().len()
    }

    /// Snapshot of the JVM bundle in name order.
    pub fn classes(&self) -> Vec<LoadedClass> {
        self.jvm.read().values().cloned().collect()
    }

    pub fn raw_classes(&self) -> Vec<(String, Arc<Vec<u8>>)> {
        self.raw_classes
            .read()
            .iter()
            .map(|(name, bytes)| (name.clone(), bytes.clone()))
            .collect()
    }

    pub fn files(&self) -> Vec<(String, FileEntry)> {
        self.files
            .read()
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect()
    }

    fn load_archive(&self, path: &Path) -> Result<()> {
        let file = File::open(path).map_err(|source| WorkspaceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut archive = ZipArchive::new(file).map_err(|source| WorkspaceError::Archive {
            path: path.to_path_buf(),
            source,
        })?;
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|source| WorkspaceError::Archive {
                    path: path.to_path_buf(),
                    source,
                })?;
            if entry.is_dir() {
                continue;
            }
            let entry_name = entry.name().to_string();
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut bytes)
                .map_err(|source| WorkspaceError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            self.insert_entry(&entry_name, bytes)?;
        }
        Ok(())
    }

    fn load_directory(&self, root: &Path, dir: &Path) -> Result<()> {
        let entries = std::fs::read_dir(dir).map_err(|source| WorkspaceError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| WorkspaceError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_dir() {
                self.load_directory(root, &path)?;
            } else {
                let relative = path
                    .strip_prefix(root)
                    .expect("directory walk stays under root")
                    .to_string_lossy()
                    .replace('\\', "/");
                let bytes = read_file(&path)?;
                self.insert_entry(&relative, bytes)?;
            }
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| WorkspaceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Cheap text/binary probe: valid UTF-8 prefix with no NUL bytes.
fn classify_text(bytes: &[u8]) -> bool {
    let probe = &bytes[..bytes.len().min(8192)];
    if probe.contains(&0) {
        return false;
    }
    match std::str::from_utf8(probe) {
        Ok(_) => true,
        // A multi-byte sequence may be cut off by the probe window.
        Err(err) => err.valid_up_to() + 4 >= probe.len(),
    }
}
