use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkspaceError>;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("failed to write {path}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed class {name}: {source}")]
    MalformedClass {
        name: String,
        #[source]
        source: raven_classfile::Error,
    },

    #[error("duplicate class {name} in resource {resource}")]
    DuplicateClass { name: String, resource: String },

    #[error("class {name} not found in workspace")]
    ClassNotFound { name: String },

    #[error("class {name} is not a JVM class")]
    NotJvm { name: String },

    #[error("unsupported artifact {path}: expected a jar, directory, or .class file")]
    UnsupportedArtifact { path: PathBuf },
}
