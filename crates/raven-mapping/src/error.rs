use thiserror::Error;

pub type Result<T> = std::result::Result<T, MappingError>;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("failed to rewrite class {name}: {source}")]
    Rewrite {
        name: String,
        #[source]
        source: raven_classfile::Error,
    },

    #[error(
        "cannot rename variable slot {slot} in {owner}.{method_name}: \
         the method has no local variable table (debug info stripped)"
    )]
    LocalVariableTableMissing {
        owner: String,
        method_name: String,
        slot: u16,
    },

    #[error("cannot rename {from} to {to}: the target name is already taken")]
    RenameCollision { from: String, to: String },

    #[error("transformer {name} failed: {message}")]
    TransformerFailed { name: String, message: String },

    #[error("no transform available to undo")]
    NothingToUndo,

    #[error(transparent)]
    Workspace(#[from] raven_workspace::WorkspaceError),
}
