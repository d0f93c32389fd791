//! The wire error taxonomy and conversions from every service error.

use serde_json::{json, Value};
use thiserror::Error;

use raven_backend::{BackendDiagnostic, BackendError};
use raven_graph::GraphError;
use raven_mapping::MappingError;
use raven_search::SearchError;
use raven_workspace::{ResolveError, WorkspaceError};

pub type OpResult<T> = std::result::Result<T, OpError>;

#[derive(Debug, Error)]
pub enum OpError {
    #[error("{message}")]
    BadRequest {
        message: String,
        parameter: Option<String>,
    },

    #[error("no workspace is open")]
    NoWorkspace,

    #[error("{message}")]
    NotFound {
        message: String,
        suggestions: Vec<String>,
    },

    #[error("{message}")]
    Ambiguous {
        message: String,
        candidates: Vec<String>,
    },

    #[error("{message}")]
    Unsupported { message: String },

    #[error("{message}")]
    State { message: String },

    #[error("{message}")]
    Timeout { message: String },

    #[error("{message}")]
    BackendFailure {
        message: String,
        diagnostics: Vec<BackendDiagnostic>,
    },

    #[error("{message}")]
    Internal { message: String },
}

impl OpError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        OpError::BadRequest {
            message: message.into(),
            parameter: None,
        }
    }

    pub fn bad_parameter(parameter: &str, message: impl Into<String>) -> Self {
        OpError::BadRequest {
            message: message.into(),
            parameter: Some(parameter.to_string()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        OpError::Internal {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OpError::BadRequest { .. } => "bad-request",
            OpError::NoWorkspace => "no-workspace",
            OpError::NotFound { .. } => "not-found",
            OpError::Ambiguous { .. } => "ambiguous",
            OpError::Unsupported { .. } => "unsupported",
            OpError::State { .. } => "state",
            OpError::Timeout { .. } => "timeout",
            OpError::BackendFailure { .. } => "backend-failure",
            OpError::Internal { .. } => "internal",
        }
    }

    /// The wire shape: `{kind, message}` plus the kind-specific fields.
    pub fn to_payload(&self) -> Value {
        let mut payload = json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        let map = payload.as_object_mut().expect("payload is an object");
        match self {
            OpError::BadRequest {
                parameter: Some(parameter),
                ..
            } => {
                map.insert("parameter".to_string(), json!(parameter));
            }
            OpError::NotFound { suggestions, .. } if !suggestions.is_empty() => {
                map.insert("suggestions".to_string(), json!(suggestions));
            }
            OpError::Ambiguous { candidates, .. } => {
                map.insert("candidates".to_string(), json!(candidates));
            }
            OpError::BackendFailure { diagnostics, .. } if !diagnostics.is_empty() => {
                let rendered: Vec<Value> = diagnostics
                    .iter()
                    .map(|d| {
                        json!({
                            "line": d.line,
                            "column": d.column,
                            "message": d.message,
                        })
                    })
                    .collect();
                map.insert("diagnostics".to_string(), json!(rendered));
            }
            _ => {}
        }
        payload
    }
}

impl From<ResolveError> for OpError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound { query, suggestions } => OpError::NotFound {
                message: format!("class {query} not found"),
                suggestions,
            },
            ResolveError::Ambiguous { query, candidates } => OpError::Ambiguous {
                message: format!("simple name {query} matches multiple classes"),
                candidates,
            },
        }
    }
}

impl From<WorkspaceError> for OpError {
    fn from(err: WorkspaceError) -> Self {
        match err {
            WorkspaceError::ClassNotFound { name } => OpError::NotFound {
                message: format!("class {name} not found in workspace"),
                suggestions: Vec::new(),
            },
            WorkspaceError::NotJvm { name } => OpError::Unsupported {
                message: format!("class {name} is not a JVM class"),
            },
            WorkspaceError::UnsupportedArtifact { path } => OpError::BadRequest {
                message: format!(
                    "unsupported artifact {}: expected a jar, directory, or .class file",
                    path.display()
                ),
                parameter: Some("path".to_string()),
            },
            WorkspaceError::DuplicateClass { .. } | WorkspaceError::MalformedClass { .. } => {
                OpError::bad_request(err.to_string())
            }
            other => OpError::internal(other.to_string()),
        }
    }
}

impl From<SearchError> for OpError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Cancelled => OpError::Timeout {
                message: "search cancelled".to_string(),
            },
        }
    }
}

impl From<GraphError> for OpError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::NotReady => OpError::State {
                message: err.to_string(),
            },
        }
    }
}

impl From<MappingError> for OpError {
    fn from(err: MappingError) -> Self {
        match err {
            MappingError::LocalVariableTableMissing { .. } => OpError::NotFound {
                message: err.to_string(),
                suggestions: Vec::new(),
            },
            MappingError::NothingToUndo => OpError::State {
                message: err.to_string(),
            },
            MappingError::RenameCollision { .. } => OpError::bad_request(err.to_string()),
            MappingError::TransformerFailed { ref message, .. } => OpError::BackendFailure {
                message: err.to_string(),
                diagnostics: vec![BackendDiagnostic::message(message.clone())],
            },
            MappingError::Workspace(inner) => inner.into(),
            MappingError::Rewrite { .. } => OpError::internal(err.to_string()),
        }
    }
}

impl From<BackendError> for OpError {
    fn from(err: BackendError) -> Self {
        OpError::BackendFailure {
            diagnostics: err.diagnostics.clone(),
            message: err.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_kind_specific_fields() {
        let err = OpError::NotFound {
            message: "class Foo not found".to_string(),
            suggestions: vec!["com/x/Foo".to_string()],
        };
        let payload = err.to_payload();
        assert_eq!(payload["kind"], "not-found");
        assert_eq!(payload["suggestions"][0], "com/x/Foo");

        let err = OpError::bad_parameter("pattern", "invalid regex");
        let payload = err.to_payload();
        assert_eq!(payload["kind"], "bad-request");
        assert_eq!(payload["parameter"], "pattern");
    }
}
