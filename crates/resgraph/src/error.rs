//! Error types for graph construction, resolution and planning.
//!
//! Every variant is raised before the provisioning backend is contacted.
//! Failures reported by the backend itself are not errors of this crate:
//! they are captured per node in [`crate::NodeStatus::Failed`].

use thiserror::Error;

/// Phase of a run in which an error is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid declaration (missing attribute, duplicate id, unknown node)
    Validation,
    /// A reference points at a node that is not part of the graph
    Resolution,
    /// The dependency relation is not acyclic
    Planning,
    /// An output was requested before it was published
    Output,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Invalid topology declaration",
            Self::Resolution => "Unresolvable reference",
            Self::Planning => "Dependency cycle",
            Self::Output => "Output not yet available",
        }
    }
}

/// Errors raised while building, resolving or planning a resource graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Two nodes were declared with the same id
    #[error("duplicate node id: {0}")]
    DuplicateId(String),

    /// A required attribute is missing or a supplied value is unusable
    #[error("node {node}: invalid attribute {attribute}: {reason}")]
    InvalidAttribute {
        /// Node (or input) the attribute belongs to
        node: String,
        /// Attribute name
        attribute: String,
        /// What is wrong with it
        reason: String,
    },

    /// An edge or explicit dependency names a node that does not exist
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// A reference attribute names a node that does not exist
    #[error("node {node} references unknown node {target} in attribute {attribute}")]
    DanglingReference {
        /// Node holding the reference
        node: String,
        /// Attribute holding the reference
        attribute: String,
        /// Referenced node id
        target: String,
    },

    /// Adding an edge would close a dependency cycle
    #[error("dependency cycle: {}", .path.join(" -> "))]
    Cycle {
        /// Node ids along the cycle, first and last element equal
        path: Vec<String>,
    },

    /// Two exports share a name
    #[error("duplicate export name: {0}")]
    DuplicateExport(String),

    /// An output was resolved before its node was provisioned
    #[error("output {name} of node {node} has not been published")]
    UnpublishedOutput {
        /// Node id
        node: String,
        /// Output name
        name: String,
    },

    /// The graph no longer accepts nodes or edges
    #[error("graph is sealed")]
    Sealed,
}

impl Error {
    /// Shorthand for [`Error::InvalidAttribute`].
    pub fn invalid(
        node: impl Into<String>,
        attribute: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidAttribute {
            node: node.into(),
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }

    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DuplicateId(_)
            | Self::InvalidAttribute { .. }
            | Self::UnknownNode(_)
            | Self::DuplicateExport(_)
            | Self::Sealed => ErrorCategory::Validation,
            Self::DanglingReference { .. } => ErrorCategory::Resolution,
            Self::Cycle { .. } => ErrorCategory::Planning,
            Self::UnpublishedOutput { .. } => ErrorCategory::Output,
        }
    }
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display_joins_path() {
        let err = Error::Cycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle: a -> b -> a");
        assert_eq!(err.category(), ErrorCategory::Planning);
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            Error::invalid("n", "cidr", "missing").category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            Error::DanglingReference {
                node: "a".into(),
                attribute: "vpcId".into(),
                target: "b".into(),
            }
            .category(),
            ErrorCategory::Resolution
        );
    }
}
