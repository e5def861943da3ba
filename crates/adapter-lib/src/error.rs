//! Error types shared by the mapping cache, the normalizer and the stores

use crate::models::GroupResource;
use thiserror::Error;

/// Result alias used across the adapter library
pub type Result<T> = std::result::Result<T, AdapterError>;

/// Coarse error classes callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Ambiguous,
    Transient,
    InvalidSelector,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::NotFound => "not_found",
            ErrorClass::Ambiguous => "ambiguous",
            ErrorClass::Transient => "transient",
            ErrorClass::InvalidSelector => "invalid_selector",
        }
    }
}

/// Errors returned by the adapter core
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// The current snapshot has no mapping for the resource
    #[error("the server could not find the requested resource {0}")]
    ResourceNotFound(GroupResource),

    /// The current snapshot has no resource for the kind
    #[error("no resource registered for kind {kind} in group {group:?}")]
    KindNotFound { group: String, kind: String },

    /// No value recorded for the object
    #[error("the server could not find the metric {metric} for {resource} {object}")]
    MetricNotFound {
        resource: GroupResource,
        metric: String,
        object: String,
    },

    /// A value exists but its labels do not satisfy the metric selector
    #[error(
        "the server could not find the metric {metric} for {resource} {object} with selector {selector}"
    )]
    MetricNotFoundForSelector {
        resource: GroupResource,
        metric: String,
        object: String,
        selector: String,
    },

    /// More than one group serves the resource and no preference applies
    #[error("{resource} matches multiple resources: {}", .candidates.join(", "))]
    Ambiguous {
        resource: String,
        candidates: Vec<String>,
    },

    /// A collaborator (discovery, object listing) failed
    #[error("{collaborator} failed: {message}")]
    Transient {
        collaborator: &'static str,
        message: String,
    },

    /// Selector text could not be parsed
    #[error("unable to parse selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },
}

impl AdapterError {
    /// Wrap a collaborator failure, keeping the whole context chain
    pub fn transient(collaborator: &'static str, err: &anyhow::Error) -> Self {
        AdapterError::Transient {
            collaborator,
            message: format!("{:#}", err),
        }
    }

    pub fn invalid_selector(selector: impl Into<String>, reason: impl Into<String>) -> Self {
        AdapterError::InvalidSelector {
            selector: selector.into(),
            reason: reason.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            AdapterError::ResourceNotFound(_)
            | AdapterError::KindNotFound { .. }
            | AdapterError::MetricNotFound { .. }
            | AdapterError::MetricNotFoundForSelector { .. } => ErrorClass::NotFound,
            AdapterError::Ambiguous { .. } => ErrorClass::Ambiguous,
            AdapterError::Transient { .. } => ErrorClass::Transient,
            AdapterError::InvalidSelector { .. } => ErrorClass::InvalidSelector,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let gr = GroupResource::new("", "pods");
        assert!(AdapterError::ResourceNotFound(gr.clone()).is_not_found());
        assert!(AdapterError::MetricNotFoundForSelector {
            resource: gr,
            metric: "qps".into(),
            object: "web-0".into(),
            selector: "env=prod".into(),
        }
        .is_not_found());
        assert_eq!(
            AdapterError::invalid_selector("a==", "missing value").class(),
            ErrorClass::InvalidSelector
        );
    }

    #[test]
    fn test_transient_keeps_context_chain() {
        let err = anyhow::anyhow!("connection refused").context("listing pods");
        let wrapped = AdapterError::transient("object lister", &err);
        assert_eq!(wrapped.class(), ErrorClass::Transient);
        assert_eq!(
            wrapped.to_string(),
            "object lister failed: listing pods: connection refused"
        );
    }

    #[test]
    fn test_ambiguous_message_lists_candidates() {
        let err = AdapterError::Ambiguous {
            resource: "widgets".into(),
            candidates: vec!["widgets.a.io".into(), "widgets.b.io".into()],
        };
        assert_eq!(
            err.to_string(),
            "widgets matches multiple resources: widgets.a.io, widgets.b.io"
        );
    }
}
