//! Constraint-violation reporting for SAML validation.
//!
//! Validators never throw for an expected, data-driven failure. They append
//! [`ValidationError`] values to a caller-supplied collection and keep going
//! wherever the constraint allows it. The presence of one or more entries is
//! the sole failure signal for a SAML validation pass.

use std::fmt;

/// A single SAML constraint violation.
///
/// Immutable after construction. Carries a formatted reason, an optional raw
/// XML context snippet for auditing, and an optional underlying cause.
#[derive(Debug)]
pub struct ValidationError {
    reason: String,
    context: Option<String>,
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ValidationError {
    /// Create a new validation error with a formatted reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            context: None,
            cause: None,
        }
    }

    /// Create a validation error carrying the raw XML context it refers to.
    pub fn with_context(reason: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            context: Some(context.into()),
            cause: None,
        }
    }

    /// Create a validation error caused by an underlying error.
    pub fn with_cause(
        reason: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            reason: reason.into(),
            context: None,
            cause: Some(Box::new(cause)),
        }
    }

    /// The formatted reason for this violation.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Raw XML context this violation refers to, when one was captured.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// The underlying cause, when one was recorded.
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync)> {
        self.cause.as_deref()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SAML Constraint Error: {}", self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefix() {
        let error = ValidationError::new("SAML ticket has expired as of: 2024-01-01T00:00:00Z");
        assert_eq!(
            error.to_string(),
            "SAML Constraint Error: SAML ticket has expired as of: 2024-01-01T00:00:00Z"
        );
    }

    #[test]
    fn test_context_and_cause() {
        let error = ValidationError::with_context("bad subject", "<saml:Subject/>");
        assert_eq!(error.context(), Some("<saml:Subject/>"));
        assert!(error.cause().is_none());

        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let error = ValidationError::with_cause("decode failed", io);
        assert!(error.cause().is_some());
        assert_eq!(error.reason(), "decode failed");
    }
}
