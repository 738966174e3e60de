//! Per-statement-kind SAML validators.
//!
//! Each validator checks one statement kind against its configured
//! constraints and appends [`ValidationError`] entries for every violation.
//! Dispatch by kind happens in the orchestrator; the closed statement enum
//! makes handing a validator the wrong kind unrepresentable.

use crate::config::{
    AttributeStatementConstraints, AuthenticationStatementConstraints,
    AuthorizationStatementConstraints,
};
use crate::errors::{PolicyError, Result};
use crate::saml::constants;
use crate::saml::{SamlAttributeStatement, SamlAuthenticationStatement, SamlAuthorizationStatement};
use crate::validation::ValidationError;
use tracing::debug;

/// A matched attribute exposed to the policy engine as a variable.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedAttribute {
    /// Attribute name
    pub name: String,

    /// All values the presented attribute carried
    pub values: Vec<String>,
}

/// Validates authentication statements against a configured method list.
#[derive(Debug, Clone)]
pub struct AuthenticationStatementValidator {
    constraints: AuthenticationStatementConstraints,
}

impl AuthenticationStatementValidator {
    pub fn new(constraints: AuthenticationStatementConstraints) -> Self {
        Self { constraints }
    }

    /// Check the presented authentication method.
    ///
    /// An empty configured method list accepts any method; otherwise the
    /// presented method must match one configured method after mapping
    /// SAML 1.1 URIs into the SAML 2.0 space.
    pub fn validate(
        &self,
        statement: &SamlAuthenticationStatement,
        errors: &mut Vec<ValidationError>,
    ) {
        let presented = match statement.method.as_deref() {
            Some(m) if !m.is_empty() => m,
            _ => {
                errors.push(ValidationError::new(
                    "Authentication statement does not specify an authentication method",
                ));
                return;
            }
        };

        if self.constraints.methods.is_empty() {
            return;
        }

        let presented_normalized = constants::normalize_authentication_method(presented);
        let matched = self
            .constraints
            .methods
            .iter()
            .any(|m| constants::normalize_authentication_method(m) == presented_normalized);

        if !matched {
            debug!(method = presented, "authentication method rejected");
            errors.push(ValidationError::new(format!(
                "Authentication method not matched expected: {} received: {}",
                self.constraints.methods.join(", "),
                presented
            )));
        }
    }
}

/// Validates authorization decision statements.
#[derive(Debug, Clone)]
pub struct AuthorizationStatementValidator {
    constraints: AuthorizationStatementConstraints,
}

impl AuthorizationStatementValidator {
    pub fn new(constraints: AuthorizationStatementConstraints) -> Self {
        Self { constraints }
    }

    /// Check resource, decision and action constraints.
    pub fn validate(
        &self,
        statement: &SamlAuthorizationStatement,
        errors: &mut Vec<ValidationError>,
    ) {
        if statement.resource != self.constraints.resource {
            errors.push(ValidationError::new(format!(
                "Authorization statement resource does not match, expected: {} received: {}",
                self.constraints.resource, statement.resource
            )));
            return;
        }

        if statement.decision != constants::DECISION_PERMIT {
            errors.push(ValidationError::new(format!(
                "Authorization decision is not {}, received: {}",
                constants::DECISION_PERMIT,
                statement.decision
            )));
            return;
        }

        let wanted_action = self.constraints.action.as_deref().unwrap_or("");
        let wanted_namespace = self.constraints.action_namespace.as_deref().unwrap_or("");
        if wanted_action.is_empty() && wanted_namespace.is_empty() {
            return;
        }

        // Empty configured action or namespace matches anything.
        let matched = statement.actions.iter().any(|action| {
            let action_ok = wanted_action.is_empty() || action.value == wanted_action;
            let namespace_ok = wanted_namespace.is_empty()
                || action.namespace.as_deref().unwrap_or("") == wanted_namespace;
            action_ok && namespace_ok
        });

        if !matched {
            errors.push(ValidationError::new(format!(
                "No authorization statement action matched, expected action: {} namespace: {}",
                wanted_action, wanted_namespace
            )));
        }
    }
}

/// Validates attribute statements against a set of expected attributes.
#[derive(Debug, Clone)]
pub struct AttributeStatementValidator {
    constraints: AttributeStatementConstraints,
}

impl AttributeStatementValidator {
    /// Create the validator.
    ///
    /// Attribute constraints with no expected attributes are a broken
    /// assertion configuration and fail construction.
    pub fn new(constraints: AttributeStatementConstraints) -> Result<Self> {
        if constraints.attributes.is_empty() {
            return Err(PolicyError::contract(
                "attribute statement constraints configured without any expected attributes",
            ));
        }
        Ok(Self { constraints })
    }

    /// Check every configured attribute against the presented statement.
    ///
    /// All-or-nothing: the first configured attribute with no presented
    /// match records one error and aborts further checking. Matched
    /// attributes are reported to `collector` when one is supplied.
    pub fn validate(
        &self,
        statement: &SamlAttributeStatement,
        errors: &mut Vec<ValidationError>,
        mut collector: Option<&mut Vec<CapturedAttribute>>,
    ) {
        for expected in &self.constraints.attributes {
            let mut satisfied = false;

            for presented in statement.attributes.iter().filter(|presented| {
                presented.name == expected.name
                    && optional_matches(&expected.namespace, &presented.namespace)
                    && optional_matches(&expected.name_format, &presented.name_format)
            }) {
                let value_ok = if expected.any_value {
                    presented.values.iter().any(|v| !v.is_empty())
                } else {
                    let wanted = expected.value.as_deref().unwrap_or("");
                    presented.values.iter().any(|v| v == wanted)
                };

                if value_ok {
                    if let Some(collector) = collector.as_mut() {
                        collector.push(CapturedAttribute {
                            name: presented.name.clone(),
                            values: presented.values.clone(),
                        });
                    }
                    satisfied = true;
                    break;
                }
            }

            if !satisfied {
                errors.push(ValidationError::new(format!(
                    "No matching value for attribute {} (namespace: {})",
                    expected.name,
                    expected.namespace.as_deref().unwrap_or("")
                )));
                return;
            }
        }
    }
}

/// A configured `None` or empty string matches any presented value;
/// otherwise the presented value must equal it exactly.
fn optional_matches(expected: &Option<String>, presented: &Option<String>) -> bool {
    match expected.as_deref() {
        None | Some("") => true,
        Some(want) => presented.as_deref().unwrap_or("") == want,
    }
}
