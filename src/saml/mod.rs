//! SAML 1.1 / 2.0 assertion model and validators.
//!
//! The model is the parsed form of an assertion as handed over by the XML
//! security processor; this crate never touches the XML itself. Statements
//! are held as a closed enum so validator dispatch is an exhaustive match
//! rather than a runtime-type lookup.

use crate::wss::X509Cert;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod constants;
pub mod statements;
pub mod subject;
pub mod validate;

/// SAML assertion version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SamlVersion {
    /// SAML 1.1
    V1_1,

    /// SAML 2.0
    V2_0,
}

/// A parsed SAML assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamlAssertion {
    /// Assertion ID; doubles as the element identity of the assertion
    /// element for signed-element matching.
    pub assertion_id: String,

    /// Declared SAML version
    pub version: SamlVersion,

    /// Issuer of the assertion
    pub issuer: String,

    /// Issue instant
    pub issue_instant: DateTime<Utc>,

    /// Subject information
    pub subject: Option<SamlSubject>,

    /// Conditions (validity constraints)
    pub conditions: Option<SamlConditions>,

    /// Statements, in document order
    pub statements: Vec<SamlStatement>,
}

impl SamlAssertion {
    /// Statements grouped into fixed dispatch order: authentication,
    /// then authorization, then attribute.
    pub fn statements_in_kind_order(&self) -> impl Iterator<Item = &SamlStatement> {
        [
            StatementKind::Authentication,
            StatementKind::Authorization,
            StatementKind::Attribute,
        ]
        .into_iter()
        .flat_map(move |kind| self.statements.iter().filter(move |s| s.kind() == kind))
    }
}

/// The statement kinds an assertion may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementKind {
    Authentication,
    Authorization,
    Attribute,
}

/// A single statement inside an assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SamlStatement {
    /// Authentication statement (SAML 1.1) / AuthnStatement (SAML 2.0)
    Authentication(SamlAuthenticationStatement),

    /// AuthorizationDecisionStatement / AuthzDecisionStatement
    Authorization(SamlAuthorizationStatement),

    /// AttributeStatement
    Attribute(SamlAttributeStatement),
}

impl SamlStatement {
    /// The kind of this statement.
    pub fn kind(&self) -> StatementKind {
        match self {
            SamlStatement::Authentication(_) => StatementKind::Authentication,
            SamlStatement::Authorization(_) => StatementKind::Authorization,
            SamlStatement::Attribute(_) => StatementKind::Attribute,
        }
    }
}

/// SAML authentication statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamlAuthenticationStatement {
    /// Authentication method URI (SAML 1.1 AuthenticationMethod attribute
    /// or SAML 2.0 AuthnContextClassRef). Absent on a malformed statement.
    pub method: Option<String>,

    /// Authentication instant
    pub instant: DateTime<Utc>,

    /// Session index (SAML 2.0)
    pub session_index: Option<String>,
}

/// SAML authorization decision statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamlAuthorizationStatement {
    /// Resource being accessed
    pub resource: String,

    /// Decision string as presented ("Permit", "Deny", "Indeterminate")
    pub decision: String,

    /// Actions being performed
    pub actions: Vec<SamlAction>,
}

/// SAML action within an authorization decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamlAction {
    /// Action value
    pub value: String,

    /// Action namespace
    pub namespace: Option<String>,
}

/// SAML attribute statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamlAttributeStatement {
    /// Attributes
    pub attributes: Vec<SamlAttribute>,
}

/// SAML attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamlAttribute {
    /// Attribute name
    pub name: String,

    /// Attribute namespace (SAML 1.1 AttributeNamespace)
    pub namespace: Option<String>,

    /// Name format (SAML 2.0 NameFormat)
    pub name_format: Option<String>,

    /// Attribute values as text
    pub values: Vec<String>,
}

/// SAML subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamlSubject {
    /// Name identifier
    pub name_id: Option<SamlNameId>,

    /// Subject confirmations
    pub confirmations: Vec<SamlSubjectConfirmation>,

    /// Subject certificate from the confirmation KeyInfo, when one was
    /// presented (holder-of-key proof material)
    pub certificate: Option<X509Cert>,
}

/// SAML name identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamlNameId {
    /// Value of the name identifier
    pub value: String,

    /// Format of the name identifier
    pub format: Option<String>,

    /// Name qualifier
    pub name_qualifier: Option<String>,
}

/// SAML subject confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamlSubjectConfirmation {
    /// Confirmation method URI
    pub method: String,

    /// Not before timestamp of the confirmation data window
    pub not_before: Option<DateTime<Utc>>,

    /// Not on or after timestamp of the confirmation data window
    pub not_on_or_after: Option<DateTime<Utc>>,
}

/// SAML conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamlConditions {
    /// Not before timestamp
    pub not_before: Option<DateTime<Utc>>,

    /// Not on or after timestamp
    pub not_on_or_after: Option<DateTime<Utc>>,

    /// Audience restrictions
    pub audience_restrictions: Vec<SamlAudienceRestriction>,

    /// Number of OneTimeUse condition elements presented
    pub one_time_use_count: u32,

    /// Number of ProxyRestriction condition elements presented
    pub proxy_restriction_count: u32,
}

/// SAML audience restriction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamlAudienceRestriction {
    /// Audience URIs
    pub audiences: Vec<String>,
}

/// Builder for assembling assertions, mainly used by tests and fixtures.
pub struct SamlAssertionBuilder {
    assertion: SamlAssertion,
}

impl SamlAssertionBuilder {
    /// Create a new builder for the given issuer and version.
    pub fn new(issuer: &str, version: SamlVersion) -> Self {
        Self {
            assertion: SamlAssertion {
                assertion_id: format!("SamlAssertion-{}", uuid::Uuid::new_v4()),
                version,
                issuer: issuer.to_string(),
                issue_instant: Utc::now(),
                subject: None,
                conditions: None,
                statements: Vec::new(),
            },
        }
    }

    /// Override the assertion ID.
    pub fn with_assertion_id(mut self, id: &str) -> Self {
        self.assertion.assertion_id = id.to_string();
        self
    }

    /// Set the subject.
    pub fn with_subject(mut self, subject: SamlSubject) -> Self {
        self.assertion.subject = Some(subject);
        self
    }

    /// Set conditions.
    pub fn with_conditions(mut self, conditions: SamlConditions) -> Self {
        self.assertion.conditions = Some(conditions);
        self
    }

    /// Set a validity window, creating conditions if needed.
    pub fn with_validity_period(
        mut self,
        not_before: DateTime<Utc>,
        not_on_or_after: DateTime<Utc>,
    ) -> Self {
        let conditions = self
            .assertion
            .conditions
            .get_or_insert_with(SamlConditions::default);
        conditions.not_before = Some(not_before);
        conditions.not_on_or_after = Some(not_on_or_after);
        self
    }

    /// Add an audience restriction containing a single audience.
    pub fn with_audience(mut self, audience: &str) -> Self {
        let conditions = self
            .assertion
            .conditions
            .get_or_insert_with(SamlConditions::default);
        conditions
            .audience_restrictions
            .push(SamlAudienceRestriction {
                audiences: vec![audience.to_string()],
            });
        self
    }

    /// Add a statement.
    pub fn with_statement(mut self, statement: SamlStatement) -> Self {
        self.assertion.statements.push(statement);
        self
    }

    /// Build the assertion.
    pub fn build(self) -> SamlAssertion {
        self.assertion
    }
}

impl Default for SamlConditions {
    fn default() -> Self {
        Self {
            not_before: None,
            not_on_or_after: None,
            audience_restrictions: Vec::new(),
            one_time_use_count: 0,
            proxy_restriction_count: 0,
        }
    }
}
