//! Configuration types for the policy enforcement core.
//!
//! Every constraint struct here is immutable once an assertion instance is
//! constructed; validators hold them by value and never mutate them, which is
//! what makes concurrent per-message invocation safe. Process-wide tunables
//! are an explicit [`GatewayTunables`] value threaded through constructors
//! rather than read from global state, with ranges enforced at load time
//! instead of at each use.

use crate::errors::{PolicyError, Result};
use crate::saml::SamlVersion;
use serde::{Deserialize, Serialize};

/// Upper bound for the SAML grace periods, in minutes.
pub const MAX_GRACE_PERIOD_MINUTES: i64 = 30_000;

/// Process-wide tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayTunables {
    /// Grace period subtracted from `NotBefore` during validity checks,
    /// in minutes. Valid range [0, 30000].
    pub not_before_grace_min: i64,

    /// Grace period added to `NotOnOrAfter` during validity checks,
    /// in minutes. Valid range [0, 30000].
    pub not_on_or_after_grace_min: i64,

    /// When set, SAML signing tokens reuse the key-encryption algorithm
    /// detected on the request and plain X.509 signing tokens do not,
    /// reversing the default selection.
    pub saml_reuses_key_encryption_algorithm: bool,
}

impl Default for GatewayTunables {
    fn default() -> Self {
        Self {
            not_before_grace_min: 2,
            not_on_or_after_grace_min: 2,
            saml_reuses_key_encryption_algorithm: false,
        }
    }
}

impl GatewayTunables {
    /// Validate ranges. Called once at configuration load.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("not_before_grace_min", self.not_before_grace_min),
            ("not_on_or_after_grace_min", self.not_on_or_after_grace_min),
        ] {
            if !(0..=MAX_GRACE_PERIOD_MINUTES).contains(&value) {
                return Err(PolicyError::config(format!(
                    "{name} must be within [0, {MAX_GRACE_PERIOD_MINUTES}] minutes, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Which identity an outgoing decoration targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityTarget {
    /// Whoever last authenticated on the request.
    LastAuthenticated,

    /// A specific authenticated identity.
    Specific(String),
}

impl Default for IdentityTarget {
    fn default() -> Self {
        Self::LastAuthenticated
    }
}

/// SAML assertion constraints for one policy assertion instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamlPolicy {
    /// Required SAML version; `None` accepts both 1.1 and 2.0.
    pub version: Option<SamlVersion>,

    /// Authentication statement constraints, when that statement kind is
    /// required.
    pub authentication: Option<AuthenticationStatementConstraints>,

    /// Authorization statement constraints, when that statement kind is
    /// required.
    pub authorization: Option<AuthorizationStatementConstraints>,

    /// Attribute statement constraints, when that statement kind is
    /// required.
    pub attributes: Option<AttributeStatementConstraints>,

    /// Required NameIdentifier qualifier; skipped when the presented
    /// NameID carries no qualifier.
    pub name_qualifier: Option<String>,

    /// Acceptable NameIdentifier formats. A list containing the
    /// unspecified wildcard accepts any presented format.
    pub name_formats: Vec<String>,

    /// Acceptable subject confirmation method URIs, in either SAML
    /// version's URI space.
    pub subject_confirmations: Vec<String>,

    /// Whether a subject with no (surviving) confirmation passes.
    pub allow_no_subject_confirmation: bool,

    /// Required audience; every presented AudienceRestriction must
    /// contain it.
    pub audience_restriction: Option<String>,

    /// Whether the assertion must carry a OneTimeUse condition.
    pub require_one_time_use: bool,

    /// Cap on how far NotOnOrAfter may lie in the future, in seconds.
    /// `None` accepts any expiry the issuer chose.
    pub max_expiry_seconds: Option<i64>,

    /// Whether the Conditions validity window is checked.
    pub check_assertion_validity: bool,

    /// Whether per-confirmation validity windows are checked.
    pub check_subject_confirmation_validity: bool,

    /// Holder-of-key: require the SOAP body or WSS timestamp to be signed
    /// with the subject certificate.
    pub require_holder_of_key_with_message_signature: bool,

    /// Sender-vouches: require the SOAP body or WSS timestamp to be
    /// signed by an attesting X.509 entity.
    pub require_sender_vouches_with_message_signature: bool,
}

/// Authentication statement constraints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthenticationStatementConstraints {
    /// Acceptable authentication method URIs, in either SAML version's
    /// URI space. Empty accepts any method.
    pub methods: Vec<String>,
}

/// Authorization decision statement constraints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizationStatementConstraints {
    /// Resource the decision must cover, compared exactly.
    pub resource: String,

    /// Required action value; empty matches any presented action.
    pub action: Option<String>,

    /// Required action namespace; empty matches any presented namespace.
    pub action_namespace: Option<String>,
}

/// Attribute statement constraints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeStatementConstraints {
    /// Expected attributes; all must be satisfied.
    pub attributes: Vec<ExpectedAttribute>,
}

/// One expected attribute within an attribute statement constraint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpectedAttribute {
    /// Attribute name
    pub name: String,

    /// Attribute namespace (SAML 1.1); `None` matches any.
    pub namespace: Option<String>,

    /// Name format (SAML 2.0); `None` matches any.
    pub name_format: Option<String>,

    /// Exact expected value. Ignored when `any_value` is set.
    pub value: Option<String>,

    /// Accept any non-empty presented value.
    pub any_value: bool,
}

/// Response encryption constraints for one policy assertion instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncryptionPolicy {
    /// Base64 DER certificate of an explicitly addressed, non-local
    /// recipient. `None` targets the local recipient, resolving key
    /// material from the request instead.
    pub recipient_certificate_b64: Option<String>,

    /// Identity whose request signing token supplies the key material.
    pub identity_target: IdentityTarget,

    /// Key-encryption algorithm override URI.
    pub key_encryption_algorithm: Option<String>,
}

/// Replay protection constraints for one policy assertion instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayPolicy {
    /// Identifier scope. Identifiers from policies with different scopes
    /// never collide; `None` uses the cluster-wide default scope.
    pub scope: Option<String>,

    /// Custom validity window in seconds, overriding the window derived
    /// from the message timestamp.
    pub custom_expiry_seconds: Option<i64>,

    /// Hard ceiling on accepted WS-Addressing MessageID length in bytes.
    pub max_message_id_bytes: usize,

    /// MessageIDs longer than this are stored as a SHA-512 surrogate.
    pub hash_threshold_bytes: usize,
}

impl Default for ReplayPolicy {
    fn default() -> Self {
        Self {
            scope: None,
            custom_expiry_seconds: None,
            max_message_id_bytes: 8192,
            hash_threshold_bytes: 255,
        }
    }
}

impl ReplayPolicy {
    /// Validate the policy. Called once at configuration load.
    pub fn validate(&self) -> Result<()> {
        if self.hash_threshold_bytes > self.max_message_id_bytes {
            return Err(PolicyError::config(format!(
                "hash_threshold_bytes ({}) exceeds max_message_id_bytes ({})",
                self.hash_threshold_bytes, self.max_message_id_bytes
            )));
        }
        if let Some(expiry) = self.custom_expiry_seconds {
            if expiry <= 0 {
                return Err(PolicyError::config(format!(
                    "custom_expiry_seconds must be positive, got {expiry}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tunables_defaults_valid() {
        let tunables = GatewayTunables::default();
        assert!(tunables.validate().is_ok());
        assert_eq!(tunables.not_before_grace_min, 2);
        assert_eq!(tunables.not_on_or_after_grace_min, 2);
    }

    #[test]
    fn test_tunables_range_enforced() {
        let mut tunables = GatewayTunables::default();
        tunables.not_before_grace_min = -1;
        assert!(tunables.validate().is_err());

        tunables.not_before_grace_min = MAX_GRACE_PERIOD_MINUTES + 1;
        assert!(tunables.validate().is_err());

        tunables.not_before_grace_min = MAX_GRACE_PERIOD_MINUTES;
        assert!(tunables.validate().is_ok());
    }

    #[test]
    fn test_replay_policy_validation() {
        assert!(ReplayPolicy::default().validate().is_ok());

        let mut policy = ReplayPolicy::default();
        policy.hash_threshold_bytes = policy.max_message_id_bytes + 1;
        assert!(policy.validate().is_err());

        let mut policy = ReplayPolicy::default();
        policy.custom_expiry_seconds = Some(0);
        assert!(policy.validate().is_err());
    }
}
