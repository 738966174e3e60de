//! SAML assertion validator.
//!
//! Single-pass orchestrator over one processed Security header: finds the
//! assertion token, dispatches its statements to the configured per-kind
//! validators, checks subject and conditions, classifies the assertion's
//! signatures, and runs the confirmation-method proof branch. Constraint
//! violations accumulate as [`ValidationError`] entries; only malformed
//! configuration surfaces as [`PolicyError`].

use crate::config::{GatewayTunables, SamlPolicy};
use crate::errors::Result;
use crate::saml::constants;
use crate::saml::statements::{
    AttributeStatementValidator, AuthenticationStatementValidator, AuthorizationStatementValidator,
    CapturedAttribute,
};
use crate::saml::subject::{self, now_millis};
use crate::saml::{SamlAssertion, SamlStatement};
use crate::validation::ValidationError;
use crate::wss::{
    MessageContext, MessagePart, ProcessedSecurityResult, SecurityToken, SignedElement, X509Cert,
};
use tracing::{debug, info};

/// What a successful validation pass hands back to the policy engine.
#[derive(Debug, Clone, Default)]
pub struct SamlValidationOutcome {
    /// The X.509 entity vouching for the subject, when the confirmation
    /// branch established one.
    pub attesting_entity: Option<X509Cert>,

    /// Attribute values matched by the attribute statement constraints,
    /// for exposure as context variables.
    pub captured_attributes: Vec<CapturedAttribute>,
}

/// Validates one SAML assertion per message against a fixed policy.
///
/// Construction validates the policy shape once; `validate` is then safe
/// to call concurrently for every message the policy applies to.
#[derive(Debug)]
pub struct SamlValidator {
    policy: SamlPolicy,
    tunables: GatewayTunables,
    authentication: Option<AuthenticationStatementValidator>,
    authorization: Option<AuthorizationStatementValidator>,
    attributes: Option<AttributeStatementValidator>,
}

impl SamlValidator {
    /// Build a validator from the policy assertion configuration.
    pub fn new(policy: SamlPolicy, tunables: GatewayTunables) -> Result<Self> {
        tunables.validate()?;

        let authentication = policy
            .authentication
            .clone()
            .map(AuthenticationStatementValidator::new);
        let authorization = policy
            .authorization
            .clone()
            .map(AuthorizationStatementValidator::new);
        let attributes = policy
            .attributes
            .clone()
            .map(AttributeStatementValidator::new)
            .transpose()?;

        Ok(Self {
            policy,
            tunables,
            authentication,
            authorization,
            attributes,
        })
    }

    /// Validate the message's SAML assertion.
    ///
    /// Appends one [`ValidationError`] per violated constraint; an empty
    /// error list after the call means the assertion passed.
    pub fn validate(
        &self,
        context: &MessageContext,
        errors: &mut Vec<ValidationError>,
    ) -> SamlValidationOutcome {
        let mut outcome = SamlValidationOutcome::default();

        let processed = match context
            .processed
            .as_ref()
            .filter(|p| p.security_namespace.is_some())
        {
            Some(p) => p,
            None => {
                errors.push(ValidationError::new(
                    "No Security Header found in the message",
                ));
                return outcome;
            }
        };

        let token = match self.find_assertion_token(processed) {
            Some(t) => t,
            None => {
                errors.push(ValidationError::new(
                    "No SAML assertion found in security Header",
                ));
                return outcome;
            }
        };
        let assertion = &token.assertion;
        debug!(assertion_id = %assertion.assertion_id, version = ?assertion.version, "validating assertion");

        self.validate_statements(assertion, errors, &mut outcome);

        let now = now_millis();
        subject::validate_subject(
            &self.policy,
            &self.tunables,
            assertion.subject.as_ref(),
            now,
            errors,
        );
        subject::validate_conditions(&self.policy, &self.tunables, assertion, now, errors);

        self.validate_signatures(processed, token, errors);
        self.validate_confirmation_proof(context, processed, assertion, errors, &mut outcome);

        if errors.is_empty() {
            info!(assertion_id = %assertion.assertion_id, "assertion accepted");
        }
        outcome
    }

    /// The first SAML token whose declared version is acceptable.
    fn find_assertion_token<'a>(
        &self,
        processed: &'a ProcessedSecurityResult,
    ) -> Option<&'a crate::wss::SamlToken> {
        processed.tokens.iter().find_map(|t| match t {
            SecurityToken::Saml(t)
                if self
                    .policy
                    .version
                    .map_or(true, |v| v == t.assertion.version) =>
            {
                Some(t)
            }
            _ => None,
        })
    }

    /// Dispatch every statement, in fixed kind order, to its configured
    /// validator. Statement kinds with no configured validator are skipped.
    fn validate_statements(
        &self,
        assertion: &SamlAssertion,
        errors: &mut Vec<ValidationError>,
        outcome: &mut SamlValidationOutcome,
    ) {
        let any_configured =
            self.authentication.is_some() || self.authorization.is_some() || self.attributes.is_some();
        let mut any_matched = false;

        for statement in assertion.statements_in_kind_order() {
            match statement {
                SamlStatement::Authentication(s) => {
                    if let Some(validator) = &self.authentication {
                        validator.validate(s, errors);
                        any_matched = true;
                    }
                }
                SamlStatement::Authorization(s) => {
                    if let Some(validator) = &self.authorization {
                        validator.validate(s, errors);
                        any_matched = true;
                    }
                }
                SamlStatement::Attribute(s) => {
                    if let Some(validator) = &self.attributes {
                        validator.validate(s, errors, Some(&mut outcome.captured_attributes));
                        any_matched = true;
                    }
                }
            }
        }

        if any_configured && !any_matched {
            errors.push(ValidationError::new(
                "No SAML assertion matches specified constraints",
            ));
        }
    }

    /// Classify signatures covering the assertion element.
    ///
    /// A signature is the assertion's own embedded issuer signature iff it
    /// covers exactly the assertion element and its signing token's element
    /// is the assertion element. One additional external signer is
    /// tolerated; none at all means the assertion arrived unsigned.
    fn validate_signatures(
        &self,
        processed: &ProcessedSecurityResult,
        token: &crate::wss::SamlToken,
        errors: &mut Vec<ValidationError>,
    ) {
        let over_assertion = processed.signatures_over(&token.element_id);

        let mut embedded = false;
        let mut external_signers: Vec<&SecurityToken> = Vec::new();

        for signed in &over_assertion {
            if is_embedded_signature(processed, signed, &token.element_id) {
                embedded = true;
                continue;
            }
            if !external_signers
                .iter()
                .any(|t| t.element_id() == signed.signing_token.element_id())
            {
                external_signers.push(&signed.signing_token);
            }
        }

        if !embedded && external_signers.is_empty() {
            errors.push(ValidationError::new(
                "Unsigned SAML assertion found in security Header",
            ));
        } else if external_signers.len() > 1 {
            errors.push(ValidationError::new(
                "SAML assertion was signed by more than one security token",
            ));
        }
    }

    /// Run the confirmation-method proof branch.
    fn validate_confirmation_proof(
        &self,
        context: &MessageContext,
        processed: &ProcessedSecurityResult,
        assertion: &SamlAssertion,
        errors: &mut Vec<ValidationError>,
        outcome: &mut SamlValidationOutcome,
    ) {
        let Some(subject) = assertion.subject.as_ref() else {
            return;
        };

        let holder_of_key = subject
            .confirmations
            .iter()
            .any(|c| constants::is_holder_of_key(&c.method));
        let sender_vouches = !holder_of_key
            && subject
                .confirmations
                .iter()
                .any(|c| constants::is_sender_vouches(&c.method));

        if holder_of_key {
            self.validate_holder_of_key(context, processed, subject, errors);
        } else if sender_vouches {
            self.validate_sender_vouches(context, processed, errors, outcome);
        }
    }

    fn validate_holder_of_key(
        &self,
        context: &MessageContext,
        processed: &ProcessedSecurityResult,
        subject: &crate::saml::SamlSubject,
        errors: &mut Vec<ValidationError>,
    ) {
        let Some(certificate) = subject.certificate.as_ref() else {
            errors.push(ValidationError::new(
                "Subject Certificate is required for Holder-Of-Key Assertion",
            ));
            return;
        };

        if self.policy.require_holder_of_key_with_message_signature {
            let body_signed = body_signed_with(processed, certificate);
            let timestamp_signed = timestamp_signed_with(processed, certificate);

            // A signature claiming to cover the Body but resolving to a
            // different element is a wrapping decoy; it invalidates the
            // timestamp-only proof path.
            let body_decoy = processed.signed_elements.iter().any(|s| {
                matches!(s.part, MessagePart::Body)
                    && s.element_id != processed.body_element_id
                    && s.signing_token.certificate() == Some(certificate)
            });

            if !(body_signed || (timestamp_signed && !body_decoy)) {
                errors.push(ValidationError::new(
                    "Holder-Of-Key Assertion requires the message Body or Timestamp signed with the Subject Certificate",
                ));
            }
        } else {
            // No in-message proof required; possession is established at
            // the transport layer instead.
            match context.transport_certificate.as_ref() {
                Some(transport) if transport == certificate => {}
                Some(_) => {
                    errors.push(ValidationError::new(
                        "Subject Certificate does not match the SSL client certificate",
                    ));
                }
                None => {
                    errors.push(ValidationError::new(
                        "SSL client certificate is required for Holder-Of-Key Assertion",
                    ));
                }
            }
        }
    }

    fn validate_sender_vouches(
        &self,
        context: &MessageContext,
        processed: &ProcessedSecurityResult,
        errors: &mut Vec<ValidationError>,
        outcome: &mut SamlValidationOutcome,
    ) {
        if self.policy.require_sender_vouches_with_message_signature {
            // Trust-chain verification of the attesting entity is the
            // authorization layer's job; here only possession of a signing
            // X.509 identity over the Body or Timestamp is established.
            let attesting = processed
                .signed_elements
                .iter()
                .filter(|s| {
                    (matches!(s.part, MessagePart::Body)
                        && s.element_id == processed.body_element_id)
                        || matches!(s.part, MessagePart::Timestamp)
                })
                .find_map(|s| match &s.signing_token {
                    SecurityToken::X509(t) => Some(t.certificate.clone()),
                    _ => None,
                });

            match attesting {
                Some(certificate) => outcome.attesting_entity = Some(certificate),
                None => {
                    errors.push(ValidationError::new(
                        "Sender-Vouches Assertion requires the message Body or Timestamp signed by an attesting entity",
                    ));
                }
            }
        } else {
            match context.transport_certificate.as_ref() {
                Some(transport) => outcome.attesting_entity = Some(transport.clone()),
                None => {
                    errors.push(ValidationError::new(
                        "SSL client certificate is required for Sender-Vouches Assertion",
                    ));
                }
            }
        }
    }
}

fn is_embedded_signature(
    processed: &ProcessedSecurityResult,
    signed: &SignedElement,
    assertion_element_id: &str,
) -> bool {
    if signed.signing_token.element_id() != assertion_element_id {
        return false;
    }
    // The signature's whole coverage set must be the assertion element.
    processed
        .signed_elements
        .iter()
        .filter(|s| s.signature_element_id == signed.signature_element_id)
        .all(|s| s.element_id == assertion_element_id)
}

fn body_signed_with(processed: &ProcessedSecurityResult, certificate: &X509Cert) -> bool {
    processed.signed_elements.iter().any(|s| {
        matches!(s.part, MessagePart::Body)
            && s.element_id == processed.body_element_id
            && s.signing_token.certificate() == Some(certificate)
    })
}

fn timestamp_signed_with(processed: &ProcessedSecurityResult, certificate: &X509Cert) -> bool {
    processed.signed_elements.iter().any(|s| {
        matches!(s.part, MessagePart::Timestamp)
            && s.signing_token.certificate() == Some(certificate)
    })
}
