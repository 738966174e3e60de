//! Response encryption key resolution.
//!
//! Decides what key material encrypts an outgoing message: either a
//! configured recipient certificate, or the signing token the chosen
//! identity used on the request. Resolution outcomes are explicit values
//! rather than exceptions so the caller decides what is fatal.

use crate::config::{EncryptionPolicy, GatewayTunables, IdentityTarget};
use crate::errors::{PolicyError, Result};
use crate::wss::{ProcessedSecurityResult, SecurityToken, X509Cert};
use tracing::{debug, warn};

/// How request-side signing-token resolution ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SigningTokenResolution {
    /// No signing token for the chosen identity; no encryption key is
    /// available and the caller decides whether that is fatal.
    None,

    /// Exactly one signing token; its key material encrypts the response.
    Single(SecurityToken),

    /// More than one signing token matched; the caller must fail the
    /// request rather than guess.
    Multiple,
}

/// Resolved encryption context for one message.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptionContext {
    /// Explicitly configured recipient certificate, when the policy
    /// addresses a non-local recipient.
    pub recipient_certificate: Option<X509Cert>,

    /// Signing token resolved from the request.
    pub signing_token: SigningTokenResolution,

    /// Key-encryption algorithm the decorator should use.
    pub key_encryption_algorithm: Option<String>,
}

impl EncryptionContext {
    /// Whether exactly one source of key material was resolved.
    pub fn has_encryption_key(&self) -> bool {
        self.recipient_certificate.is_some()
            != matches!(self.signing_token, SigningTokenResolution::Single(_))
    }
}

/// Builds [`EncryptionContext`] values for one policy assertion instance.
///
/// The configured recipient certificate is decoded once at construction;
/// a decode failure is permanent and repeats for every invocation.
#[derive(Debug)]
pub struct EncryptionContextBuilder {
    policy: EncryptionPolicy,
    tunables: GatewayTunables,
    recipient_certificate: Option<X509Cert>,
    decode_failure: Option<String>,
}

impl EncryptionContextBuilder {
    pub fn new(policy: EncryptionPolicy, tunables: GatewayTunables) -> Self {
        let (recipient_certificate, decode_failure) = match policy
            .recipient_certificate_b64
            .as_deref()
        {
            None => (None, None),
            Some(b64) => match X509Cert::from_der_b64(b64) {
                Ok(cert) => (Some(cert), None),
                Err(e) => {
                    let message = format!("configured recipient certificate is invalid: {e}");
                    warn!("{message}");
                    (None, Some(message))
                }
            },
        };

        Self {
            policy,
            tunables,
            recipient_certificate,
            decode_failure,
        }
    }

    /// Resolve the encryption context for one message.
    ///
    /// `request` is the processed security result of the request the
    /// outgoing message responds to, when one exists.
    pub fn build(
        &self,
        is_response: bool,
        request: Option<&ProcessedSecurityResult>,
    ) -> Result<EncryptionContext> {
        if let Some(message) = &self.decode_failure {
            return Err(PolicyError::certificate(message.clone()));
        }

        if let Some(certificate) = &self.recipient_certificate {
            return Ok(EncryptionContext {
                recipient_certificate: Some(certificate.clone()),
                signing_token: SigningTokenResolution::None,
                key_encryption_algorithm: self.policy.key_encryption_algorithm.clone(),
            });
        }

        let signing_token = if is_response {
            request
                .map(|r| self.resolve_signing_token(r))
                .unwrap_or(SigningTokenResolution::None)
        } else {
            SigningTokenResolution::None
        };

        let key_encryption_algorithm = self
            .policy
            .key_encryption_algorithm
            .clone()
            .or_else(|| self.propagated_algorithm(&signing_token, request));

        Ok(EncryptionContext {
            recipient_certificate: None,
            signing_token,
            key_encryption_algorithm,
        })
    }

    /// Signing tokens the chosen identity used on the request, deduplicated
    /// by token element.
    fn resolve_signing_token(&self, request: &ProcessedSecurityResult) -> SigningTokenResolution {
        let mut found: Vec<&SecurityToken> = Vec::new();
        for signed in &request.signed_elements {
            let token = &signed.signing_token;
            if let IdentityTarget::Specific(identity) = &self.policy.identity_target {
                if token.identity() != Some(identity.as_str()) {
                    continue;
                }
            }
            if !found.iter().any(|t| t.element_id() == token.element_id()) {
                found.push(token);
            }
        }

        match found.len() {
            0 => SigningTokenResolution::None,
            1 => SigningTokenResolution::Single(found[0].clone()),
            n => {
                debug!(count = n, "ambiguous signing token resolution");
                SigningTokenResolution::Multiple
            }
        }
    }

    /// Reuse the key-encryption algorithm the requestor wrapped its own
    /// key with, when the resolved token kind calls for it. By default
    /// plain X.509 signing tokens propagate and SAML tokens do not; the
    /// process-wide flag reverses that selection.
    fn propagated_algorithm(
        &self,
        signing_token: &SigningTokenResolution,
        request: Option<&ProcessedSecurityResult>,
    ) -> Option<String> {
        let token = match signing_token {
            SigningTokenResolution::Single(token) => token,
            _ => return None,
        };
        let propagate = match token {
            SecurityToken::X509(_) => !self.tunables.saml_reuses_key_encryption_algorithm,
            SecurityToken::Saml(_) => self.tunables.saml_reuses_key_encryption_algorithm,
            _ => false,
        };
        if !propagate {
            return None;
        }
        request
            .and_then(|r| r.requestor_key_encryption_algorithm())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wss::{
        EncryptedKeyToken, MessagePart, SignedElement, X509Token,
    };

    const RSA_OAEP: &str = "http://www.w3.org/2001/04/xmlenc#rsa-oaep-mgf1p";

    fn cert(tag: u8) -> X509Cert {
        X509Cert {
            der: vec![tag; 16],
            subject_dn: format!("CN=entity-{tag}"),
            issuer_dn: "CN=test-ca".to_string(),
            ski: None,
        }
    }

    fn x509_token(element_id: &str, identity: Option<&str>, tag: u8) -> SecurityToken {
        SecurityToken::X509(X509Token {
            element_id: element_id.to_string(),
            certificate: cert(tag),
            identity: identity.map(str::to_string),
        })
    }

    fn request_signed_by(tokens: Vec<SecurityToken>) -> ProcessedSecurityResult {
        let mut request = ProcessedSecurityResult {
            security_namespace: Some("wsse".to_string()),
            body_element_id: "Body-1".to_string(),
            ..Default::default()
        };
        request.tokens.push(SecurityToken::EncryptedKey(EncryptedKeyToken {
            element_id: "ek-1".to_string(),
            encrypted_key_sha1: "c2hhMQ==".to_string(),
            key_encryption_algorithm: Some(RSA_OAEP.to_string()),
            identity: None,
        }));
        for (i, token) in tokens.into_iter().enumerate() {
            request.signed_elements.push(SignedElement {
                element_id: "Body-1".to_string(),
                part: MessagePart::Body,
                signing_token: token,
                signature_element_id: format!("sig-{i}"),
            });
        }
        request
    }

    #[test]
    fn test_invalid_recipient_certificate_is_permanent_failure() {
        let builder = EncryptionContextBuilder::new(
            EncryptionPolicy {
                recipient_certificate_b64: Some("!!!not-base64!!!".to_string()),
                ..Default::default()
            },
            GatewayTunables::default(),
        );

        // Every invocation repeats the construction-time failure.
        for _ in 0..2 {
            let result = builder.build(true, None);
            assert!(matches!(result, Err(PolicyError::Certificate { .. })));
        }
    }

    #[test]
    fn test_single_signing_token_resolved_for_response() {
        let builder = EncryptionContextBuilder::new(
            EncryptionPolicy::default(),
            GatewayTunables::default(),
        );
        let request = request_signed_by(vec![x509_token("bst-1", None, 1)]);

        let context = builder.build(true, Some(&request)).unwrap();
        assert!(context.has_encryption_key());
        assert!(matches!(
            context.signing_token,
            SigningTokenResolution::Single(SecurityToken::X509(_))
        ));
        // X.509 signer propagates the requestor's wrap algorithm.
        assert_eq!(context.key_encryption_algorithm.as_deref(), Some(RSA_OAEP));
    }

    #[test]
    fn test_no_signing_token_is_not_an_error() {
        let builder = EncryptionContextBuilder::new(
            EncryptionPolicy::default(),
            GatewayTunables::default(),
        );
        let request = request_signed_by(vec![]);

        let context = builder.build(true, Some(&request)).unwrap();
        assert!(!context.has_encryption_key());
        assert_eq!(context.signing_token, SigningTokenResolution::None);
    }

    #[test]
    fn test_multiple_signing_tokens_flagged() {
        let builder = EncryptionContextBuilder::new(
            EncryptionPolicy::default(),
            GatewayTunables::default(),
        );
        let request = request_signed_by(vec![
            x509_token("bst-1", None, 1),
            x509_token("bst-2", None, 2),
        ]);

        let context = builder.build(true, Some(&request)).unwrap();
        assert_eq!(context.signing_token, SigningTokenResolution::Multiple);
        assert!(!context.has_encryption_key());
    }

    #[test]
    fn test_specific_identity_filters_tokens() {
        let builder = EncryptionContextBuilder::new(
            EncryptionPolicy {
                identity_target: IdentityTarget::Specific("alice".to_string()),
                ..Default::default()
            },
            GatewayTunables::default(),
        );
        let request = request_signed_by(vec![
            x509_token("bst-1", Some("alice"), 1),
            x509_token("bst-2", Some("bob"), 2),
        ]);

        let context = builder.build(true, Some(&request)).unwrap();
        match context.signing_token {
            SigningTokenResolution::Single(SecurityToken::X509(t)) => {
                assert_eq!(t.element_id, "bst-1");
            }
            other => panic!("unexpected resolution: {other:?}"),
        }
    }

    #[test]
    fn test_algorithm_reuse_flag_reverses_selection() {
        let builder = EncryptionContextBuilder::new(
            EncryptionPolicy::default(),
            GatewayTunables {
                saml_reuses_key_encryption_algorithm: true,
                ..Default::default()
            },
        );
        let request = request_signed_by(vec![x509_token("bst-1", None, 1)]);

        // With the flag set, a plain X.509 signer no longer propagates.
        let context = builder.build(true, Some(&request)).unwrap();
        assert_eq!(context.key_encryption_algorithm, None);
    }

    #[test]
    fn test_explicit_algorithm_overrides_propagation() {
        let builder = EncryptionContextBuilder::new(
            EncryptionPolicy {
                key_encryption_algorithm: Some("urn:example:alg".to_string()),
                ..Default::default()
            },
            GatewayTunables::default(),
        );
        let request = request_signed_by(vec![x509_token("bst-1", None, 1)]);

        let context = builder.build(true, Some(&request)).unwrap();
        assert_eq!(
            context.key_encryption_algorithm.as_deref(),
            Some("urn:example:alg")
        );
    }

    #[test]
    fn test_request_direction_resolves_no_token() {
        let builder = EncryptionContextBuilder::new(
            EncryptionPolicy::default(),
            GatewayTunables::default(),
        );
        let request = request_signed_by(vec![x509_token("bst-1", None, 1)]);

        let context = builder.build(false, Some(&request)).unwrap();
        assert_eq!(context.signing_token, SigningTokenResolution::None);
    }
}
