//! Response signature decoration.
//!
//! Split into a pure `compute` step that turns a resolved encryption
//! context into a [`SigningContext`], and an `apply` step that writes the
//! context into the decoration requirements. The engine can re-run `apply`
//! with the same context later in the pipeline if a downstream step reset
//! the requirements; `compute` never needs to run twice.

use crate::config::IdentityTarget;
use crate::wss::decoration::{DecorationRequirements, KeyReference};
use crate::wss::encryption::{EncryptionContext, SigningTokenResolution};
use crate::wss::{SecurityToken, X509Cert};
use tracing::debug;

/// Key material and algorithm selection for one outgoing signature.
#[derive(Debug, Clone, PartialEq)]
pub struct SigningContext {
    /// Recipient certificate, when one was resolved.
    pub certificate: Option<X509Cert>,

    /// Signing token, when the key comes from the request.
    pub signing_token: Option<SecurityToken>,

    /// Key-encryption algorithm to prefer.
    pub key_encryption_algorithm: Option<String>,

    /// KeyInfo reference style for the decorator.
    pub key_reference: KeyReference,
}

/// Populates decoration requirements from a resolved signing context.
#[derive(Debug, Clone)]
pub struct SignatureDecorator {
    identity_target: IdentityTarget,
    key_reference: KeyReference,
}

impl SignatureDecorator {
    pub fn new(identity_target: IdentityTarget, key_reference: KeyReference) -> Self {
        Self {
            identity_target,
            key_reference,
        }
    }

    /// Turn a resolved encryption context into signing key material.
    ///
    /// Pure: no requirements are touched, so the result can be applied
    /// any number of times.
    pub fn compute(&self, context: &EncryptionContext) -> SigningContext {
        let signing_token = match &context.signing_token {
            SigningTokenResolution::Single(token) => Some(token.clone()),
            _ => None,
        };
        SigningContext {
            certificate: context.recipient_certificate.clone(),
            signing_token,
            key_encryption_algorithm: context.key_encryption_algorithm.clone(),
            key_reference: self.key_reference,
        }
    }

    /// Write the signing context into the decoration requirements.
    ///
    /// `select_elements` runs after key material is attached, so element
    /// selection sees the final requirement state. Returns whether any
    /// key material was attached.
    pub fn apply<F>(
        &self,
        context: &SigningContext,
        is_response: bool,
        requirements: &mut DecorationRequirements,
        select_elements: F,
    ) -> bool
    where
        F: FnOnce(&mut DecorationRequirements),
    {
        // A response addressed to one specific identity must not carry
        // key material left over from earlier policy steps.
        if is_response && self.identity_target != IdentityTarget::LastAuthenticated {
            requirements.clear_security_tokens();
        }

        if requirements.key_encryption_algorithm.is_none() {
            requirements.key_encryption_algorithm = context.key_encryption_algorithm.clone();
        }
        requirements.key_reference = context.key_reference;

        let attached = if let Some(certificate) = &context.certificate {
            requirements.set_recipient_certificate(certificate.clone());
            true
        } else if let Some(token) = &context.signing_token {
            self.attach_token(token, requirements)
        } else {
            false
        };

        select_elements(requirements);
        attached
    }

    fn attach_token(
        &self,
        token: &SecurityToken,
        requirements: &mut DecorationRequirements,
    ) -> bool {
        match token {
            SecurityToken::Kerberos(_) => requirements.set_token(token),
            SecurityToken::SecurityContext(_) => {
                let attached = requirements.set_token(token);
                if attached {
                    // Derived-key signatures must cover the timestamp.
                    requirements.sign_timestamp = true;
                }
                attached
            }
            SecurityToken::EncryptedKey(ek) => {
                let attached = requirements.set_token(token);
                if attached {
                    requirements.sign_timestamp = true;
                    // Known shared secret: the decorator references the
                    // existing key by its EncryptedKeySHA1 value instead
                    // of wrapping a new one.
                    requirements.encrypted_key_reference_sha1 =
                        Some(ek.encrypted_key_sha1.clone());
                }
                attached
            }
            _ => {
                let attached = requirements.set_token(token);
                if !attached {
                    debug!("signing token kind carries no usable key material");
                }
                attached
            }
        }
    }
}
