//! Decoration requirements: the instruction set for the outgoing decorator.
//!
//! The policy core populates this sink; an external WS-Security decorator
//! consumes it to perform the actual XML signing and encryption.

use crate::wss::{SecurityToken, X509Cert};
use serde::{Deserialize, Serialize};

/// How the signature's KeyInfo should reference the signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KeyReference {
    /// Embed the certificate as a BinarySecurityToken and reference it.
    #[default]
    BinarySecurityToken,

    /// Reference by SubjectKeyIdentifier.
    SubjectKeyIdentifier,

    /// Reference by issuer name and serial number.
    IssuerSerial,
}

/// Mutable requirements object an assertion populates for the decorator.
#[derive(Debug, Clone, Default)]
pub struct DecorationRequirements {
    /// wsu:Ids of elements to sign
    pub elements_to_sign: Vec<String>,

    /// wsu:Ids of elements to encrypt
    pub elements_to_encrypt: Vec<String>,

    /// Whether the outgoing timestamp must be covered by the signature
    pub sign_timestamp: bool,

    /// Key-encryption algorithm URI for wrapping the ephemeral key
    pub key_encryption_algorithm: Option<String>,

    /// Symmetric encryption algorithm URI
    pub encryption_algorithm: Option<String>,

    /// Digest algorithm URI
    pub digest_algorithm: Option<String>,

    /// KeyInfo reference style
    pub key_reference: KeyReference,

    /// Certificate of the recipient to encrypt for
    pub recipient_certificate: Option<X509Cert>,

    /// Security token supplying the signing/encryption key, when not
    /// using the gateway's own key pair
    pub signing_token: Option<SecurityToken>,

    /// EncryptedKeySHA1 value for referencing a known shared secret
    pub encrypted_key_reference_sha1: Option<String>,
}

impl DecorationRequirements {
    /// Create empty requirements.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element to the signing set, skipping duplicates.
    pub fn add_element_to_sign(&mut self, element_id: impl Into<String>) {
        let id = element_id.into();
        if !self.elements_to_sign.contains(&id) {
            self.elements_to_sign.push(id);
        }
    }

    /// Add an element to the encryption set, skipping duplicates.
    pub fn add_element_to_encrypt(&mut self, element_id: impl Into<String>) {
        let id = element_id.into();
        if !self.elements_to_encrypt.contains(&id) {
            self.elements_to_encrypt.push(id);
        }
    }

    /// Attach a security token as key material.
    ///
    /// Returns false for token kinds the decorator cannot key from
    /// (UsernameToken, bare SAML without subject key material).
    pub fn set_token(&mut self, token: &SecurityToken) -> bool {
        match token {
            SecurityToken::Kerberos(_)
            | SecurityToken::SecurityContext(_)
            | SecurityToken::EncryptedKey(_)
            | SecurityToken::X509(_) => {
                self.signing_token = Some(token.clone());
                self.recipient_certificate = None;
                true
            }
            SecurityToken::Saml(t) => {
                if t.assertion
                    .subject
                    .as_ref()
                    .is_some_and(|s| s.certificate.is_some())
                {
                    self.signing_token = Some(token.clone());
                    self.recipient_certificate = None;
                    true
                } else {
                    false
                }
            }
            SecurityToken::Username(_) => false,
        }
    }

    /// Set the recipient certificate, displacing any attached token.
    pub fn set_recipient_certificate(&mut self, certificate: X509Cert) {
        self.recipient_certificate = Some(certificate);
        self.signing_token = None;
    }

    /// Drop all key material so a single identity's material can be set.
    pub fn clear_security_tokens(&mut self) {
        self.signing_token = None;
        self.recipient_certificate = None;
        self.encrypted_key_reference_sha1 = None;
    }

    /// True when exactly one kind of key material is attached.
    pub fn has_key_material(&self) -> bool {
        self.recipient_certificate.is_some() != self.signing_token.is_some()
    }
}
