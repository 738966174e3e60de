//! WS-Security message model.
//!
//! [`ProcessedSecurityResult`] is the contract type produced by the external
//! WS-Security processor after it has parsed and cryptographically verified a
//! message's Security header. Validators in this crate only ever read it;
//! their outputs go to error collections or decoration requirements.

use crate::errors::{PolicyError, Result};
use crate::saml::SamlAssertion;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod decoration;
pub mod encryption;
pub mod signature;

/// An X.509 certificate with the identity fields the policy core compares.
///
/// Equality is over the DER bytes; the parsed fields exist so replay identity
/// derivation does not re-parse per message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct X509Cert {
    /// DER-encoded certificate
    pub der: Vec<u8>,

    /// Subject distinguished name
    pub subject_dn: String,

    /// Issuer distinguished name
    pub issuer_dn: String,

    /// Base64 SubjectKeyIdentifier, when the certificate carries one
    pub ski: Option<String>,
}

impl PartialEq for X509Cert {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for X509Cert {}

impl X509Cert {
    /// Parse a DER-encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        use x509_parser::prelude::*;

        let (_, parsed) = X509Certificate::from_der(der)
            .map_err(|e| PolicyError::certificate(format!("unable to parse certificate: {e}")))?;

        let ski = parsed.extensions().iter().find_map(|ext| {
            match ext.parsed_extension() {
                ParsedExtension::SubjectKeyIdentifier(id) => Some(STANDARD.encode(id.0)),
                _ => None,
            }
        });

        Ok(Self {
            subject_dn: parsed.subject().to_string(),
            issuer_dn: parsed.issuer().to_string(),
            ski,
            der: der.to_vec(),
        })
    }

    /// Parse a base64-encoded DER certificate.
    pub fn from_der_b64(b64: &str) -> Result<Self> {
        let der = STANDARD
            .decode(b64.trim())
            .map_err(|e| PolicyError::certificate(format!("invalid certificate base64: {e}")))?;
        Self::from_der(&der)
    }
}

/// A typed security token from the Security header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SecurityToken {
    /// X.509 BinarySecurityToken
    X509(X509Token),

    /// SAML assertion token
    Saml(SamlToken),

    /// Kerberos BinarySecurityToken
    Kerberos(KerberosToken),

    /// UsernameToken
    Username(UsernameToken),

    /// WS-SecureConversation SecurityContextToken
    SecurityContext(SecurityContextToken),

    /// xenc EncryptedKey carried as a token
    EncryptedKey(EncryptedKeyToken),
}

impl SecurityToken {
    /// The wsu:Id of the token's own element.
    pub fn element_id(&self) -> &str {
        match self {
            SecurityToken::X509(t) => &t.element_id,
            SecurityToken::Saml(t) => &t.element_id,
            SecurityToken::Kerberos(t) => &t.element_id,
            SecurityToken::Username(t) => &t.element_id,
            SecurityToken::SecurityContext(t) => &t.element_id,
            SecurityToken::EncryptedKey(t) => &t.element_id,
        }
    }

    /// The authenticated identity the processor associated with this token.
    pub fn identity(&self) -> Option<&str> {
        match self {
            SecurityToken::X509(t) => t.identity.as_deref(),
            SecurityToken::Saml(t) => t.identity.as_deref(),
            SecurityToken::Kerberos(t) => t.identity.as_deref(),
            SecurityToken::Username(t) => t.identity.as_deref(),
            SecurityToken::SecurityContext(t) => t.identity.as_deref(),
            SecurityToken::EncryptedKey(t) => t.identity.as_deref(),
        }
    }

    /// The certificate backing this token, when it carries one.
    pub fn certificate(&self) -> Option<&X509Cert> {
        match self {
            SecurityToken::X509(t) => Some(&t.certificate),
            SecurityToken::Saml(t) => t
                .assertion
                .subject
                .as_ref()
                .and_then(|s| s.certificate.as_ref()),
            _ => None,
        }
    }
}

/// X.509 certificate token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct X509Token {
    /// wsu:Id of the token element
    pub element_id: String,

    /// The certificate
    pub certificate: X509Cert,

    /// Authenticated identity associated with this token
    pub identity: Option<String>,
}

/// SAML assertion token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamlToken {
    /// wsu:Id / assertion ID of the assertion element
    pub element_id: String,

    /// The parsed assertion
    pub assertion: SamlAssertion,

    /// Authenticated identity associated with this token
    pub identity: Option<String>,
}

/// Kerberos ticket token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KerberosToken {
    /// wsu:Id of the token element
    pub element_id: String,

    /// SHA-1 of the AP-REQ ticket, base64
    pub ticket_sha1: String,

    /// Authenticated identity associated with this token
    pub identity: Option<String>,
}

/// UsernameToken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsernameToken {
    /// wsu:Id of the token element
    pub element_id: String,

    /// Username
    pub username: String,

    /// Authenticated identity associated with this token
    pub identity: Option<String>,
}

/// WS-SecureConversation SecurityContextToken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityContextToken {
    /// wsu:Id of the token element
    pub element_id: String,

    /// Secure conversation session identifier
    pub session_id: String,

    /// Authenticated identity associated with this token
    pub identity: Option<String>,
}

/// EncryptedKey used as a signing/encryption token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedKeyToken {
    /// wsu:Id of the token element
    pub element_id: String,

    /// EncryptedKeySHA1 reference value, base64
    pub encrypted_key_sha1: String,

    /// Key-encryption algorithm the requestor used to wrap this key
    pub key_encryption_algorithm: Option<String>,

    /// Authenticated identity associated with this token
    pub identity: Option<String>,
}

/// What a signed element is, within the message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessagePart {
    /// The SOAP Body
    Body,

    /// The wsu:Timestamp in the Security header
    Timestamp,

    /// A SAML assertion element
    SamlAssertion,

    /// A WS-Addressing MessageID header, with its text value
    AddressingMessageId { value: String },

    /// Any other element, by local name
    Other(String),
}

/// One signed-element record: an element covered by a verified signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedElement {
    /// wsu:Id of the signed element
    pub element_id: String,

    /// What the signed element claims to be
    pub part: MessagePart,

    /// Token whose key produced the signature
    pub signing_token: SecurityToken,

    /// wsu:Id of the enclosing ds:Signature element
    pub signature_element_id: String,
}

/// One encrypted-element record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedElement {
    /// wsu:Id of the encrypted element
    pub element_id: String,

    /// Encryption algorithm URI
    pub algorithm: String,
}

/// The wsu:Timestamp from the Security header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WssTimestamp {
    /// wsu:Id of the timestamp element
    pub element_id: String,

    /// Created time
    pub created: DateTime<Utc>,

    /// Expires time, when present
    pub expires: Option<DateTime<Utc>>,

    /// Whether the timestamp was covered by a verified signature
    pub signed: bool,
}

/// Outcome of processing one message's Security header.
///
/// Immutable snapshot: produced once per message, read many times.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessedSecurityResult {
    /// Namespace URI of the Security header; `None` means the message
    /// carried no Security header at all.
    pub security_namespace: Option<String>,

    /// All security tokens found in the header
    pub tokens: Vec<SecurityToken>,

    /// All elements covered by verified signatures
    pub signed_elements: Vec<SignedElement>,

    /// All encrypted elements
    pub encrypted_elements: Vec<EncryptedElement>,

    /// The timestamp record, when present
    pub timestamp: Option<WssTimestamp>,

    /// wsu:Id of the message's actual SOAP Body element. Signed elements
    /// claiming to be the Body but carrying a different id were resolved
    /// out of scope by the processor.
    pub body_element_id: String,
}

impl ProcessedSecurityResult {
    /// Signed-element records covering the element with the given id.
    pub fn signatures_over(&self, element_id: &str) -> Vec<&SignedElement> {
        self.signed_elements
            .iter()
            .filter(|s| s.element_id == element_id)
            .collect()
    }

    /// The key-encryption algorithm the requestor used to wrap its own
    /// key, taken from the first EncryptedKey token that declares one.
    pub fn requestor_key_encryption_algorithm(&self) -> Option<&str> {
        self.tokens.iter().find_map(|t| match t {
            SecurityToken::EncryptedKey(ek) => ek.key_encryption_algorithm.as_deref(),
            _ => None,
        })
    }
}

/// Per-message context as seen by the policy runtime.
#[derive(Debug, Clone, Default)]
pub struct MessageContext {
    /// Whether the message parsed as SOAP at all
    pub is_soap: bool,

    /// Request-direction message (vs. response)
    pub is_request: bool,

    /// The processed Security header, when processing ran
    pub processed: Option<ProcessedSecurityResult>,

    /// Transport-layer (TLS) client certificate, when one was presented
    pub transport_certificate: Option<X509Cert>,
}
