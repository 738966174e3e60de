//! Message replay protection.
//!
//! Derives a unique identifier for each protected message, preferring a
//! signed WS-Addressing MessageID and falling back to a synthetic identity
//! built from the signed timestamp and its signer, then claims that
//! identifier in the distributed store. A duplicate claim is the replay
//! signal.

use crate::config::ReplayPolicy;
use crate::errors::{Result, StorageError};
use crate::storage::{MessageIdStore, Uniqueness};
use crate::wss::{MessageContext, MessagePart, ProcessedSecurityResult, SecurityToken};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sha1::Sha1;
use sha2::{Digest, Sha512};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Validity window when the timestamp has no Expires element.
const DEFAULT_EXPIRY_MINUTES: i64 = 10;

/// Tolerated clock drift on an already expired message.
const EXPIRY_GRACE_MINUTES: i64 = 1;

/// Hard cap on message age regardless of configured windows.
const MAX_CREATED_AGE_DAYS: i64 = 30;

/// Margin added to the store claim beyond the message expiry.
const STORE_MARGIN_MINUTES: i64 = 5;

/// Why a message failed replay verification.
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Message identifier {message_id} has already been seen; message replayed")]
    Replayed { message_id: String },

    #[error("No processed security header available for replay verification")]
    MissingSecurityHeader,

    #[error("More than one signed WS-Addressing MessageID present")]
    MultipleMessageIds,

    #[error("A signed timestamp with a Created time is required for replay verification")]
    MissingSignedTimestamp,

    #[error("Message expired as of {expires}")]
    Expired { expires: DateTime<Utc> },

    #[error("Message Created time {created} is older than {MAX_CREATED_AGE_DAYS} days")]
    CreatedTooOld { created: DateTime<Utc> },

    #[error("WS-Addressing MessageID of {len} bytes exceeds the {max} byte limit")]
    OversizedMessageId { len: usize, max: usize },

    #[error("Timestamp signature does not identify a usable signer")]
    NoSignerIdentity,

    #[error("Timestamp is signed by multiple distinguishable signers")]
    AmbiguousSigner,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// How one replay check ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayCheck {
    /// Message is out of scope (not SOAP, or a response with no security).
    NotApplicable,

    /// Identifier claimed; first sighting of this message.
    Verified {
        message_id: String,
        expires: DateTime<Utc>,
    },
}

/// Verifies messages against the distributed identifier store.
pub struct ReplayVerifier {
    policy: ReplayPolicy,
    store: Arc<dyn MessageIdStore>,
}

impl ReplayVerifier {
    pub fn new(policy: ReplayPolicy, store: Arc<dyn MessageIdStore>) -> Result<Self> {
        policy.validate()?;
        Ok(Self { policy, store })
    }

    /// Check one message, claiming its identifier on success.
    pub async fn check(&self, context: &MessageContext) -> Result<ReplayCheck, ReplayError> {
        if !context.is_soap {
            return Ok(ReplayCheck::NotApplicable);
        }
        let processed = match context.processed.as_ref() {
            Some(p) => p,
            // A response without security is not this policy's problem.
            None if !context.is_request => return Ok(ReplayCheck::NotApplicable),
            None => return Err(ReplayError::MissingSecurityHeader),
        };

        let message_id = signed_message_id(processed, &self.policy)?;

        let timestamp = processed
            .timestamp
            .as_ref()
            .filter(|t| t.signed)
            .ok_or(ReplayError::MissingSignedTimestamp)?;
        let created = timestamp.created;

        let expires = match self.policy.custom_expiry_seconds {
            Some(seconds) => created + Duration::seconds(seconds),
            None => timestamp
                .expires
                .unwrap_or(created + Duration::minutes(DEFAULT_EXPIRY_MINUTES)),
        };

        let now = Utc::now();
        if expires + Duration::minutes(EXPIRY_GRACE_MINUTES) < now {
            return Err(ReplayError::Expired { expires });
        }
        if created < now - Duration::days(MAX_CREATED_AGE_DAYS) {
            return Err(ReplayError::CreatedTooOld { created });
        }
        if created > now {
            warn!(%created, "message Created time is in the future; clock skew suspected");
        }

        let identifier = match message_id {
            Some(id) => id,
            None => synthetic_identifier(processed, created)?,
        };
        let identifier = match self.policy.scope.as_deref() {
            Some(scope) => format!("{scope}:{identifier}"),
            None => identifier,
        };

        let claim_until = expires + Duration::minutes(STORE_MARGIN_MINUTES);
        match self.store.assert_unique(&identifier, claim_until).await? {
            Uniqueness::Unique => {
                debug!(message_id = %identifier, %expires, "message identifier claimed");
                Ok(ReplayCheck::Verified {
                    message_id: identifier,
                    expires,
                })
            }
            Uniqueness::Duplicate => {
                info!(message_id = %identifier, "replayed message rejected");
                Err(ReplayError::Replayed {
                    message_id: identifier,
                })
            }
        }
    }
}

/// The message's signed WS-Addressing MessageID, when exactly one distinct
/// value is present. Oversized IDs are rejected; long IDs are replaced by
/// a SHA-512 surrogate to bound store row size.
fn signed_message_id(
    processed: &ProcessedSecurityResult,
    policy: &ReplayPolicy,
) -> Result<Option<String>, ReplayError> {
    let mut found: Option<&str> = None;
    for signed in &processed.signed_elements {
        if let MessagePart::AddressingMessageId { value } = &signed.part {
            match found {
                None => found = Some(value),
                Some(existing) if existing == value => {}
                Some(_) => return Err(ReplayError::MultipleMessageIds),
            }
        }
    }

    let Some(id) = found else {
        return Ok(None);
    };
    let len = id.len();
    if len > policy.max_message_id_bytes {
        return Err(ReplayError::OversizedMessageId {
            len,
            max: policy.max_message_id_bytes,
        });
    }
    if len > policy.hash_threshold_bytes {
        return Ok(Some(STANDARD.encode(Sha512::digest(id.as_bytes()))));
    }
    Ok(Some(id.to_string()))
}

/// Derive an identifier from the signed timestamp and its signer.
///
/// Certificate-backed signers hash the created time and certificate
/// identity fields; session-keyed signers concatenate the created time and
/// their session or key identifier verbatim, since those are already
/// bounded unique strings.
fn synthetic_identifier(
    processed: &ProcessedSecurityResult,
    created: DateTime<Utc>,
) -> Result<String, ReplayError> {
    let created_iso = created.to_rfc3339_opts(SecondsFormat::Millis, true);

    let mut identifiers: Vec<String> = Vec::new();
    for signed in &processed.signed_elements {
        if !matches!(signed.part, MessagePart::Timestamp) {
            continue;
        }
        let id = match &signed.signing_token {
            SecurityToken::SecurityContext(t) => {
                format!("{created_iso};{}", t.session_id)
            }
            SecurityToken::EncryptedKey(t) => {
                format!("{created_iso};{}", t.encrypted_key_sha1)
            }
            token => match token.certificate() {
                Some(cert) => {
                    let mut hasher = Sha1::new();
                    hasher.update(created_iso.as_bytes());
                    hasher.update(cert.subject_dn.as_bytes());
                    hasher.update(cert.issuer_dn.as_bytes());
                    if let Some(ski) = &cert.ski {
                        hasher.update(ski.as_bytes());
                    }
                    STANDARD.encode(hasher.finalize())
                }
                None => continue,
            },
        };
        if !identifiers.contains(&id) {
            identifiers.push(id);
        }
    }

    if identifiers.len() > 1 {
        return Err(ReplayError::AmbiguousSigner);
    }
    identifiers.pop().ok_or(ReplayError::NoSignerIdentity)
}
