/*!
# WSS Policy

WS-Security and SAML policy enforcement core for an XML gateway.

This crate validates SAML assertions arriving in SOAP Security headers,
builds response encryption and signature decoration instructions, and
protects services against message replay. It is a library invoked per
message by a surrounding policy-assertion execution engine; it owns no
wire format, transport, or XML cryptography of its own.

## What it does

- SAML 1.1 and 2.0 assertion validation: statement constraints
  (authentication method, authorization decision, attributes), subject
  NameID and confirmation-method matching, Conditions windows with
  configurable clock-skew grace, audience restrictions
- Holder-of-key and sender-vouches proof-of-possession checks against
  the message's verified signatures or the transport client certificate
- Response encryption key resolution from a configured recipient
  certificate or the requestor's signing token
- Signature decoration requirements for the outgoing WS-Security
  decorator, including derived-key and known-EncryptedKey paths
- Replay protection backed by a distributed message-identifier store

## Quick Start

```rust,no_run
use wss_policy::config::{GatewayTunables, SamlPolicy};
use wss_policy::saml::validate::SamlValidator;
use wss_policy::wss::MessageContext;

# fn main() -> Result<(), wss_policy::errors::PolicyError> {
let policy = SamlPolicy {
    check_assertion_validity: true,
    audience_restriction: Some("https://gateway.example.com".to_string()),
    ..Default::default()
};
let validator = SamlValidator::new(policy, GatewayTunables::default())?;

let context = MessageContext::default();
let mut errors = Vec::new();
let outcome = validator.validate(&context, &mut errors);
if errors.is_empty() {
    println!("assertion accepted, attested by {:?}", outcome.attesting_entity);
}
# Ok(())
# }
```

Constraint violations accumulate as [`validation::ValidationError`]
values; any error fails the assertion. [`errors::PolicyError`] is
reserved for broken configuration and backend faults.
*/

pub mod config;
pub mod errors;
pub mod replay;
pub mod saml;
pub mod storage;
pub mod validation;
pub mod wss;

pub use config::{GatewayTunables, ReplayPolicy, SamlPolicy};
pub use errors::{PolicyError, Result, StorageError};
pub use replay::{ReplayCheck, ReplayError, ReplayVerifier};
pub use saml::validate::{SamlValidationOutcome, SamlValidator};
pub use storage::{InMemoryMessageIdStore, MessageIdStore, Uniqueness};
pub use validation::ValidationError;
pub use wss::decoration::DecorationRequirements;
pub use wss::encryption::{EncryptionContext, EncryptionContextBuilder, SigningTokenResolution};
pub use wss::signature::{SignatureDecorator, SigningContext};
pub use wss::{MessageContext, ProcessedSecurityResult};
