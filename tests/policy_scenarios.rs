//! End-to-end policy scenarios exercising the public API the way the
//! policy engine drives it: build a processed security result, run the
//! validators, inspect accumulated errors and outcomes.

use chrono::{Duration, Utc};
use std::sync::Arc;
use wss_policy::config::{
    AttributeStatementConstraints, EncryptionPolicy, ExpectedAttribute, GatewayTunables,
    ReplayPolicy, SamlPolicy,
};
use wss_policy::saml::constants;
use wss_policy::saml::{
    SamlAssertion, SamlAssertionBuilder, SamlAttribute, SamlAttributeStatement, SamlNameId,
    SamlStatement, SamlSubject, SamlSubjectConfirmation, SamlVersion,
};
use wss_policy::wss::{
    MessageContext, MessagePart, ProcessedSecurityResult, SamlToken, SecurityToken, SignedElement,
    WssTimestamp, X509Cert, X509Token,
};
use wss_policy::{
    EncryptionContextBuilder, InMemoryMessageIdStore, ReplayCheck, ReplayError, ReplayVerifier,
    SamlValidator, SigningTokenResolution,
};

fn cert(tag: u8) -> X509Cert {
    X509Cert {
        der: vec![tag; 16],
        subject_dn: format!("CN=entity-{tag}"),
        issuer_dn: "CN=test-ca".to_string(),
        ski: None,
    }
}

fn bearer_assertion(version: SamlVersion) -> SamlAssertion {
    SamlAssertionBuilder::new("https://idp.example.com", version)
        .with_assertion_id("assertion-1")
        .with_subject(SamlSubject {
            name_id: Some(SamlNameId {
                value: "alice".to_string(),
                format: Some(constants::NAMEIDENTIFIER_UNSPECIFIED.to_string()),
                name_qualifier: None,
            }),
            confirmations: vec![SamlSubjectConfirmation {
                method: constants::CONFIRMATION_SAML2_BEARER.to_string(),
                not_before: None,
                not_on_or_after: None,
            }],
            certificate: None,
        })
        .build()
}

/// Security header carrying the assertion with its embedded issuer
/// signature, the usual arrival shape.
fn context_for(assertion: SamlAssertion) -> MessageContext {
    let token = SecurityToken::Saml(SamlToken {
        element_id: assertion.assertion_id.clone(),
        assertion,
        identity: None,
    });
    let mut processed = ProcessedSecurityResult {
        security_namespace: Some(
            "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd"
                .to_string(),
        ),
        body_element_id: "Body-1".to_string(),
        ..Default::default()
    };
    processed.signed_elements.push(SignedElement {
        element_id: token.element_id().to_string(),
        part: MessagePart::SamlAssertion,
        signing_token: token.clone(),
        signature_element_id: "sig-issuer".to_string(),
    });
    processed.tokens.push(token);
    MessageContext {
        is_soap: true,
        is_request: true,
        processed: Some(processed),
        transport_certificate: None,
    }
}

#[test]
fn version_requirement_rejects_other_version_before_statements() {
    let policy = SamlPolicy {
        version: Some(SamlVersion::V2_0),
        attributes: Some(AttributeStatementConstraints {
            attributes: vec![ExpectedAttribute {
                name: "group".to_string(),
                any_value: true,
                ..Default::default()
            }],
        }),
        ..Default::default()
    };
    let validator = SamlValidator::new(policy, GatewayTunables::default()).unwrap();

    let context = context_for(bearer_assertion(SamlVersion::V1_1));
    let mut errors = Vec::new();
    validator.validate(&context, &mut errors);

    // The 1.1 assertion is rejected wholesale; no statement-level error
    // appears because statement validation never ran.
    assert_eq!(errors.len(), 1);
    assert!(errors[0].reason().contains("No SAML assertion found"));
}

#[test]
fn validity_window_edges() {
    let policy = SamlPolicy {
        check_assertion_validity: true,
        ..Default::default()
    };
    let validator = SamlValidator::new(policy, GatewayTunables::default()).unwrap();
    let now = Utc::now();

    // NotBefore in the future (beyond grace): rejected.
    let mut assertion = bearer_assertion(SamlVersion::V2_0);
    let future = SamlAssertionBuilder::new("https://idp.example.com", SamlVersion::V2_0)
        .with_assertion_id("assertion-1")
        .with_validity_period(now + Duration::minutes(10), now + Duration::minutes(20))
        .build();
    assertion.conditions = future.conditions;
    let mut errors = Vec::new();
    validator.validate(&context_for(assertion), &mut errors);
    assert!(errors
        .iter()
        .any(|e| e.reason().contains("does not become valid until")));

    // Window containing now: accepted.
    let mut assertion = bearer_assertion(SamlVersion::V2_0);
    let live = SamlAssertionBuilder::new("https://idp.example.com", SamlVersion::V2_0)
        .with_assertion_id("assertion-1")
        .with_validity_period(now - Duration::minutes(10), now + Duration::minutes(10))
        .build();
    assertion.conditions = live.conditions;
    let mut errors = Vec::new();
    validator.validate(&context_for(assertion), &mut errors);
    assert!(errors.is_empty(), "unexpected: {errors:?}");

    // NotOnOrAfter in the past (beyond grace): rejected.
    let mut assertion = bearer_assertion(SamlVersion::V2_0);
    let expired = SamlAssertionBuilder::new("https://idp.example.com", SamlVersion::V2_0)
        .with_assertion_id("assertion-1")
        .with_validity_period(now - Duration::minutes(20), now - Duration::minutes(10))
        .build();
    assertion.conditions = expired.conditions;
    let mut errors = Vec::new();
    validator.validate(&context_for(assertion), &mut errors);
    assert!(errors.iter().any(|e| e.reason().contains("has expired as of")));
}

#[test]
fn wildcard_name_format_accepts_any_presented_format() {
    let policy = SamlPolicy {
        name_formats: vec![
            constants::NAMEIDENTIFIER_EMAIL.to_string(),
            constants::NAMEIDENTIFIER_UNSPECIFIED.to_string(),
        ],
        ..Default::default()
    };
    let validator = SamlValidator::new(policy, GatewayTunables::default()).unwrap();

    let mut assertion = bearer_assertion(SamlVersion::V2_0);
    if let Some(subject) = assertion.subject.as_mut() {
        if let Some(name_id) = subject.name_id.as_mut() {
            name_id.format = Some("urn:custom:format".to_string());
        }
    }

    let mut errors = Vec::new();
    validator.validate(&context_for(assertion), &mut errors);
    assert!(errors.is_empty(), "unexpected: {errors:?}");
}

#[test]
fn any_value_attribute_semantics() {
    let policy = SamlPolicy {
        attributes: Some(AttributeStatementConstraints {
            attributes: vec![ExpectedAttribute {
                name: "role".to_string(),
                any_value: true,
                ..Default::default()
            }],
        }),
        ..Default::default()
    };
    let validator = SamlValidator::new(policy, GatewayTunables::default()).unwrap();

    let statement = |values: Vec<&str>| {
        SamlStatement::Attribute(SamlAttributeStatement {
            attributes: vec![SamlAttribute {
                name: "role".to_string(),
                namespace: None,
                name_format: None,
                values: values.into_iter().map(str::to_string).collect(),
            }],
        })
    };

    // Non-empty value satisfies any-value and is captured.
    let mut assertion = bearer_assertion(SamlVersion::V2_0);
    assertion.statements.push(statement(vec!["operator"]));
    let mut errors = Vec::new();
    let outcome = validator.validate(&context_for(assertion), &mut errors);
    assert!(errors.is_empty(), "unexpected: {errors:?}");
    assert_eq!(outcome.captured_attributes[0].values, vec!["operator"]);

    // Empty value never satisfies any-value.
    let mut assertion = bearer_assertion(SamlVersion::V2_0);
    assertion.statements.push(statement(vec![""]));
    let mut errors = Vec::new();
    validator.validate(&context_for(assertion), &mut errors);
    assert!(errors
        .iter()
        .any(|e| e.reason().contains("No matching value for attribute")));
}

#[test]
fn audience_must_hold_in_every_restriction() {
    let policy = SamlPolicy {
        audience_restriction: Some("https://gateway.example.com".to_string()),
        ..Default::default()
    };
    let validator = SamlValidator::new(policy, GatewayTunables::default()).unwrap();

    let mut assertion = bearer_assertion(SamlVersion::V2_0);
    let with_audiences = SamlAssertionBuilder::new("https://idp.example.com", SamlVersion::V2_0)
        .with_assertion_id("assertion-1")
        .with_audience("https://gateway.example.com")
        .with_audience("https://elsewhere.example.com")
        .build();
    assertion.conditions = with_audiences.conditions;

    let mut errors = Vec::new();
    validator.validate(&context_for(assertion), &mut errors);
    // The second restriction lacks the audience, so the whole assertion fails.
    assert_eq!(
        errors
            .iter()
            .filter(|e| e.reason().contains("Audience Restriction"))
            .count(),
        1
    );
}

#[test]
fn holder_of_key_transport_certificate_match() {
    let validator =
        SamlValidator::new(SamlPolicy::default(), GatewayTunables::default()).unwrap();

    let subject_cert = cert(5);
    let mut assertion = bearer_assertion(SamlVersion::V2_0);
    if let Some(subject) = assertion.subject.as_mut() {
        subject.confirmations[0].method = constants::CONFIRMATION_SAML2_HOLDER_OF_KEY.to_string();
        subject.certificate = Some(subject_cert.clone());
    }

    let mut context = context_for(assertion);
    context.transport_certificate = Some(cert(6));
    let mut errors = Vec::new();
    validator.validate(&context, &mut errors);
    assert!(errors.iter().any(|e| e.reason().contains("does not match")));

    context.transport_certificate = Some(subject_cert);
    let mut errors = Vec::new();
    validator.validate(&context, &mut errors);
    assert!(errors.is_empty(), "unexpected: {errors:?}");
}

#[test]
fn encryption_context_key_invariant() {
    let builder =
        EncryptionContextBuilder::new(EncryptionPolicy::default(), GatewayTunables::default());

    let mut request = ProcessedSecurityResult {
        security_namespace: Some("wsse".to_string()),
        body_element_id: "Body-1".to_string(),
        ..Default::default()
    };

    // Zero signing tokens: no key, and the caller is told so.
    let context = builder.build(true, Some(&request)).unwrap();
    assert!(!context.has_encryption_key());
    assert_eq!(context.signing_token, SigningTokenResolution::None);

    // One signing token: exactly one key source materializes.
    request.signed_elements.push(SignedElement {
        element_id: "Body-1".to_string(),
        part: MessagePart::Body,
        signing_token: SecurityToken::X509(X509Token {
            element_id: "bst-1".to_string(),
            certificate: cert(1),
            identity: None,
        }),
        signature_element_id: "sig-1".to_string(),
    });
    let context = builder.build(true, Some(&request)).unwrap();
    assert!(context.has_encryption_key());
    assert!(context.recipient_certificate.is_none());
}

fn replay_context(created: chrono::DateTime<Utc>) -> MessageContext {
    let signer = SecurityToken::X509(X509Token {
        element_id: "bst-1".to_string(),
        certificate: cert(1),
        identity: None,
    });
    let mut processed = ProcessedSecurityResult {
        security_namespace: Some("wsse".to_string()),
        body_element_id: "Body-1".to_string(),
        timestamp: Some(WssTimestamp {
            element_id: "TS-1".to_string(),
            created,
            expires: Some(created + Duration::minutes(5)),
            signed: true,
        }),
        ..Default::default()
    };
    processed.signed_elements.push(SignedElement {
        element_id: "TS-1".to_string(),
        part: MessagePart::Timestamp,
        signing_token: signer,
        signature_element_id: "sig-1".to_string(),
    });
    MessageContext {
        is_soap: true,
        is_request: true,
        processed: Some(processed),
        transport_certificate: None,
    }
}

#[tokio::test]
async fn replay_detected_for_same_derived_identifier() {
    let verifier = ReplayVerifier::new(
        ReplayPolicy::default(),
        Arc::new(InMemoryMessageIdStore::new()),
    )
    .unwrap();

    let created = Utc::now() - Duration::minutes(1);
    let context = replay_context(created);

    assert!(matches!(
        verifier.check(&context).await.unwrap(),
        ReplayCheck::Verified { .. }
    ));
    // Same Created and signer derive the same synthetic identifier.
    assert!(matches!(
        verifier.check(&context).await,
        Err(ReplayError::Replayed { .. })
    ));
    // A different Created time is a different message.
    let other = replay_context(created + Duration::seconds(1));
    assert!(matches!(
        verifier.check(&other).await.unwrap(),
        ReplayCheck::Verified { .. }
    ));
}

#[tokio::test]
async fn oversized_message_id_rejected_outright() {
    let verifier = ReplayVerifier::new(
        ReplayPolicy::default(),
        Arc::new(InMemoryMessageIdStore::new()),
    )
    .unwrap();

    let mut context = replay_context(Utc::now() - Duration::minutes(1));
    let signer = SecurityToken::X509(X509Token {
        element_id: "bst-1".to_string(),
        certificate: cert(1),
        identity: None,
    });
    context
        .processed
        .as_mut()
        .unwrap()
        .signed_elements
        .push(SignedElement {
            element_id: "MsgId-1".to_string(),
            part: MessagePart::AddressingMessageId {
                value: "u".repeat(9000),
            },
            signing_token: signer,
            signature_element_id: "sig-1".to_string(),
        });

    assert!(matches!(
        verifier.check(&context).await,
        Err(ReplayError::OversizedMessageId { len: 9000, .. })
    ));
}
