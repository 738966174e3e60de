//! Subject and conditions validation.
//!
//! The subject check covers NameID qualifier/format matching and the
//! subject-confirmation method intersection; the conditions check covers
//! the assertion validity window, audience restrictions, OneTimeUse and
//! ProxyRestriction counts. Both append to the caller's error list and
//! never short-circuit each other.

use crate::config::{GatewayTunables, SamlPolicy};
use crate::saml::constants;
use crate::saml::{SamlAssertion, SamlConditions, SamlSubject};
use crate::validation::ValidationError;
use chrono::{DateTime, Duration, DurationRound, Utc};
use tracing::debug;

/// Current UTC time truncated to millisecond precision.
///
/// Assertion timestamps never carry sub-millisecond precision, so the
/// comparison clock should not either.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    now.duration_trunc(Duration::milliseconds(1)).unwrap_or(now)
}

/// Widen a NotBefore bound backwards by the configured grace period.
pub fn adjust_not_before(not_before: DateTime<Utc>, tunables: &GatewayTunables) -> DateTime<Utc> {
    not_before - Duration::minutes(tunables.not_before_grace_min)
}

/// Widen a NotOnOrAfter bound forwards by the configured grace period.
pub fn adjust_not_after(
    not_on_or_after: DateTime<Utc>,
    tunables: &GatewayTunables,
) -> DateTime<Utc> {
    not_on_or_after + Duration::minutes(tunables.not_on_or_after_grace_min)
}

/// Validate the assertion subject against the configured constraints.
///
/// Returns early only when no subject is present at all.
pub fn validate_subject(
    policy: &SamlPolicy,
    tunables: &GatewayTunables,
    subject: Option<&SamlSubject>,
    now: DateTime<Utc>,
    errors: &mut Vec<ValidationError>,
) {
    let subject = match subject {
        Some(subject) => subject,
        None => {
            errors.push(ValidationError::new("Subject required, but not presented"));
            return;
        }
    };

    validate_name_qualifier(policy, subject, errors);
    validate_name_format(policy, subject, errors);
    validate_confirmations(policy, tunables, subject, now, errors);
}

fn validate_name_qualifier(
    policy: &SamlPolicy,
    subject: &SamlSubject,
    errors: &mut Vec<ValidationError>,
) {
    let wanted = match policy.name_qualifier.as_deref() {
        Some(q) if !q.is_empty() => q,
        _ => return,
    };

    // A presented NameID without a qualifier skips this check.
    let presented = subject
        .name_id
        .as_ref()
        .and_then(|name_id| name_id.name_qualifier.as_deref());
    if let Some(presented) = presented {
        if presented != wanted {
            errors.push(ValidationError::new(format!(
                "Name Qualifiers does not match presented/required {}/{}",
                presented, wanted
            )));
        }
    }
}

fn validate_name_format(
    policy: &SamlPolicy,
    subject: &SamlSubject,
    errors: &mut Vec<ValidationError>,
) {
    if policy.name_formats.is_empty() {
        return;
    }

    // The unspecified format in the configured list acts as a wildcard.
    let wildcard = policy
        .name_formats
        .iter()
        .any(|f| f == constants::NAMEIDENTIFIER_UNSPECIFIED);
    if wildcard {
        return;
    }

    let presented = subject
        .name_id
        .as_ref()
        .and_then(|name_id| name_id.format.as_deref())
        .unwrap_or("");

    if !policy.name_formats.iter().any(|f| f == presented) {
        errors.push(ValidationError::new(format!(
            "Name Format does not match presented/required {}/[{}]",
            presented,
            policy.name_formats.join(", ")
        )));
    }
}

fn validate_confirmations(
    policy: &SamlPolicy,
    tunables: &GatewayTunables,
    subject: &SamlSubject,
    now: DateTime<Utc>,
    errors: &mut Vec<ValidationError>,
) {
    if policy.subject_confirmations.is_empty() && !policy.allow_no_subject_confirmation {
        return;
    }

    // SAML 1.1 confirmation constants in the policy are accepted against
    // their SAML 2.0 equivalents.
    let accepted: Vec<&str> = policy
        .subject_confirmations
        .iter()
        .map(|m| constants::normalize_confirmation_method(m))
        .collect();

    let mut presented: Vec<&str> = Vec::new();
    let mut rejected_by_window = false;

    for confirmation in &subject.confirmations {
        if policy.check_subject_confirmation_validity
            && !confirmation_window_valid(tunables, confirmation, now, errors)
        {
            rejected_by_window = true;
            continue;
        }
        presented.push(constants::normalize_confirmation_method(&confirmation.method));
    }

    if presented.is_empty() && policy.allow_no_subject_confirmation {
        return;
    }

    let matched = presented.iter().any(|p| accepted.contains(p));
    if !matched {
        let qualifier = if rejected_by_window {
            " (some confirmations were rejected)"
        } else {
            ""
        };
        errors.push(ValidationError::new(format!(
            "Subject Confirmations mismatch{} presented/accepted {:?}/{:?}",
            qualifier, presented, accepted
        )));
    }
}

/// Check one confirmation's validity window.
///
/// A malformed window where NotOnOrAfter is not strictly after NotBefore
/// records its own error; a merely expired or not-yet-valid window only
/// excludes the confirmation from matching.
fn confirmation_window_valid(
    tunables: &GatewayTunables,
    confirmation: &crate::saml::SamlSubjectConfirmation,
    now: DateTime<Utc>,
    errors: &mut Vec<ValidationError>,
) -> bool {
    if let (Some(not_before), Some(not_on_or_after)) =
        (confirmation.not_before, confirmation.not_on_or_after)
    {
        if not_on_or_after <= not_before {
            errors.push(ValidationError::new(format!(
                "Subject Confirmation Data is invalid, NotOnOrAfter must be greater than NotBefore: {}/{}",
                not_before.to_rfc3339(),
                not_on_or_after.to_rfc3339()
            )));
            return false;
        }
    }

    if let Some(not_before) = confirmation.not_before {
        if now < adjust_not_before(not_before, tunables) {
            debug!(method = %confirmation.method, "confirmation not yet valid");
            return false;
        }
    }
    if let Some(not_on_or_after) = confirmation.not_on_or_after {
        // NotOnOrAfter is an exclusive bound.
        if now >= adjust_not_after(not_on_or_after, tunables) {
            debug!(method = %confirmation.method, "confirmation window expired");
            return false;
        }
    }
    true
}

/// Validate the assertion conditions against the configured constraints.
pub fn validate_conditions(
    policy: &SamlPolicy,
    tunables: &GatewayTunables,
    assertion: &SamlAssertion,
    now: DateTime<Utc>,
    errors: &mut Vec<ValidationError>,
) {
    let conditions = assertion.conditions.as_ref();

    if policy.check_assertion_validity {
        match conditions {
            None => {
                errors.push(ValidationError::new(
                    "Can't validate conditions, no Conditions have been presented",
                ));
            }
            Some(conditions) => validate_validity_window(tunables, conditions, now, errors),
        }
    }

    if policy.require_one_time_use && conditions.map_or(true, |c| c.one_time_use_count == 0) {
        errors.push(ValidationError::new(
            "OneTimeUse condition is required but not presented",
        ));
    }

    let Some(conditions) = conditions else {
        return;
    };

    if let (Some(max_seconds), Some(not_on_or_after)) =
        (policy.max_expiry_seconds, conditions.not_on_or_after)
    {
        if not_on_or_after > now + Duration::seconds(max_seconds) {
            errors.push(ValidationError::new(format!(
                "Assertion validity period exceeds maximum expiry, NotOnOrAfter: {}",
                not_on_or_after.to_rfc3339()
            )));
        }
    }

    validate_audience(policy, conditions, errors);

    if conditions.one_time_use_count > 1 {
        errors.push(ValidationError::new(
            "Multiple OneTimeUse conditions are not permitted.",
        ));
    }
    if conditions.proxy_restriction_count > 1 {
        errors.push(ValidationError::new(
            "Multiple ProxyRestriction conditions are not permitted.",
        ));
    }
}

fn validate_validity_window(
    tunables: &GatewayTunables,
    conditions: &SamlConditions,
    now: DateTime<Utc>,
    errors: &mut Vec<ValidationError>,
) {
    let not_before = match conditions.not_before {
        Some(t) => t,
        None => {
            errors.push(ValidationError::new(
                "No Conditions NotBefore specified in assertion",
            ));
            return;
        }
    };
    let not_on_or_after = match conditions.not_on_or_after {
        Some(t) => t,
        None => {
            errors.push(ValidationError::new(
                "No Conditions NotOnOrAfter specified in assertion",
            ));
            return;
        }
    };

    if now < adjust_not_before(not_before, tunables) {
        errors.push(ValidationError::new(format!(
            "SAML ticket does not become valid until: {}",
            not_before.to_rfc3339()
        )));
    } else if now >= adjust_not_after(not_on_or_after, tunables) {
        errors.push(ValidationError::new(format!(
            "SAML ticket has expired as of: {}",
            not_on_or_after.to_rfc3339()
        )));
    }
}

/// Every AudienceRestriction must independently contain the configured
/// audience. With multiple restrictions this is an AND across all of them.
fn validate_audience(
    policy: &SamlPolicy,
    conditions: &SamlConditions,
    errors: &mut Vec<ValidationError>,
) {
    let audience = match policy.audience_restriction.as_deref() {
        Some(a) if !a.is_empty() => a,
        _ => return,
    };

    for restriction in &conditions.audience_restrictions {
        if !restriction.audiences.iter().any(|a| a == audience) {
            errors.push(ValidationError::new(format!(
                "Audience Restriction Check Failed, required audience: {}",
                audience
            )));
        }
    }
}
