//! SAML 1.1 / 2.0 URI constants and cross-version mapping tables.
//!
//! Constraint configuration may be written against either SAML version; the
//! validators normalize presented values into the SAML 2.0 URI space before
//! comparing, using the fixed lookup tables below.

/// SAML 1.1 assertion namespace
pub const NS_SAML_1_1: &str = "urn:oasis:names:tc:SAML:1.0:assertion";

/// SAML 2.0 assertion namespace
pub const NS_SAML_2_0: &str = "urn:oasis:names:tc:SAML:2.0:assertion";

// Subject confirmation methods

pub const CONFIRMATION_SAML1_HOLDER_OF_KEY: &str = "urn:oasis:names:tc:SAML:1.0:cm:holder-of-key";
pub const CONFIRMATION_SAML1_SENDER_VOUCHES: &str = "urn:oasis:names:tc:SAML:1.0:cm:sender-vouches";
pub const CONFIRMATION_SAML1_BEARER: &str = "urn:oasis:names:tc:SAML:1.0:cm:bearer";

pub const CONFIRMATION_SAML2_HOLDER_OF_KEY: &str = "urn:oasis:names:tc:SAML:2.0:cm:holder-of-key";
pub const CONFIRMATION_SAML2_SENDER_VOUCHES: &str = "urn:oasis:names:tc:SAML:2.0:cm:sender-vouches";
pub const CONFIRMATION_SAML2_BEARER: &str = "urn:oasis:names:tc:SAML:2.0:cm:bearer";

// Authentication methods (SAML 1.1) / context classes (SAML 2.0)

pub const AUTHENTICATION_SAML1_PASSWORD: &str = "urn:oasis:names:tc:SAML:1.0:am:password";
pub const AUTHENTICATION_SAML1_KERBEROS: &str = "urn:ietf:rfc:1510";
pub const AUTHENTICATION_SAML1_SRP: &str = "urn:ietf:rfc:2945";
pub const AUTHENTICATION_SAML1_TLS_CERT: &str = "urn:ietf:rfc:2246";
pub const AUTHENTICATION_SAML1_XMLDSIG: &str = "urn:ietf:rfc:3075";
pub const AUTHENTICATION_SAML1_X509_PKI: &str = "urn:oasis:names:tc:SAML:1.0:am:X509-PKI";
pub const AUTHENTICATION_SAML1_PGP: &str = "urn:oasis:names:tc:SAML:1.0:am:PGP";
pub const AUTHENTICATION_SAML1_SPKI: &str = "urn:oasis:names:tc:SAML:1.0:am:SPKI";
pub const AUTHENTICATION_SAML1_UNSPECIFIED: &str = "urn:oasis:names:tc:SAML:1.0:am:unspecified";

pub const AUTHENTICATION_SAML2_PASSWORD: &str =
    "urn:oasis:names:tc:SAML:2.0:ac:classes:Password";
pub const AUTHENTICATION_SAML2_PASSWORD_PROTECTED: &str =
    "urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport";
pub const AUTHENTICATION_SAML2_KERBEROS: &str =
    "urn:oasis:names:tc:SAML:2.0:ac:classes:Kerberos";
pub const AUTHENTICATION_SAML2_SRP: &str =
    "urn:oasis:names:tc:SAML:2.0:ac:classes:SecureRemotePassword";
pub const AUTHENTICATION_SAML2_TLS_CERT: &str =
    "urn:oasis:names:tc:SAML:2.0:ac:classes:TLSClient";
pub const AUTHENTICATION_SAML2_XMLDSIG: &str =
    "urn:oasis:names:tc:SAML:2.0:ac:classes:XMLDSig";
pub const AUTHENTICATION_SAML2_X509: &str = "urn:oasis:names:tc:SAML:2.0:ac:classes:X509";
pub const AUTHENTICATION_SAML2_PGP: &str = "urn:oasis:names:tc:SAML:2.0:ac:classes:PGP";
pub const AUTHENTICATION_SAML2_SPKI: &str = "urn:oasis:names:tc:SAML:2.0:ac:classes:SPKI";
pub const AUTHENTICATION_SAML2_UNSPECIFIED: &str =
    "urn:oasis:names:tc:SAML:2.0:ac:classes:unspecified";

// NameIdentifier formats

/// Wildcard format. A configured format list containing this constant
/// accepts any presented format.
pub const NAMEIDENTIFIER_UNSPECIFIED: &str =
    "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified";
pub const NAMEIDENTIFIER_EMAIL: &str =
    "urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress";
pub const NAMEIDENTIFIER_X509_SUBJECT: &str =
    "urn:oasis:names:tc:SAML:1.1:nameid-format:X509SubjectName";
pub const NAMEIDENTIFIER_WINDOWS: &str =
    "urn:oasis:names:tc:SAML:1.1:nameid-format:WindowsDomainQualifiedName";
pub const NAMEIDENTIFIER_KERBEROS: &str = "urn:oasis:names:tc:SAML:2.0:nameid-format:kerberos";
pub const NAMEIDENTIFIER_ENTITY: &str = "urn:oasis:names:tc:SAML:2.0:nameid-format:entity";
pub const NAMEIDENTIFIER_PERSISTENT: &str =
    "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent";
pub const NAMEIDENTIFIER_TRANSIENT: &str =
    "urn:oasis:names:tc:SAML:2.0:nameid-format:transient";

/// SAML 2.0 authorization decision value that grants access.
pub const DECISION_PERMIT: &str = "Permit";

/// Map a SAML 1.1 authentication method URI to its SAML 2.0 context class.
///
/// Returns `None` for URIs with no defined SAML 2.0 equivalent; callers fall
/// back to comparing the URI verbatim.
pub fn map_authentication_method(saml1_uri: &str) -> Option<&'static str> {
    match saml1_uri {
        AUTHENTICATION_SAML1_PASSWORD => Some(AUTHENTICATION_SAML2_PASSWORD),
        AUTHENTICATION_SAML1_KERBEROS => Some(AUTHENTICATION_SAML2_KERBEROS),
        AUTHENTICATION_SAML1_SRP => Some(AUTHENTICATION_SAML2_SRP),
        AUTHENTICATION_SAML1_TLS_CERT => Some(AUTHENTICATION_SAML2_TLS_CERT),
        AUTHENTICATION_SAML1_XMLDSIG => Some(AUTHENTICATION_SAML2_XMLDSIG),
        AUTHENTICATION_SAML1_X509_PKI => Some(AUTHENTICATION_SAML2_X509),
        AUTHENTICATION_SAML1_PGP => Some(AUTHENTICATION_SAML2_PGP),
        AUTHENTICATION_SAML1_SPKI => Some(AUTHENTICATION_SAML2_SPKI),
        AUTHENTICATION_SAML1_UNSPECIFIED => Some(AUTHENTICATION_SAML2_UNSPECIFIED),
        _ => None,
    }
}

/// Map a SAML 1.1 subject confirmation method URI to its SAML 2.0 equivalent.
pub fn map_confirmation_method(saml1_uri: &str) -> Option<&'static str> {
    match saml1_uri {
        CONFIRMATION_SAML1_HOLDER_OF_KEY => Some(CONFIRMATION_SAML2_HOLDER_OF_KEY),
        CONFIRMATION_SAML1_SENDER_VOUCHES => Some(CONFIRMATION_SAML2_SENDER_VOUCHES),
        CONFIRMATION_SAML1_BEARER => Some(CONFIRMATION_SAML2_BEARER),
        _ => None,
    }
}

/// Normalize an authentication method URI into the SAML 2.0 space.
pub fn normalize_authentication_method(uri: &str) -> &str {
    map_authentication_method(uri).unwrap_or(uri)
}

/// Normalize a subject confirmation method URI into the SAML 2.0 space.
pub fn normalize_confirmation_method(uri: &str) -> &str {
    map_confirmation_method(uri).unwrap_or(uri)
}

/// True when the URI is a holder-of-key confirmation in either SAML version.
pub fn is_holder_of_key(uri: &str) -> bool {
    normalize_confirmation_method(uri) == CONFIRMATION_SAML2_HOLDER_OF_KEY
}

/// True when the URI is a sender-vouches confirmation in either SAML version.
pub fn is_sender_vouches(uri: &str) -> bool {
    normalize_confirmation_method(uri) == CONFIRMATION_SAML2_SENDER_VOUCHES
}
