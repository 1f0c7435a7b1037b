//! Input validation for contact points.

use super::ContactPointError;
use crate::core::ContactPoint;
use crate::secrets::{NotifierSchema, Setting, Settings};
use rand::distr::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Longest uid accepted from a caller.
pub const MAX_UID_LENGTH: usize = 40;
const GENERATED_UID_LENGTH: usize = 14;

fn uid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9\-_]+$").expect("uid pattern is valid"))
}

/// Checks the fields every create or update request must carry, and returns
/// the request's settings.
pub fn validate_contact_point(
    contact_point: &ContactPoint,
) -> Result<&Map<String, Value>, ContactPointError> {
    if contact_point.name.trim().is_empty() {
        return Err(ContactPointError::validation("name should not be empty"));
    }
    if contact_point.kind.trim().is_empty() {
        return Err(ContactPointError::validation("type should not be empty"));
    }
    if !contact_point.uid.is_empty() {
        validate_uid(&contact_point.uid)?;
    }
    match &contact_point.settings {
        Some(settings) if !settings.is_empty() => Ok(settings),
        _ => Err(ContactPointError::validation("settings should not be empty")),
    }
}

/// Checks a caller-supplied uid.
pub fn validate_uid(uid: &str) -> Result<(), ContactPointError> {
    if uid.len() > MAX_UID_LENGTH {
        return Err(ContactPointError::validation(format!(
            "uid is longer than {} characters",
            MAX_UID_LENGTH
        )));
    }
    if !uid_pattern().is_match(uid) {
        return Err(ContactPointError::validation(
            "uid may only contain letters, digits, '-' and '_'",
        ));
    }
    Ok(())
}

/// Checks settings after secure fields have been merged in.
pub fn validate_merged_settings(
    schema: &NotifierSchema,
    settings: &Settings,
) -> Result<(), ContactPointError> {
    if settings.is_empty() {
        return Err(ContactPointError::validation("settings should not be empty"));
    }
    for field in &schema.required_fields {
        let present = match settings.get(field) {
            Some(Setting::Secure(_)) => true,
            Some(Setting::Plain(Value::Null)) | None => false,
            Some(Setting::Plain(Value::String(s))) => !s.trim().is_empty(),
            Some(Setting::Plain(_)) => true,
        };
        if !present {
            return Err(ContactPointError::validation(format!(
                "setting '{}' is required for type '{}'",
                field, schema.kind
            )));
        }
    }
    Ok(())
}

/// Generates a random uid.
pub fn generate_uid() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_UID_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::EncryptedValue;
    use serde_json::json;

    fn contact_point() -> ContactPoint {
        ContactPoint::new("test-contact-point", "slack")
            .with_settings(json!({ "recipient": "value_recipient", "token": "value_token" }))
    }

    #[test]
    fn test_valid_contact_point_passes() {
        let cp = contact_point();
        assert_eq!(validate_contact_point(&cp).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        let mut no_type = contact_point();
        no_type.kind = String::new();
        let mut no_name = contact_point();
        no_name.name = "  ".into();
        let mut nil_settings = contact_point();
        nil_settings.settings = None;
        let empty_settings = contact_point().with_settings(json!({}));

        for cp in [no_type, no_name, nil_settings, empty_settings] {
            assert!(matches!(
                validate_contact_point(&cp),
                Err(ContactPointError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_uid_rules() {
        assert!(validate_uid("1337").is_ok());
        assert!(validate_uid("my_contact-point").is_ok());
        assert!(validate_uid("has space").is_err());
        assert!(validate_uid(&"a".repeat(MAX_UID_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_generated_uids_are_valid_and_distinct() {
        let a = generate_uid();
        let b = generate_uid();
        assert_eq!(a.len(), GENERATED_UID_LENGTH);
        assert!(validate_uid(&a).is_ok());
        assert_ne!(a, b);
    }

    #[test]
    fn test_required_field_may_be_secure() {
        let schema = NotifierSchema::new("pagerduty", &["integrationKey"], &["integrationKey"]);
        let mut settings = Settings::new();
        settings.insert("severity", Setting::Plain(json!("critical")));
        assert!(validate_merged_settings(&schema, &settings).is_err());

        settings.insert(
            "integrationKey",
            Setting::Secure(EncryptedValue::from_ciphertext(b"sealed")),
        );
        assert!(validate_merged_settings(&schema, &settings).is_ok());
    }

    #[test]
    fn test_blank_required_field_is_rejected() {
        let schema = NotifierSchema::new("email", &[], &["addresses"]);
        let mut settings = Settings::new();
        settings.insert("addresses", Setting::Plain(json!("")));
        assert!(validate_merged_settings(&schema, &settings).is_err());
    }
}
