//! Alerting documents and contact points used across tests.

use contactpoints::core::{
    AlertingConfig, ContactPoint, EncryptionService, ReceiverEntry, ReceiverGroup, Route,
};
use contactpoints::secrets::{Setting, SettingsCipher};
use serde_json::json;

pub const SLACK_RECEIVER: &str = "slack receiver";
pub const SLACK_UID: &str = "UID1";
pub const SLACK_URL: &str = "secure url";

/// One group, "slack receiver", holding a single slack entry with an
/// encrypted url. The root route points at it.
pub async fn slack_receiver_config(encryption: &dyn EncryptionService) -> AlertingConfig {
    let cipher = SettingsCipher::new(encryption);
    let mut entry = ReceiverEntry::new(SLACK_UID, SLACK_RECEIVER, "slack");
    entry
        .settings
        .insert("recipient", Setting::Plain(json!("value_recipient")));
    entry.settings.insert(
        "url",
        Setting::Secure(cipher.seal(SLACK_URL).await.unwrap()),
    );

    AlertingConfig {
        route: Some(Route::new(SLACK_RECEIVER)),
        receivers: vec![ReceiverGroup::new(SLACK_RECEIVER, vec![entry])],
        ..Default::default()
    }
}

/// A new slack contact point named "test-contact-point".
pub fn new_contact_point() -> ContactPoint {
    ContactPoint::new("test-contact-point", "slack").with_settings(json!({
        "recipient": "value_recipient",
        "token": "value_token",
    }))
}

/// Two groups: "receiver-1" with abc, and "receiver-2" with def, ghi and jkl.
/// The root route and its only child both point at "receiver-1".
pub fn config_with_receivers() -> AlertingConfig {
    AlertingConfig {
        route: Some(
            Route::new("receiver-1").with_routes(vec![Route::new("receiver-1")]),
        ),
        receivers: vec![
            ReceiverGroup::new("receiver-1", vec![entry("abc", "receiver-1", "slack")]),
            ReceiverGroup::new(
                "receiver-2",
                vec![
                    entry("def", "receiver-2", "slack"),
                    entry("ghi", "receiver-2", "email"),
                    entry("jkl", "receiver-2", "discord"),
                ],
            ),
        ],
        ..Default::default()
    }
}

/// Like `config_with_receivers`, but ghi's own name disagrees with its group.
pub fn inconsistent_config_with_receivers() -> AlertingConfig {
    let mut config = config_with_receivers();
    config.receivers[1].entries[1].name = "receiver-3".into();
    config
}

pub fn entry(uid: &str, name: &str, kind: &str) -> ReceiverEntry {
    ReceiverEntry::new(uid, name, kind)
}
