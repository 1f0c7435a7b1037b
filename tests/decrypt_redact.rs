mod helpers;

use contactpoints::access_control::{
    PermissionAccessControl, Requester, ACTION_PROVISIONING_READ_SECRETS,
};
use contactpoints::core::{ContactPointQuery, OrgId};
use contactpoints::secrets::REDACTED_VALUE;
use contactpoints::store::{InMemoryConfigStore, InMemoryProvenanceStore, JournalTransactionManager};
use contactpoints::ContactPointError;
use contactpoints::ContactPointService;
use helpers::fakes::CountingEncryption;
use helpers::fixtures::{slack_receiver_config, SLACK_UID, SLACK_URL};
use helpers::{admin, viewer, TestService, ORG};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_contact_points_are_redacted_by_default() {
    let sut = TestService::seeded().await;

    let cps = sut
        .service
        .list(&ContactPointQuery::new(ORG), None)
        .await
        .unwrap();

    let settings = cps[0].settings.as_ref().unwrap();
    assert_eq!(settings["url"], json!(REDACTED_VALUE));
    assert_eq!(settings["recipient"], json!("value_recipient"));
    assert_eq!(sut.encryption.decryptions(), 0);
}

#[tokio::test]
async fn test_decrypt_without_permission_is_denied() {
    let sut = TestService::seeded().await;
    sut.access_control.set_allow(false);

    let err = sut
        .service
        .list(&ContactPointQuery::new(ORG).decrypted(), Some(&viewer()))
        .await
        .unwrap_err();

    assert!(matches!(err, ContactPointError::PermissionDenied(_)));
    assert_eq!(sut.access_control.calls(), 1);
    assert_eq!(sut.encryption.decryptions(), 0);
}

#[tokio::test]
async fn test_decrypt_without_requester_is_denied() {
    let sut = TestService::seeded().await;

    let err = sut
        .service
        .list(&ContactPointQuery::new(ORG).decrypted(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, ContactPointError::PermissionDenied(_)));
    assert_eq!(sut.access_control.calls(), 0);
    assert_eq!(sut.encryption.decryptions(), 0);
}

#[tokio::test]
async fn test_decrypt_for_another_org_is_denied() {
    let sut = TestService::seeded().await;
    let outsider = Requester::new("outsider", OrgId(2)).with_permission(ACTION_PROVISIONING_READ_SECRETS);

    let err = sut
        .service
        .list(&ContactPointQuery::new(ORG).decrypted(), Some(&outsider))
        .await
        .unwrap_err();

    assert!(matches!(err, ContactPointError::PermissionDenied(_)));
    assert_eq!(sut.encryption.decryptions(), 0);
}

#[tokio::test]
async fn test_decrypt_with_permission_reveals_secure_settings() {
    let sut = TestService::seeded().await;

    let cps = sut
        .service
        .list(&ContactPointQuery::new(ORG).decrypted(), Some(&admin()))
        .await
        .unwrap();

    let settings = cps[0].settings.as_ref().unwrap();
    assert_eq!(settings["url"], json!(SLACK_URL));
    assert_eq!(settings["recipient"], json!("value_recipient"));
}

#[tokio::test]
async fn test_get_applies_the_same_gate() {
    let sut = TestService::seeded().await;

    let redacted = sut.service.get(ORG, SLACK_UID, false, None).await.unwrap();
    assert_eq!(redacted.settings.unwrap()["url"], json!(REDACTED_VALUE));

    let err = sut.service.get(ORG, SLACK_UID, true, None).await.unwrap_err();
    assert!(matches!(err, ContactPointError::PermissionDenied(_)));

    let revealed = sut
        .service
        .get(ORG, SLACK_UID, true, Some(&admin()))
        .await
        .unwrap();
    assert_eq!(revealed.settings.unwrap()["url"], json!(SLACK_URL));
}

#[tokio::test]
async fn test_permission_access_control_reads_requester_actions() {
    let encryption = Arc::new(CountingEncryption::new());
    let config_store = Arc::new(
        InMemoryConfigStore::new().with_config(ORG, slack_receiver_config(encryption.as_ref()).await),
    );
    let provenance_store = Arc::new(InMemoryProvenanceStore::new());
    let xact = JournalTransactionManager::new()
        .with_participant(config_store.clone())
        .with_participant(provenance_store.clone());
    let service = ContactPointService::new(
        config_store,
        provenance_store,
        Arc::new(xact),
        encryption,
        Arc::new(PermissionAccessControl),
    );
    let query = ContactPointQuery::new(ORG).decrypted();

    let err = service.list(&query, Some(&viewer())).await.unwrap_err();
    assert!(matches!(err, ContactPointError::PermissionDenied(_)));

    let cps = service.list(&query, Some(&admin())).await.unwrap();
    assert_eq!(cps[0].settings.as_ref().unwrap()["url"], json!(SLACK_URL));
}
