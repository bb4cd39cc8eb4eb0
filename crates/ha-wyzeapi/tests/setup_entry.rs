//! Entry setup and unload

mod common;

use common::{TestHass, PASSWORD, USERNAME};
use ha_config_entries::{ConfigEntriesError, ConfigEntryState, Platform};
use ha_wyzeapi::{client_for_entry, IntegrationError, WyzeData, WyzeError, DOMAIN, PLATFORMS};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_test::assert_ok;

fn stored_entries(t: &TestHass) -> Vec<String> {
    let mut ids = t
        .hass
        .data
        .get::<WyzeData>(DOMAIN)
        .unwrap()
        .map(|data| data.entry_ids())
        .unwrap_or_default();
    ids.sort();
    ids
}

fn setup_failure(err: ConfigEntriesError) -> anyhow::Error {
    match err {
        ConfigEntriesError::SetupFailed { source, .. } => source,
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_setup_stores_one_client_and_forwards_all_platforms() {
    let t = TestHass::new();

    let entry = t.setup_entry(USERNAME, PASSWORD).await;

    assert_eq!(entry.state, ConfigEntryState::Loaded);
    assert_eq!(t.factory.created(), 1);
    assert_eq!(stored_entries(&t), vec![entry.entry_id.clone()]);

    let client = t.factory.last_client();
    assert_eq!(
        client.logins.lock().unwrap().as_slice(),
        &[(USERNAME.to_string(), PASSWORD.to_string())]
    );

    let stored = client_for_entry(&t.hass, &entry.entry_id).unwrap();
    let expected: Arc<dyn ha_wyzeapi::WyzeClient> = client.clone();
    assert!(Arc::ptr_eq(&stored, &expected));

    for platform in PLATFORMS {
        assert_eq!(t.platform(platform).setups(), 1, "{platform} not forwarded");
    }
    let mut expected_platforms = PLATFORMS.to_vec();
    expected_platforms.sort();
    assert_eq!(
        t.hass.config_entries.loaded_platforms(&entry.entry_id),
        expected_platforms
    );
}

#[tokio::test]
async fn test_each_entry_gets_its_own_client() {
    let t = TestHass::new();

    let first = t.setup_entry("one@example.com", "a").await;
    let second = t.setup_entry("two@example.com", "b").await;

    assert_eq!(t.factory.created(), 2);
    let mut expected = vec![first.entry_id.clone(), second.entry_id.clone()];
    expected.sort();
    assert_eq!(stored_entries(&t), expected);

    let a = client_for_entry(&t.hass, &first.entry_id).unwrap();
    let b = client_for_entry(&t.hass, &second.entry_id).unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(t.platform(Platform::Light).setups(), 2);
}

#[tokio::test]
async fn test_auth_failure_propagates_unchanged() {
    let t = TestHass::new();
    t.factory
        .fail_logins_with(Some(WyzeError::Auth("bad password".into())));

    let entry = t.add_entry(USERNAME, PASSWORD).await;
    let err = t
        .hass
        .config_entries
        .setup(&t.hass, &entry.entry_id)
        .await
        .unwrap_err();
    t.hass.block_till_done().await;

    let source = setup_failure(err);
    assert_eq!(
        source.downcast_ref::<WyzeError>(),
        Some(&WyzeError::Auth("bad password".into()))
    );

    let entry = t.hass.config_entries.get(&entry.entry_id).unwrap();
    assert_eq!(entry.state, ConfigEntryState::SetupError);
    assert!(entry.reason.unwrap().contains("bad password"));
    assert!(client_for_entry(&t.hass, &entry.entry_id).is_none());
    assert!(t.hass.config_entries.loaded_platforms(&entry.entry_id).is_empty());
}

#[tokio::test]
async fn test_missing_credentials() {
    let t = TestHass::new();
    let entry = t
        .hass
        .config_entries
        .add(ha_config_entries::ConfigEntry::new(DOMAIN, "broken"))
        .await
        .unwrap();

    let err = t
        .hass
        .config_entries
        .setup(&t.hass, &entry.entry_id)
        .await
        .unwrap_err();

    let source = setup_failure(err);
    assert!(matches!(
        source.downcast_ref::<IntegrationError>(),
        Some(IntegrationError::MissingCredential("username"))
    ));
    assert_eq!(t.factory.created(), 0);
}

#[tokio::test]
async fn test_unload_closes_client_and_releases_it() {
    let t = TestHass::new();
    let entry = t.setup_entry(USERNAME, PASSWORD).await;
    let client = t.factory.last_client();

    let unloaded = assert_ok!(
        t.hass
            .config_entries
            .unload(&t.hass, &entry.entry_id)
            .await
    );

    assert!(unloaded);
    assert!(client.is_closed());
    assert!(stored_entries(&t).is_empty());
    assert!(client_for_entry(&t.hass, &entry.entry_id).is_none());
    for platform in PLATFORMS {
        assert_eq!(t.platform(platform).unloads(), 1);
    }
    assert!(t.hass.config_entries.loaded_platforms(&entry.entry_id).is_empty());
    assert_eq!(
        t.hass.config_entries.get(&entry.entry_id).unwrap().state,
        ConfigEntryState::NotLoaded
    );
}

#[tokio::test]
async fn test_failed_platform_unload_keeps_client() {
    let t = TestHass::new();
    let entry = t.setup_entry(USERNAME, PASSWORD).await;
    t.platform(Platform::Lock)
        .unload_ok
        .store(false, Ordering::SeqCst);

    let unloaded = t
        .hass
        .config_entries
        .unload(&t.hass, &entry.entry_id)
        .await
        .unwrap();

    assert!(!unloaded);
    // The client is closed before the platforms unwind
    assert!(t.factory.last_client().is_closed());
    assert_eq!(stored_entries(&t), vec![entry.entry_id.clone()]);
    // Every platform was still asked
    for platform in PLATFORMS {
        assert_eq!(t.platform(platform).unloads(), 1);
    }
    assert_eq!(
        t.hass.config_entries.loaded_platforms(&entry.entry_id),
        vec![Platform::Lock]
    );
    assert_eq!(
        t.hass.config_entries.get(&entry.entry_id).unwrap().state,
        ConfigEntryState::FailedUnload
    );
}

#[tokio::test]
async fn test_platform_unload_error_propagates() {
    let t = TestHass::new();
    let entry = t.setup_entry(USERNAME, PASSWORD).await;
    t.platform(Platform::Climate)
        .unload_error
        .store(true, Ordering::SeqCst);

    let err = t
        .hass
        .config_entries
        .unload(&t.hass, &entry.entry_id)
        .await
        .unwrap_err();

    assert!(matches!(err, ConfigEntriesError::UnloadFailed { .. }));
    assert_eq!(stored_entries(&t), vec![entry.entry_id.clone()]);
}

#[tokio::test]
async fn test_unload_without_stored_client() {
    let t = TestHass::new();
    let entry = t.add_entry(USERNAME, PASSWORD).await;

    let err = ha_wyzeapi::async_unload_entry(&t.hass, &entry)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<IntegrationError>(),
        Some(IntegrationError::NotLoaded(_))
    ));
}

#[tokio::test]
async fn test_reload_logs_in_again() {
    let t = TestHass::new();
    let entry = t.setup_entry(USERNAME, PASSWORD).await;
    let first = t.factory.last_client();

    assert!(t
        .hass
        .config_entries
        .reload(&t.hass, &entry.entry_id)
        .await
        .unwrap());
    t.hass.block_till_done().await;

    assert!(first.is_closed());
    assert_eq!(t.factory.created(), 2);
    let second = t.factory.last_client();
    assert!(!second.is_closed());
    assert_eq!(second.logged_in_as().as_deref(), Some(USERNAME));
    assert_eq!(t.platform(Platform::Switch).setups(), 2);
}

#[tokio::test]
async fn test_unload_right_after_setup_unwinds_every_platform() {
    let t = TestHass::new();
    let entry = t.add_entry(USERNAME, PASSWORD).await;

    // No block_till_done in between: the forwards are still queued at unload
    assert!(t
        .hass
        .config_entries
        .setup(&t.hass, &entry.entry_id)
        .await
        .unwrap());
    assert!(t
        .hass
        .config_entries
        .unload(&t.hass, &entry.entry_id)
        .await
        .unwrap());
    t.hass.block_till_done().await;

    for platform in PLATFORMS {
        assert_eq!(t.platform(platform).setups(), 1, "{platform} not forwarded");
        assert_eq!(t.platform(platform).unloads(), 1, "{platform} not unloaded");
    }
    assert!(t.hass.config_entries.loaded_platforms(&entry.entry_id).is_empty());
    assert!(client_for_entry(&t.hass, &entry.entry_id).is_none());
    assert_eq!(
        t.hass.config_entries.get(&entry.entry_id).unwrap().state,
        ConfigEntryState::NotLoaded
    );
}

#[tokio::test]
async fn test_reload_right_after_setup_forwards_once_per_setup() {
    let t = TestHass::new();
    let entry = t.add_entry(USERNAME, PASSWORD).await;

    t.hass
        .config_entries
        .setup(&t.hass, &entry.entry_id)
        .await
        .unwrap();
    assert!(t
        .hass
        .config_entries
        .reload(&t.hass, &entry.entry_id)
        .await
        .unwrap());
    t.hass.block_till_done().await;

    for platform in PLATFORMS {
        assert_eq!(t.platform(platform).setups(), 2);
        assert_eq!(t.platform(platform).unloads(), 1);
    }
    let mut expected_platforms = PLATFORMS.to_vec();
    expected_platforms.sort();
    assert_eq!(
        t.hass.config_entries.loaded_platforms(&entry.entry_id),
        expected_platforms
    );
    let stored = client_for_entry(&t.hass, &entry.entry_id).unwrap();
    let expected: Arc<dyn ha_wyzeapi::WyzeClient> = t.factory.last_client();
    assert!(Arc::ptr_eq(&stored, &expected));
    assert!(!t.factory.last_client().is_closed());
}

#[tokio::test]
async fn test_remove_right_after_setup_leaves_no_platforms() {
    let t = TestHass::new();
    let entry = t.add_entry(USERNAME, PASSWORD).await;

    t.hass
        .config_entries
        .setup(&t.hass, &entry.entry_id)
        .await
        .unwrap();
    t.hass
        .config_entries
        .remove(&t.hass, &entry.entry_id)
        .await
        .unwrap();
    t.hass.block_till_done().await;

    assert!(t.hass.config_entries.get(&entry.entry_id).is_none());
    assert!(t.hass.config_entries.loaded_platforms(&entry.entry_id).is_empty());
    assert!(stored_entries(&t).is_empty());
    assert!(t.factory.last_client().is_closed());
}
