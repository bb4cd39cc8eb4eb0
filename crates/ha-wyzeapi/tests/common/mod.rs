//! Test doubles for the Wyze client and the entity platforms
//!
//! Mirrors the way integration tests stub out the cloud library: a factory
//! hands out recording clients, and every platform in `PLATFORMS` is backed
//! by a counter that can be told to refuse unloading.

#![allow(dead_code)]

use async_trait::async_trait;
use ha_config_entries::{
    ConfigEntry, ConfigEntrySource, EntityPlatform, HomeAssistant, Platform,
};
use ha_wyzeapi::{WyzeClient, WyzeClientFactory, WyzeConfig, WyzeError, WyzeIntegration, DOMAIN, PLATFORMS};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const USERNAME: &str = "Me@Example.com";
pub const PASSWORD: &str = "hunter2";

/// Route `tracing` output through the test harness; `RUST_LOG` filters it
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
pub struct MockClient {
    pub logins: Mutex<Vec<(String, String)>>,
    pub closed: AtomicBool,
    login_error: Option<WyzeError>,
}

impl MockClient {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn logged_in_as(&self) -> Option<String> {
        self.logins.lock().unwrap().last().map(|(u, _)| u.clone())
    }
}

#[async_trait]
impl WyzeClient for MockClient {
    async fn login(&self, username: &str, password: &str) -> Result<(), WyzeError> {
        self.logins
            .lock()
            .unwrap()
            .push((username.to_string(), password.to_string()));
        match &self.login_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn close(&self) -> Result<(), WyzeError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out [`MockClient`]s and remembers them
#[derive(Default)]
pub struct MockClientFactory {
    pub clients: Mutex<Vec<Arc<MockClient>>>,
    login_error: Mutex<Option<WyzeError>>,
}

impl MockClientFactory {
    /// Make clients created from now on fail to log in
    pub fn fail_logins_with(&self, error: Option<WyzeError>) {
        *self.login_error.lock().unwrap() = error;
    }

    pub fn created(&self) -> usize {
        self.clients.lock().unwrap().len()
    }

    pub fn last_client(&self) -> Arc<MockClient> {
        self.clients
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no client created")
    }
}

#[async_trait]
impl WyzeClientFactory for MockClientFactory {
    async fn create(&self) -> Result<Arc<dyn WyzeClient>, WyzeError> {
        let client = Arc::new(MockClient {
            login_error: self.login_error.lock().unwrap().clone(),
            ..Default::default()
        });
        self.clients.lock().unwrap().push(client.clone());
        Ok(client)
    }
}

/// Counts forwards and answers unloads as configured
pub struct MockPlatform {
    pub setups: AtomicUsize,
    pub unloads: AtomicUsize,
    pub unload_ok: AtomicBool,
    pub unload_error: AtomicBool,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self {
            setups: AtomicUsize::new(0),
            unloads: AtomicUsize::new(0),
            unload_ok: AtomicBool::new(true),
            unload_error: AtomicBool::new(false),
        }
    }
}

impl MockPlatform {
    pub fn setups(&self) -> usize {
        self.setups.load(Ordering::SeqCst)
    }

    pub fn unloads(&self) -> usize {
        self.unloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntityPlatform for MockPlatform {
    async fn setup_entry(&self, _hass: &HomeAssistant, _entry: &ConfigEntry) -> anyhow::Result<()> {
        self.setups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn unload_entry(&self, _hass: &HomeAssistant, _entry: &ConfigEntry) -> anyhow::Result<bool> {
        self.unloads.fetch_add(1, Ordering::SeqCst);
        if self.unload_error.load(Ordering::SeqCst) {
            anyhow::bail!("entity registry busy");
        }
        Ok(self.unload_ok.load(Ordering::SeqCst))
    }
}

/// An installation with the Wyze integration and mock platforms registered
pub struct TestHass {
    pub dir: TempDir,
    pub hass: HomeAssistant,
    pub factory: Arc<MockClientFactory>,
    pub platforms: HashMap<Platform, Arc<MockPlatform>>,
}

impl TestHass {
    pub fn new() -> Self {
        init_tracing();
        let dir = TempDir::new().unwrap();
        let hass = HomeAssistant::new(dir.path());
        let factory = Arc::new(MockClientFactory::default());
        WyzeIntegration::register(&hass, factory.clone());

        let mut platforms = HashMap::new();
        for platform in PLATFORMS {
            let mock = Arc::new(MockPlatform::default());
            hass.register_platform(DOMAIN, platform, mock.clone());
            platforms.insert(platform, mock);
        }

        Self {
            dir,
            hass,
            factory,
            platforms,
        }
    }

    pub fn platform(&self, platform: Platform) -> &MockPlatform {
        &self.platforms[&platform]
    }

    /// Add an entry holding the given credentials, without setting it up
    pub async fn add_entry(&self, username: &str, password: &str) -> ConfigEntry {
        let config = WyzeConfig::new(username, password);
        let entry = ConfigEntry::new(DOMAIN, username)
            .with_data(config.to_data())
            .with_unique_id(config.unique_id())
            .with_source(ConfigEntrySource::User);
        self.hass.config_entries.add(entry).await.unwrap()
    }

    /// Add an entry and set it up, waiting for the platform forwards
    pub async fn setup_entry(&self, username: &str, password: &str) -> ConfigEntry {
        let entry = self.add_entry(username, password).await;
        assert!(self
            .hass
            .config_entries
            .setup(&self.hass, &entry.entry_id)
            .await
            .unwrap());
        self.hass.block_till_done().await;
        self.hass.config_entries.get(&entry.entry_id).unwrap()
    }
}
