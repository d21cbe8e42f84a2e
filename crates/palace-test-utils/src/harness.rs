// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end delivery tests.
//!
//! `TestHarness` boots a real gateway on `127.0.0.1:0` around a caller
//! supplied [`ProactiveBackend`], with a temp directory for narration audio.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use palace_config::GatewayConfig;
use palace_core::{PalaceError, TriggerStore};
use palace_gateway::{
    AuthConfig, ChannelManager, ChannelSettings, GatewayState, ProactiveBackend, RunningGateway,
    ServerConfig, start_server,
};

/// Shared secret used when none is configured.
pub const TEST_TOKEN: &str = "test-token";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    token: String,
    store: Option<Arc<TriggerStore>>,
    settings: ChannelSettings,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            token: TEST_TOKEN.to_string(),
            store: None,
            settings: ChannelSettings::from(&GatewayConfig::default()),
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = token.to_string();
        self
    }

    /// Share a trigger store with the backend under test.
    pub fn with_store(mut self, store: Arc<TriggerStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_channel_settings(mut self, settings: ChannelSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Start the gateway. The channel manager is returned alongside so the
    /// backend can be wired to it before the first request.
    pub async fn build(
        self,
        backend: impl FnOnce(Arc<ChannelManager>) -> Arc<dyn ProactiveBackend>,
    ) -> Result<TestHarness, PalaceError> {
        let audio_dir = tempfile::TempDir::new()
            .map_err(|e| PalaceError::Internal(format!("temp dir: {e}")))?;
        let store = self.store.unwrap_or_default();
        let auth = AuthConfig::new(Some(self.token.clone()));
        let channel = Arc::new(ChannelManager::new(
            Arc::clone(&store),
            auth.clone(),
            self.settings,
        ));
        let state = GatewayState::new(Arc::clone(&channel), backend(channel), auth);
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            audio_dir: audio_dir.path().to_path_buf(),
        };
        let gateway = start_server(&config, state).await?;
        tracing::debug!(addr = %gateway.local_addr(), "test gateway started");

        Ok(TestHarness {
            gateway,
            store,
            token: self.token,
            audio_dir,
        })
    }
}

/// A running gateway with its store and audio directory.
pub struct TestHarness {
    gateway: RunningGateway,
    store: Arc<TriggerStore>,
    token: String,
    audio_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.gateway.local_addr()
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.local_addr())
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{path}", self.local_addr())
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn store(&self) -> &Arc<TriggerStore> {
        &self.store
    }

    pub fn channel(&self) -> &Arc<ChannelManager> {
        self.gateway.channel()
    }

    pub fn audio_dir(&self) -> &Path {
        self.audio_dir.path()
    }

    pub async fn shutdown(self) {
        self.gateway.stop().await;
    }
}
