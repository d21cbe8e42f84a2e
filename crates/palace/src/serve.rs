// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `palace serve` command implementation.
//!
//! Starts the delivery gateway around the proactive pipeline, re-analyzes the
//! corpus ahead of the first evaluation and runs the scheduled loop until
//! SIGINT or SIGTERM. On shutdown every client session is closed with a clean
//! close code so patient devices do not try to reconnect.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use palace_agent::{PipelineBuilder, ProactiveLoop, install_signal_handler};
use palace_config::PalaceConfig;
use palace_core::{PalaceError, TriggerStore};
use palace_gateway::{
    AuthConfig, ChannelManager, ChannelSettings, GatewayState, ProactiveBackend, ServerConfig,
    start_server,
};

use crate::memories::load_memories;

/// Runs the `palace serve` command.
pub async fn run_serve(config: PalaceConfig, memories: Option<PathBuf>) -> Result<(), PalaceError> {
    info!(name = %config.service.name, "starting palace serve");

    let auth = AuthConfig::new(config.gateway.auth_token.clone());
    if config.gateway.auth_token.is_none() {
        warn!("gateway.auth_token is not set, every client and API call will be rejected");
    }
    let channel = Arc::new(ChannelManager::new(
        Arc::new(TriggerStore::new()),
        auth.clone(),
        ChannelSettings::from(&config.gateway),
    ));
    let pipeline = Arc::new(PipelineBuilder::from_config(&config)?.build(Arc::clone(&channel)));

    if let Some(path) = memories {
        let seeded = load_memories(&path)?;
        info!(count = seeded.len(), path = %path.display(), "seeding corpus");
        for memory in seeded {
            pipeline.corpus().upsert(memory);
        }
    }

    let cancel = install_signal_handler();

    // The evaluation loop re-analyzes the corpus before its first tick.
    let evaluation = if config.scheduler.enabled {
        let tick = ProactiveLoop::from_config(Arc::clone(&pipeline), &config.scheduler)?;
        Some(tokio::spawn(tick.run(cancel.clone())))
    } else {
        info!("scheduler disabled, evaluations only run on request");
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            pipeline.refresh_corpus().await;
        });
        None
    };

    let gateway = if config.gateway.enabled {
        let state = GatewayState::new(
            Arc::clone(&channel),
            Arc::clone(&pipeline) as Arc<dyn ProactiveBackend>,
            auth,
        );
        Some(start_server(&ServerConfig::from(&config.gateway), state).await?)
    } else {
        info!("gateway disabled, triggers stay queued");
        None
    };

    cancel.cancelled().await;

    if let Some(gateway) = gateway {
        gateway.stop().await;
    }
    if let Some(evaluation) = evaluation
        && let Err(e) = evaluation.await
    {
        warn!(error = %e, "evaluation loop ended abnormally");
    }

    info!("palace serve shutdown complete");
    Ok(())
}
