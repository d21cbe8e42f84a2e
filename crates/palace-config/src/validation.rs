// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks serde attributes cannot express.

use std::str::FromStr;

use croner::Cron;

use crate::diagnostic::ConfigError;
use crate::model::PalaceConfig;

/// Validate a deserialized configuration, collecting every problem instead of
/// stopping at the first.
pub fn validate_config(config: &PalaceConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("gateway.host must not be empty"));
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        errors.push(ConfigError::validation(format!(
            "gateway.host `{host}` is not a valid IP address or hostname"
        )));
    }

    if config.gateway.port == 0 {
        errors.push(ConfigError::validation("gateway.port must be between 1 and 65535"));
    }

    if config.gateway.enabled && config.gateway.auth_token.as_deref().is_some_and(str::is_empty)
    {
        errors.push(ConfigError::validation(
            "gateway.auth_token must not be empty when set",
        ));
    }

    if config.gateway.offline_queue_cap == 0 {
        errors.push(ConfigError::validation(
            "gateway.offline_queue_cap must be at least 1",
        ));
    }

    if config.gateway.audio_retention == 0 {
        errors.push(ConfigError::validation(
            "gateway.audio_retention must be at least 1",
        ));
    }

    if config.gateway.send_timeout_ms == 0 {
        errors.push(ConfigError::validation(
            "gateway.send_timeout_ms must be at least 1",
        ));
    }

    if config.gateway.ping_interval_secs >= config.gateway.idle_timeout_secs {
        errors.push(ConfigError::validation(format!(
            "gateway.ping_interval_secs ({}) must be shorter than gateway.idle_timeout_secs ({})",
            config.gateway.ping_interval_secs, config.gateway.idle_timeout_secs
        )));
    }

    if !(0.0..=2.0).contains(&config.analyzer.temperature) {
        errors.push(ConfigError::validation(format!(
            "analyzer.temperature must be within [0, 2], got {}",
            config.analyzer.temperature
        )));
    }

    if config.analyzer.version.trim().is_empty() {
        errors.push(ConfigError::validation("analyzer.version must not be empty"));
    }

    if let Err(e) = Cron::from_str(&config.scheduler.schedule) {
        errors.push(ConfigError::validation(format!(
            "scheduler.schedule `{}` is not a valid cron expression: {e}",
            config.scheduler.schedule
        )));
    }

    if config.scheduler.max_memories_per_trigger == 0 {
        errors.push(ConfigError::validation(
            "scheduler.max_memories_per_trigger must be at least 1",
        ));
    }

    if config.scheduler.utc_offset_minutes.abs() > 14 * 60 {
        errors.push(ConfigError::validation(format!(
            "scheduler.utc_offset_minutes must be within +/-840, got {}",
            config.scheduler.utc_offset_minutes
        )));
    }

    check_score(
        "director.cinematic_score_threshold",
        config.director.cinematic_score_threshold,
        &mut errors,
    );
    if let Some(low) = config.director.low_significance_threshold {
        check_score("director.low_significance_threshold", low, &mut errors);
    }

    if config.director.synthesis_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "director.synthesis_timeout_secs must be at least 1",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_score(key: &str, value: f64, errors: &mut Vec<ConfigError>) {
    if !(0.0..=5.0).contains(&value) {
        errors.push(ConfigError::validation(format!(
            "{key} must be within [0, 5], got {value}"
        )));
    }
}
