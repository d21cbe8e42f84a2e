// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading.
//!
//! Merge order, later wins: compiled defaults, `/etc/palace/palace.toml`,
//! `~/.config/palace/palace.toml`, `./palace.toml`, then `PALACE_*` env vars.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::PalaceConfig;

/// Top-level sections env vars may address.
const SECTIONS: &[&str] = &[
    "service",
    "patient",
    "gateway",
    "analyzer",
    "scheduler",
    "director",
];

pub(crate) const SYSTEM_CONFIG: &str = "/etc/palace/palace.toml";
pub(crate) const LOCAL_CONFIG: &str = "palace.toml";

pub(crate) fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("palace/palace.toml"))
        .unwrap_or_default()
}

/// Build the full layered figment without extracting it.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(PalaceConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Load from the standard file hierarchy with env overrides.
pub fn load_config() -> Result<PalaceConfig, figment::Error> {
    build_figment().extract()
}

/// Load from an explicit file plus env overrides, skipping the hierarchy.
pub fn load_config_from_path(path: &Path) -> Result<PalaceConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PalaceConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Load from a TOML string only. No files, no env.
pub fn load_config_from_str(toml_content: &str) -> Result<PalaceConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PalaceConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// `PALACE_GATEWAY_AUTH_TOKEN` -> `gateway.auth_token`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// underscores inside field names survive.
fn env_provider() -> Env {
    Env::prefixed("PALACE_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("gateway_auth_token"), "gateway.auth_token");
        assert_eq!(
            map_env_key("scheduler_max_memories_per_trigger"),
            "scheduler.max_memories_per_trigger"
        );
        assert_eq!(map_env_key("director_tts_url"), "director.tts_url");
        assert_eq!(map_env_key("unknown_thing"), "unknown_thing");
    }

    #[test]
    fn env_overrides_file_values() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "palace.toml",
                r#"
[gateway]
port = 4000
auth_token = "from-file"
"#,
            )?;
            jail.set_env("PALACE_GATEWAY_AUTH_TOKEN", "from-env");
            jail.set_env("PALACE_SCHEDULER_COOLDOWN_DAYS", "7");

            let config = load_config_from_path(Path::new("palace.toml"))?;
            assert_eq!(config.gateway.port, 4000);
            assert_eq!(config.gateway.auth_token.as_deref(), Some("from-env"));
            assert_eq!(config.scheduler.cooldown_days, 7);
            Ok(())
        });
    }
}
