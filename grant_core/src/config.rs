//! Engine configuration and connection credentials.
//!
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use yaml_peg::serde as yaml;

use crate::logging::debug;

/// How the effective grant option is derived when several grantee rows
/// disagree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantOptionPolicy {
    /// True when any matching row carries the grant option.
    #[default]
    Any,
    /// True only when every matching row carries it. False when nothing
    /// matches.
    All,
}

impl GrantOptionPolicy {
    /// Fold the grant-option flags of the matching rows.
    pub fn effective<I: IntoIterator<Item = bool>>(&self, flags: I) -> bool {
        let mut flags = flags.into_iter().peekable();
        match self {
            GrantOptionPolicy::Any => flags.any(|f| f),
            GrantOptionPolicy::All => flags.peek().is_some() && flags.all(|f| f),
        }
    }
}

/// Engine-wide settings. Immutable once the engine is built.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// See [`GrantOptionPolicy`].
    #[serde(default)]
    pub grant_option_policy: GrantOptionPolicy,
    /// Revoke with `CASCADE` even when the grant was made without the
    /// grant option.
    #[serde(default)]
    pub always_cascade: bool,
}

impl EngineConfig {
    /// Read the config from a yaml file.
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<EngineConfig> {
        let config_raw = fs::read_to_string(&path).context("Reading file")?;
        let mut config =
            yaml::from_str::<EngineConfig>(&config_raw).context("Deserializing config")?;
        Ok(config.pop().unwrap_or_default())
    }
}

/// Alias for HashMap to hold credentials information.
pub type CredentialsMap = HashMap<String, String>;

/// Read named credential blocks from a yaml file.
///
/// ```yaml
/// snowflake:
///   account: my_account
///   role: GRANT_ADMIN
///   ...
/// ```
pub fn fetch_credentials<P: AsRef<Path>>(path: P) -> Result<HashMap<String, CredentialsMap>> {
    debug!("Trying to read credentials from {:?}", path.as_ref());
    let credentials_raw = fs::read_to_string(path).context("Reading credentials file")?;
    let mut config = yaml::from_str::<HashMap<String, CredentialsMap>>(&credentials_raw)?;

    config
        .pop()
        .ok_or_else(|| anyhow!["failed to read credentials"])
}
