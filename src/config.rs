//! Server configuration: optional TOML file, then environment overrides.
//!
//! ```toml
//! port = 8787
//! data_dir = "/var/lib/horus"
//! default_shard = "admin"
//! reject = "explicit"
//!
//! [[shards]]
//! name = "admin"
//! seed_file = "seeds/admin.json"
//!
//! [[shards]]
//! name = "platform"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::RetryPolicy;
use crate::seed::SeedSet;
use crate::shard::{Shard, ShardSet};
use crate::storage::FlagStore;
use crate::sync::RejectPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardConfig {
    pub name: String,

    /// JSON array of seed nodes. Falls back to the built-in seeds when unset.
    #[serde(default)]
    pub seed_file: Option<PathBuf>,
}

impl ShardConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seed_file: None,
        }
    }

    pub fn seeds(&self) -> Result<SeedSet> {
        match &self.seed_file {
            Some(path) => SeedSet::load(path),
            None => SeedSet::builtin(&self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub default_shard: String,
    pub shards: Vec<ShardConfig>,
    pub reject: RejectPolicy,
    pub retry: RetryPolicy,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8787,
            data_dir: PathBuf::from(".horus"),
            log_dir: None,
            default_shard: "admin".to_string(),
            shards: vec![ShardConfig::named("admin"), ShardConfig::named("platform")],
            reject: RejectPolicy::Silent,
            retry: RetryPolicy::default(),
        }
    }
}

impl HubConfig {
    /// Load from an optional TOML file, then apply `HORUS_*` variables (and `.env`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                Self::from_toml(&text).with_context(|| format!("parsing config {}", path.display()))?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(bind) = lookup("HORUS_BIND") {
            self.bind = bind;
        }
        if let Some(port) = lookup("HORUS_PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("HORUS_PORT is not a port number: {port}"))?;
        }
        if let Some(dir) = lookup("HORUS_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("HORUS_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(flag) = lookup("HORUS_REJECT_FRAMES") {
            self.reject = match flag.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "explicit" => RejectPolicy::Explicit,
                "0" | "false" | "no" | "silent" => RejectPolicy::Silent,
                other => bail!("HORUS_REJECT_FRAMES must be true or false, got {other}"),
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.shards.is_empty() {
            bail!("at least one shard must be configured");
        }

        let mut seen = HashSet::new();
        for shard in &self.shards {
            let valid = !shard.name.is_empty()
                && shard
                    .name
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
            if !valid {
                bail!("invalid shard name {:?}: use letters, digits, '-' or '_'", shard.name);
            }
            if !seen.insert(shard.name.as_str()) {
                bail!("shard {} is configured twice", shard.name);
            }
        }

        if !seen.contains(self.default_shard.as_str()) {
            bail!("default shard {} is not configured", self.default_shard);
        }

        self.retry.validate()
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn build_shards(&self, flags: Arc<dyn FlagStore>) -> Result<ShardSet> {
        let mut set = ShardSet::new(self.default_shard.clone());
        for shard in &self.shards {
            let seeds = shard
                .seeds()
                .with_context(|| format!("loading seeds for shard {}", shard.name))?;
            set.insert(Shard::new(
                shard.name.clone(),
                Arc::clone(&flags),
                seeds,
                self.reject,
                self.retry.clone(),
            ));
        }
        Ok(set)
    }
}
