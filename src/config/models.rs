use crate::humanize::HumanDuration;
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub traversal: TraversalConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runtime: RuntimeConfig::default(),
            polling: PollingConfig::default(),
            traversal: TraversalConfig::default(),
        }
    }
}

/// Worker pool sizing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Bound of each worker's job channel
    #[serde(default = "default_channel_size")]
    pub channel_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            channel_size: default_channel_size(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_channel_size() -> usize {
    100
}

/// Timing of transfer-status polling
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval: HumanDuration,
    /// Maximum total wait for one remote transfer before it times out
    #[serde(default = "default_request_ttl")]
    pub request_ttl: HumanDuration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            request_ttl: default_request_ttl(),
        }
    }
}

fn default_poll_interval() -> HumanDuration {
    HumanDuration(500) // 500ms
}

fn default_request_ttl() -> HumanDuration {
    HumanDuration(10 * 60 * 1000) // 10m
}

/// Traversal defaults applied when a crawl request leaves them unset
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TraversalConfig {
    #[serde(default = "default_depth")]
    pub default_depth: u32,
    /// Aspect type whose payload names child items
    #[serde(default = "default_relationship_aspect")]
    pub relationship_aspect: String,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            default_depth: default_depth(),
            relationship_aspect: default_relationship_aspect(),
        }
    }
}

fn default_depth() -> u32 {
    1
}

fn default_relationship_aspect() -> String {
    "urn:bamm:io.partchain.single_level_bom_as_built:1.0.0#SingleLevelBomAsBuilt".to_string()
}
