use std::collections::BTreeMap;

use serde::Deserialize;

use chatstorm_core::error::{HarnessError, Result};
use chatstorm_core::protocol::envelope::{ChannelId, MessageShape};
use chatstorm_core::protocol::frame::{WireVariant, HEX_MAX_BODY};

/// Envelope bytes added around generated text or fuzz filler.
const ENVELOPE_SLACK: usize = 128;
/// Longest `-<index>` suffix on a display name (`clients` is at most 10000).
const DISPLAY_SUFFIX: usize = 6;
/// Bytes per nesting level in the deep-JSON payload (`{"child":` + `}`).
const FUZZ_BYTES_PER_LEVEL: usize = 10;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    pub version: u32,

    #[serde(default)]
    pub target: TargetSection,

    #[serde(default)]
    pub fleet: FleetSection,

    #[serde(default)]
    pub fuzz: FuzzSection,
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(HarnessError::UnsupportedVersion);
        }

        self.target.validate()?;
        self.fleet.validate(self.target.wire)?;
        self.fuzz.validate(self.target.wire)?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub wire: WireVariant,

    /// Request path for the transport-native (WebSocket) variant.
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// WebSocket subprotocol offered during the handshake.
    #[serde(default = "default_subprotocol")]
    pub subprotocol: Option<String>,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Ceiling on a declared inbound body length.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for TargetSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            wire: WireVariant::default(),
            ws_path: default_ws_path(),
            subprotocol: default_subprotocol(),
            connect_timeout_ms: default_connect_timeout_ms(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl TargetSection {
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(HarnessError::InvalidConfig("target.host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(HarnessError::InvalidConfig("target.port must not be 0".into()));
        }
        if !self.ws_path.starts_with('/') {
            return Err(HarnessError::InvalidConfig(
                "target.ws_path must start with '/'".into(),
            ));
        }
        if !(100..=60_000).contains(&self.connect_timeout_ms) {
            return Err(HarnessError::InvalidConfig(
                "target.connect_timeout_ms must be between 100 and 60000".into(),
            ));
        }
        if self.max_frame_bytes < 2 {
            return Err(HarnessError::InvalidConfig(
                "target.max_frame_bytes must be at least 2".into(),
            ));
        }
        Ok(())
    }

    /// `host:port` for stream transports.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// WebSocket URL for the transport-native variant.
    pub fn ws_url(&self) -> String {
        format!("ws://{}:{}{}", self.host, self.port, self.ws_path)
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    4800
}
fn default_ws_path() -> String {
    "/".into()
}
fn default_subprotocol() -> Option<String> {
    Some("ws".into())
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_max_frame_bytes() -> usize {
    1024 * 1024
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FleetSection {
    #[serde(default = "default_clients")]
    pub clients: usize,

    /// Think time between actions, per client.
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Generated chat text length bounds (pre-trim).
    #[serde(default = "default_min_len")]
    pub min_len: usize,
    #[serde(default = "default_max_len")]
    pub max_len: usize,

    /// Channel ids are `1..=channels`.
    #[serde(default = "default_channels")]
    pub channels: u32,

    #[serde(default)]
    pub message_shape: MessageShape,

    /// Display-name pool; session `i` is `names[i % len]-i`.
    #[serde(default = "default_names")]
    pub names: Vec<String>,

    /// Channel styling table for presentation.
    #[serde(default = "default_channel_colors")]
    pub channel_colors: BTreeMap<u32, String>,

    /// Fixed seed for reproducible runs; random when absent.
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default = "default_sink_capacity")]
    pub sink_capacity: usize,

    /// How long a terminal event may wait for queue space.
    #[serde(default = "default_sink_reliable_timeout_ms")]
    pub sink_reliable_timeout_ms: u64,
}

impl Default for FleetSection {
    fn default() -> Self {
        Self {
            clients: default_clients(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            min_len: default_min_len(),
            max_len: default_max_len(),
            channels: default_channels(),
            message_shape: MessageShape::default(),
            names: default_names(),
            channel_colors: default_channel_colors(),
            seed: None,
            sink_capacity: default_sink_capacity(),
            sink_reliable_timeout_ms: default_sink_reliable_timeout_ms(),
        }
    }
}

impl FleetSection {
    pub fn validate(&self, wire: WireVariant) -> Result<()> {
        if !(1..=10_000).contains(&self.clients) {
            return Err(HarnessError::InvalidConfig(
                "fleet.clients must be between 1 and 10000".into(),
            ));
        }
        if self.min_delay_ms > self.max_delay_ms {
            return Err(HarnessError::InvalidConfig(
                "fleet.min_delay_ms must not exceed max_delay_ms".into(),
            ));
        }
        if self.min_len > self.max_len {
            return Err(HarnessError::InvalidConfig(
                "fleet.min_len must not exceed max_len".into(),
            ));
        }
        if wire == WireVariant::HexLength && self.max_len.saturating_add(ENVELOPE_SLACK) > HEX_MAX_BODY {
            return Err(HarnessError::InvalidConfig(format!(
                "fleet.max_len too large for hex-length framing (limit {})",
                HEX_MAX_BODY - ENVELOPE_SLACK
            )));
        }
        if !(1..=64).contains(&self.channels) {
            return Err(HarnessError::InvalidConfig(
                "fleet.channels must be between 1 and 64".into(),
            ));
        }
        if self.names.iter().all(|n| n.trim().is_empty()) {
            return Err(HarnessError::InvalidConfig(
                "fleet.names must contain at least one name".into(),
            ));
        }
        if wire == WireVariant::HexLength {
            // A name rides in every join and in nested messages next to the text.
            let budget = HEX_MAX_BODY.saturating_sub(self.max_len.saturating_add(ENVELOPE_SLACK));
            if let Some(name) = self.names.iter().find(|n| name_cost(n) > budget) {
                return Err(HarnessError::InvalidConfig(format!(
                    "fleet.names entry of {} bytes too large for hex-length framing",
                    name.len()
                )));
            }
        }
        if self.sink_capacity == 0 {
            return Err(HarnessError::InvalidConfig(
                "fleet.sink_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Display name for the session at `idx`.
    pub fn display_name(&self, idx: usize) -> String {
        let pool: Vec<&str> = self
            .names
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .collect();
        match pool.get(idx % pool.len().max(1)) {
            Some(base) => format!("{base}-{idx}"),
            None => format!("client-{idx}"),
        }
    }

    pub fn channel_color(&self, channel: ChannelId) -> &str {
        self.channel_colors
            .get(&channel.get())
            .map(String::as_str)
            .unwrap_or("white")
    }
}

/// Encoded size of a display name built from `name`: JSON-escaped and
/// quoted, plus the `-<index>` suffix.
fn name_cost(name: &str) -> usize {
    serde_json::to_string(name.trim()).map_or(usize::MAX, |s| s.len().saturating_add(DISPLAY_SUFFIX))
}

fn default_clients() -> usize {
    5
}
fn default_min_delay_ms() -> u64 {
    2000
}
fn default_max_delay_ms() -> u64 {
    4000
}
fn default_min_len() -> usize {
    5
}
fn default_max_len() -> usize {
    40
}
fn default_channels() -> u32 {
    5
}
fn default_names() -> Vec<String> {
    [
        "Alice", "Bob", "Charlie", "David", "Eve", "Frank", "Grace", "Heidi", "Ivan", "Judy",
        "Mallory", "Oscar", "Peggy", "Sybil", "Trent", "Walter",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_channel_colors() -> BTreeMap<u32, String> {
    [
        (1, "#ffcccc"),
        (2, "#ffebcc"),
        (3, "#ffffcc"),
        (4, "#ccffcc"),
        (5, "#cce5ff"),
    ]
    .into_iter()
    .map(|(k, v)| (k, v.to_string()))
    .collect()
}
fn default_sink_capacity() -> usize {
    256
}
fn default_sink_reliable_timeout_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FuzzSection {
    /// Filler bytes in the oversized frame (body ends up slightly larger).
    #[serde(default = "default_oversized_bytes")]
    pub oversized_bytes: usize,

    /// Nesting levels in the deep-JSON frame.
    #[serde(default = "default_nesting_depth")]
    pub nesting_depth: usize,

    /// Pause between the two probes.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Bound on waiting for any response after both probes.
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
}

impl Default for FuzzSection {
    fn default() -> Self {
        Self {
            oversized_bytes: default_oversized_bytes(),
            nesting_depth: default_nesting_depth(),
            settle_ms: default_settle_ms(),
            response_timeout_ms: default_response_timeout_ms(),
        }
    }
}

impl FuzzSection {
    pub fn validate(&self, wire: WireVariant) -> Result<()> {
        if self.oversized_bytes == 0 || self.nesting_depth == 0 {
            return Err(HarnessError::InvalidConfig(
                "fuzz.oversized_bytes and fuzz.nesting_depth must be positive".into(),
            ));
        }
        if self.response_timeout_ms == 0 {
            return Err(HarnessError::InvalidConfig(
                "fuzz.response_timeout_ms must be positive".into(),
            ));
        }
        if wire == WireVariant::HexLength {
            let limit = HEX_MAX_BODY - ENVELOPE_SLACK;
            if self.oversized_bytes > limit {
                return Err(HarnessError::InvalidConfig(format!(
                    "fuzz.oversized_bytes must be at most {limit} with hex-length framing"
                )));
            }
            if self.nesting_depth.saturating_mul(FUZZ_BYTES_PER_LEVEL) > limit {
                return Err(HarnessError::InvalidConfig(format!(
                    "fuzz.nesting_depth must be at most {} with hex-length framing",
                    limit / FUZZ_BYTES_PER_LEVEL
                )));
            }
        }
        Ok(())
    }
}

fn default_oversized_bytes() -> usize {
    8192
}
fn default_nesting_depth() -> usize {
    2000
}
fn default_settle_ms() -> u64 {
    1000
}
fn default_response_timeout_ms() -> u64 {
    5000
}
