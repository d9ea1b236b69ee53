//! Harness config loader (strict parsing).

pub mod schema;

use std::fs;

use chatstorm_core::error::{HarnessError, Result};

pub use schema::{FleetSection, FuzzSection, HarnessConfig, TargetSection};

pub fn load_from_file(path: &str) -> Result<HarnessConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| HarnessError::InvalidConfig(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<HarnessConfig> {
    let cfg: HarnessConfig = serde_yaml::from_str(s)
        .map_err(|e| HarnessError::InvalidConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
