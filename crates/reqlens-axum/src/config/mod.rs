//! Config file loader (strict parsing).

pub mod schema;

use std::fs;

use reqlens_core::error::{MonitorError, Result};

pub use reqlens_core::config::{MonitorConfig, UniqueVisitorConfig};
pub use schema::{FileConfig, ServerSection};

pub fn load_from_file(path: &str) -> Result<FileConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| MonitorError::Config(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<FileConfig> {
    let cfg: FileConfig = serde_yaml::from_str(s)
        .map_err(|e| MonitorError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
