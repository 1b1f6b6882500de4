use std::net::SocketAddr;

use serde::Deserialize;
use reqlens_core::config::MonitorConfig;
use reqlens_core::error::{MonitorError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            monitor: MonitorConfig::default()
                .with_metric_path("/metrics")
                .with_exclude_paths(["/healthz"]),
        }
    }
}

impl FileConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MonitorError::Config(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        self.server.validate()?;
        self.monitor.validate()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr().map(|_| ())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            MonitorError::Config(format!("server.listen must be a valid SocketAddr: {e}"))
        })
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
