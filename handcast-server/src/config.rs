//! Load config from file and environment.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::server::ServerOptions;

/// Daemon configuration. File: ~/.config/handcast/config.toml or
/// /etc/handcast/config.toml. Env overrides: HANDCAST_BIND, HANDCAST_PORT,
/// HANDCAST_FRAME_RATE, HANDCAST_WITH_IMAGE.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Listen address (default 0.0.0.0).
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Listen port (default 5555).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Target publish rate in frames per second (default 60).
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    /// Stream pose+image frames instead of pose-only (default false).
    #[serde(default)]
    pub with_image: bool,
    /// Per-connection send queue depth; a consumer that falls this many
    /// frames behind is disconnected (default 32).
    #[serde(default = "default_max_queued_frames")]
    pub max_queued_frames: usize,
    /// Per-write timeout in milliseconds (default 1000).
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    /// Accept bounded-wait interval in milliseconds (default 1000).
    #[serde(default = "default_accept_timeout_ms")]
    pub accept_timeout_ms: u64,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5555
}
fn default_frame_rate() -> u32 {
    60
}
fn default_max_queued_frames() -> usize {
    32
}
fn default_write_timeout_ms() -> u64 {
    1000
}
fn default_accept_timeout_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            frame_rate: default_frame_rate(),
            with_image: false,
            max_queued_frames: default_max_queued_frames(),
            write_timeout_ms: default_write_timeout_ms(),
            accept_timeout_ms: default_accept_timeout_ms(),
        }
    }
}

impl Config {
    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            max_queued_frames: self.max_queued_frames,
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            accept_timeout: Duration::from_millis(self.accept_timeout_ms),
        }
    }
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    if let Ok(s) = std::env::var("HANDCAST_BIND") {
        c.bind = s;
    }
    if let Ok(s) = std::env::var("HANDCAST_PORT") {
        if let Ok(p) = s.parse::<u16>() {
            c.port = p;
        }
    }
    if let Ok(s) = std::env::var("HANDCAST_FRAME_RATE") {
        if let Ok(r) = s.parse::<u32>() {
            c.frame_rate = r;
        }
    }
    if let Ok(s) = std::env::var("HANDCAST_WITH_IMAGE") {
        if let Ok(b) = s.parse::<bool>() {
            c.with_image = b;
        }
    }
    c
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/handcast/config.toml"));
    }
    out.push(PathBuf::from("/etc/handcast/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    for p in config_paths() {
        if p.exists() {
            if let Ok(s) = std::fs::read_to_string(&p) {
                if let Ok(c) = toml::from_str::<Config>(&s) {
                    return Some(c);
                }
            }
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let c: Config = toml::from_str("").unwrap();
        assert_eq!(c.port, 5555);
        assert_eq!(c.bind, "0.0.0.0");
        assert_eq!(c.frame_rate, 60);
        assert!(!c.with_image);
    }

    #[test]
    fn partial_file_overrides() {
        let c: Config = toml::from_str("port = 6000\nwith_image = true").unwrap();
        assert_eq!(c.port, 6000);
        assert!(c.with_image);
        assert_eq!(c.max_queued_frames, 32);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(toml::from_str::<Config>("camera_index = 1").is_err());
    }
}
