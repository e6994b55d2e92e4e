//! TOML file configuration structures.
//!
//! These structs directly map to the `oscfx-config.toml` file format. Every
//! section and key is optional.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub osc: OscConfig,
    pub hub: HubConfig,
    pub modules: ModulesConfig,
}

/// HTTP/WebSocket server section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8081").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8081)
}

/// OSC ingress section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OscConfig {
    /// UDP address to receive OSC packets on.
    #[serde(default = "default_osc_addr")]
    pub listen: SocketAddr,
    /// Largest datagram accepted, in bytes.
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            listen: default_osc_addr(),
            max_packet_size: default_max_packet_size(),
        }
    }
}

fn default_osc_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 57121)
}

fn default_max_packet_size() -> usize {
    65536
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionKind {
    #[default]
    LatestPerKey,
    Unbounded,
}

/// Broadcast hub section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default)]
    pub retention: RetentionKind,
    /// Cap on live keys when `retention = "latest_per_key"`.
    #[serde(default = "default_max_keys")]
    pub max_keys: usize,
    /// Egress queue capacity per channel.
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            retention: RetentionKind::default(),
            max_keys: default_max_keys(),
            channel_buffer: default_channel_buffer(),
        }
    }
}

fn default_max_keys() -> usize {
    oscfx_core::event_log::DEFAULT_MAX_KEYS
}

fn default_channel_buffer() -> usize {
    oscfx_core::events::DEFAULT_CHANNEL_BUFFER
}

/// Module defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// Effect used when a module is created without one.
    #[serde(default = "default_effect")]
    pub default_effect: String,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            default_effect: default_effect(),
        }
    }
}

fn default_effect() -> String {
    "Burst".to_string()
}
