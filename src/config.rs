//! Configuration types.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Default converter program, resolved through `PATH`.
pub const DEFAULT_CONVERTER_BIN: &str = "eml2pdf";

/// Default wall-clock ceiling for one converter run.
pub const DEFAULT_CONVERT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default request body cap (50 MiB); messages with attachments get large.
pub const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Gateway configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address the HTTP listener binds to.
    pub host: IpAddr,
    /// Port the HTTP listener binds to.
    pub port: u16,
    /// Converter program to invoke.
    pub converter_bin: PathBuf,
    /// Extra arguments placed before the tool arguments.
    pub converter_args: Vec<String>,
    /// Converter timeout.
    pub convert_timeout: Duration,
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
    /// Parent directory for per-request staging areas (system temp dir if None).
    pub staging_dir: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            converter_bin: PathBuf::from(DEFAULT_CONVERTER_BIN),
            converter_args: Vec::new(),
            convert_timeout: DEFAULT_CONVERT_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            staging_dir: None,
        }
    }
}

impl GatewayConfig {
    /// Build config from environment variables, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("HOST")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.host);

        let port: u16 = lookup("PORT")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.port);

        let converter_bin = lookup("EML2PDF_BIN")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.converter_bin);

        let converter_args: Vec<String> = lookup("EML2PDF_ARGS")
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let convert_timeout = lookup("EML2PDF_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.convert_timeout);

        let max_body_bytes = lookup("MAX_BODY_BYTES")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_body_bytes);

        let staging_dir = lookup("STAGING_DIR")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Self {
            host,
            port,
            converter_bin,
            converter_args,
            convert_timeout,
            max_body_bytes,
            staging_dir,
        }
    }

    /// Socket address for the HTTP listener.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
