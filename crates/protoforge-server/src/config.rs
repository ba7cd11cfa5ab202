// Server configuration from the environment
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;
use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::CorsLayer;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_PUBLIC_DIR: &str = "./public";

/// Origins allowed when `PROTOFORGE_CORS_ORIGINS` is unset.
const DEV_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:3001",
    "http://localhost:5173", // Vite default
    "http://127.0.0.1:3000",
    "http://127.0.0.1:3001",
    "http://127.0.0.1:5173",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub public_dir: PathBuf,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: DEFAULT_PORT,
            public_dir: PathBuf::from(DEFAULT_PUBLIC_DIR),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; missing keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = lookup("PROTOFORGE_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let host: IpAddr = host
            .parse()
            .with_context(|| format!("PROTOFORGE_HOST is not an IP address: {host}"))?;

        let port = match lookup("PROTOFORGE_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("PROTOFORGE_PORT is not a port number: {raw}"))?,
            None => DEFAULT_PORT,
        };

        let public_dir = lookup("PROTOFORGE_PUBLIC_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PUBLIC_DIR.to_string());

        let cors_origins = lookup("PROTOFORGE_CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host,
            port,
            public_dir: PathBuf::from(public_dir),
            cors_origins,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// CORS for the configured origins, or the local dev servers when none are
/// configured. `X-Total-Count` is exposed for the CRUD grid's pager.
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = if origins.is_empty() {
        DEV_ORIGINS.iter().map(|o| HeaderValue::from_static(o)).collect()
    } else {
        origins.iter().filter_map(|o| o.parse().ok()).collect()
    };
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE])
        .expose_headers([HeaderName::from_static("x-total-count")])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.addr().to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn reads_every_variable() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PROTOFORGE_HOST", "0.0.0.0"),
            ("PROTOFORGE_PORT", "8088"),
            ("PROTOFORGE_PUBLIC_DIR", "/srv/projects"),
            ("PROTOFORGE_CORS_ORIGINS", "http://a.test, ,http://b.test"),
        ]))
        .unwrap();
        assert_eq!(config.addr().to_string(), "0.0.0.0:8088");
        assert_eq!(config.public_dir, PathBuf::from("/srv/projects"));
        assert_eq!(config.cors_origins, ["http://a.test", "http://b.test"]);
    }

    #[test]
    fn bad_values_are_errors() {
        assert!(ServerConfig::from_lookup(lookup(&[("PROTOFORGE_PORT", "eighty")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("PROTOFORGE_HOST", "local host")])).is_err());
    }
}
