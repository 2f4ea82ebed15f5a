use std::env;

use tracing::warn;

use crate::core::{Quality, ALLOWED_MIME_TYPES};

pub const DEFAULT_PORT: u16 = 7070;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_QUALITY: u8 = 80;
pub const DEFAULT_ALLOW_ORIGIN: &str = "http://localhost:8080";

/// Process-wide settings, built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub max_file_size: u64,
    pub default_quality: Quality,
    pub allowed_origin: String,
    pub allowed_mime_types: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            default_quality: Quality::clamped(DEFAULT_QUALITY as i64),
            allowed_origin: DEFAULT_ALLOW_ORIGIN.to_string(),
            allowed_mime_types: ALLOWED_MIME_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Empty values count as unset. Values that fail to parse fall back to
    /// the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = ServiceConfig::default();

        let host = get("HOST").unwrap_or(defaults.host);
        let allowed_origin = get("ALLOW_ORIGIN").unwrap_or(defaults.allowed_origin);
        let port = parse_or("PORT", get("PORT"), defaults.port);
        let max_file_size = parse_or("MAX_FILE_SIZE", get("MAX_FILE_SIZE"), defaults.max_file_size);

        let default_quality = match get("DEFAULT_QUALITY") {
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(v) => {
                    let q = Quality::clamped(v);
                    if i64::from(q.get()) != v {
                        warn!(value = v, clamped = q.get(), "DEFAULT_QUALITY out of range");
                    }
                    q
                }
                Err(e) => {
                    warn!(value = %raw, "invalid DEFAULT_QUALITY, using default: {e}");
                    defaults.default_quality
                }
            },
            None => defaults.default_quality,
        };

        ServiceConfig {
            host,
            port,
            max_file_size,
            default_quality,
            allowed_origin,
            allowed_mime_types: defaults.allowed_mime_types,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parameters after `;` are ignored, so `text/html; charset=utf-8`
    /// compares as `text/html`.
    pub fn is_allowed_mime_type(&self, mime_type: &str) -> bool {
        let normalized = mime_type.split(';').next().unwrap_or(mime_type).trim();
        self.allowed_mime_types.iter().any(|allowed| allowed == normalized)
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|e| {
            warn!(value = %raw, "invalid {key}, using default: {e}");
            default
        }),
        None => default,
    }
}
