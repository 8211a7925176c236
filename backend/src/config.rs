use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use heroforge_shared::rate_limit::{RateLimitConfig, API_MAX_REQUESTS, API_WINDOW};
use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_UPLOAD_DIR: &str = "static/uploads";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_POLLINATIONS_BASE_URL: &str = "https://image.pollinations.ai/prompt";
pub const DEFAULT_POLLINATIONS_MODEL: &str = "kontext";
pub const DEFAULT_LOCAL_INFERENCE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_LOCAL_INFERENCE_MODEL: &str = "flux-kontext";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    Pollinations { base_url: String, model: String },
    Local { base_url: String, model: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub upload_dir: PathBuf,
    pub public_base_url: String,
    pub backend: BackendKind,
    pub rate_limit: RateLimitConfig,
    pub allow_insecure_image_urls: bool,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source, so tests need not touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let bind_addr = parse("BIND_ADDR", &var("BIND_ADDR", DEFAULT_BIND_ADDR))?;

        let backend = match var("IMAGE_BACKEND", "pollinations").to_ascii_lowercase().as_str() {
            "pollinations" => BackendKind::Pollinations {
                base_url: var("POLLINATIONS_BASE_URL", DEFAULT_POLLINATIONS_BASE_URL),
                model: var("POLLINATIONS_MODEL", DEFAULT_POLLINATIONS_MODEL),
            },
            "local" => BackendKind::Local {
                base_url: var("LOCAL_INFERENCE_URL", DEFAULT_LOCAL_INFERENCE_URL),
                model: var("LOCAL_INFERENCE_MODEL", DEFAULT_LOCAL_INFERENCE_MODEL),
            },
            other => {
                return Err(ConfigError::Invalid {
                    name: "IMAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let max_requests = match lookup("RATE_LIMIT_MAX_REQUESTS") {
            Some(raw) => parse_positive("RATE_LIMIT_MAX_REQUESTS", &raw)?,
            None => API_MAX_REQUESTS,
        };
        // A zero window resets on every check and would disable limiting
        let window = match lookup("RATE_LIMIT_WINDOW_SECS") {
            Some(raw) => Duration::from_secs(parse_positive::<u64>("RATE_LIMIT_WINDOW_SECS", &raw)?),
            None => API_WINDOW,
        };

        let allow_insecure_image_urls = match lookup("ALLOW_INSECURE_IMAGE_URLS") {
            Some(raw) => parse_flag("ALLOW_INSECURE_IMAGE_URLS", &raw)?,
            None => false,
        };

        let cors_origins = var("CORS_ORIGINS", DEFAULT_PUBLIC_BASE_URL)
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            bind_addr,
            upload_dir: PathBuf::from(var("UPLOAD_DIR", DEFAULT_UPLOAD_DIR)),
            public_base_url: var("PUBLIC_BASE_URL", DEFAULT_PUBLIC_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            backend,
            rate_limit: RateLimitConfig::new(max_requests, window),
            allow_insecure_image_urls,
            cors_origins,
        })
    }
}

fn parse<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}

fn parse_positive<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr + Default + PartialEq,
{
    let value: T = parse(name, raw)?;
    if value == T::default() {
        return Err(ConfigError::Invalid {
            name,
            value: raw.to_string(),
        });
    }
    Ok(value)
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw.to_string(),
        }),
    }
}
