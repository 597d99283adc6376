use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::render::RenderTimings;

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Browser binary; `None` lets chromiumoxide find one on the system.
    pub chrome_executable: Option<PathBuf>,
    pub timings: RenderTimings,
    pub max_concurrent_renders: usize,
    pub resume_trailing_buffers: HashMap<String, f64>,
    pub cover_letter_trailing_buffers: HashMap<String, f64>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = RenderTimings::default();
        let timings = RenderTimings {
            launch_timeout: env_secs("BROWSER_LAUNCH_TIMEOUT_SECS", defaults.launch_timeout)?,
            page_timeout: env_secs("RENDER_PAGE_TIMEOUT_SECS", defaults.page_timeout)?,
            font_ready_timeout: env_secs("FONT_READY_TIMEOUT_SECS", defaults.font_ready_timeout)?,
            measure_timeout: env_secs("MEASURE_TIMEOUT_SECS", defaults.measure_timeout)?,
            font_settle: env_millis("FONT_SETTLE_MS", defaults.font_settle)?,
            font_fallback: env_millis("FONT_FALLBACK_MS", defaults.font_fallback)?,
            network_idle: env_millis("NETWORK_IDLE_MS", defaults.network_idle)?,
        };

        Ok(Config {
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            chrome_executable: std::env::var_os("CHROME_EXECUTABLE").map(PathBuf::from),
            timings,
            max_concurrent_renders: env_or("MAX_CONCURRENT_RENDERS", 4)?,
            resume_trailing_buffers: env_buffers("RESUME_TRAILING_BUFFERS")?,
            cover_letter_trailing_buffers: env_buffers("COVER_LETTER_TRAILING_BUFFERS")?,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid {}", std::any::type_name::<T>())),
        Err(_) => Ok(default),
    }
}

fn env_secs(key: &str, default: Duration) -> Result<Duration> {
    env_or(key, default.as_secs()).map(Duration::from_secs)
}

fn env_millis(key: &str, default: Duration) -> Result<Duration> {
    env_or(key, default.as_millis() as u64).map(Duration::from_millis)
}

fn env_buffers(key: &str) -> Result<HashMap<String, f64>> {
    match std::env::var(key) {
        Ok(raw) => parse_trailing_buffers(&raw).with_context(|| format!("Invalid {key}")),
        Err(_) => Ok(HashMap::new()),
    }
}

/// Parses `template=inches,template=inches`. Empty input means no buffers.
pub fn parse_trailing_buffers(raw: &str) -> Result<HashMap<String, f64>> {
    let mut buffers = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (template_id, inches) = pair
            .split_once('=')
            .with_context(|| format!("expected template=inches, got '{pair}'"))?;
        let template_id = template_id.trim();
        if template_id.is_empty() {
            bail!("missing template id in '{pair}'");
        }
        let inches: f64 = inches
            .trim()
            .parse()
            .with_context(|| format!("buffer for '{template_id}' is not a number"))?;
        if !inches.is_finite() || inches < 0.0 {
            bail!("buffer for '{template_id}' must be a non-negative number of inches");
        }
        buffers.insert(template_id.to_string(), inches);
    }
    Ok(buffers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trailing_buffers() {
        let buffers = parse_trailing_buffers(" zenith=0.25, aether = 0 ,").unwrap();
        assert_eq!(buffers.len(), 2);
        assert_eq!(buffers["zenith"], 0.25);
        assert_eq!(buffers["aether"], 0.0);
    }

    #[test]
    fn test_parse_trailing_buffers_empty() {
        assert!(parse_trailing_buffers("").unwrap().is_empty());
        assert!(parse_trailing_buffers(" , ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_trailing_buffers_rejects_garbage() {
        assert!(parse_trailing_buffers("zenith").is_err());
        assert!(parse_trailing_buffers("=0.5").is_err());
        assert!(parse_trailing_buffers("zenith=wide").is_err());
        assert!(parse_trailing_buffers("zenith=-1").is_err());
        assert!(parse_trailing_buffers("zenith=NaN").is_err());
        assert!(parse_trailing_buffers("zenith=inf").is_err());
    }
}
