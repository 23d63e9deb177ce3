use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub assets_dir: PathBuf,
    pub refresh_interval: Duration,
    pub alarm_poll_autostart: bool,
    pub viewport_width_px: u32,
    pub viewport_height_px: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: 3000,
            assets_dir: PathBuf::from("assets"),
            refresh_interval: Duration::from_millis(3000),
            alarm_poll_autostart: true,
            viewport_width_px: 1024,
            viewport_height_px: 768,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServerConfig::default();

        let port = parse_or(&lookup, "PORT", defaults.port)?;
        let assets_dir = lookup("ASSETS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.assets_dir);
        let refresh_ms: u64 = parse_or(
            &lookup,
            "REFRESH_INTERVAL_MS",
            defaults.refresh_interval.as_millis() as u64,
        )?;
        if refresh_ms == 0 {
            return Err("REFRESH_INTERVAL_MS must be greater than zero".to_string());
        }
        let alarm_poll_autostart = match lookup("ALARM_POLL_AUTOSTART") {
            Some(v) => parse_flag(&v)
                .ok_or_else(|| format!("Invalid ALARM_POLL_AUTOSTART value: {}", v))?,
            None => defaults.alarm_poll_autostart,
        };
        let viewport_width_px = parse_or(&lookup, "VIEWPORT_WIDTH_PX", defaults.viewport_width_px)?;
        let viewport_height_px =
            parse_or(&lookup, "VIEWPORT_HEIGHT_PX", defaults.viewport_height_px)?;

        Ok(ServerConfig {
            port,
            assets_dir,
            refresh_interval: Duration::from_millis(refresh_ms),
            alarm_poll_autostart,
            viewport_width_px,
            viewport_height_px,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, String>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("Invalid {} value {:?}: {}", key, raw, e)),
        None => Ok(default),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
