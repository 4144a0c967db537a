use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::html::RenderConfig;
use crate::transport::TransportConfig;

const DEFAULT_ENV_PREFIX: &str = "FEDIREAD";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub render: RenderSection,
    #[serde(default)]
    pub http: HttpSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderSection {
    #[serde(default = "default_width")]
    pub width: usize,
    #[serde(default = "default_mention_symbol")]
    pub mention_symbol: String,
    #[serde(default = "default_hashtag_symbol")]
    pub hashtag_symbol: String,
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            width: default_width(),
            mention_symbol: default_mention_symbol(),
            hashtag_symbol: default_hashtag_symbol(),
        }
    }
}

impl RenderSection {
    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            mention_symbol: self.mention_symbol.clone(),
            hashtag_symbol: self.hashtag_symbol.clone(),
        }
    }
}

fn default_width() -> usize {
    80
}

fn default_mention_symbol() -> String {
    "@".into()
}

fn default_hashtag_symbol() -> String {
    "#".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpSection {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

impl HttpSection {
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            user_agent: self.user_agent.clone(),
            timeout: self.timeout,
        }
    }
}

fn default_user_agent() -> String {
    format!("fediread/{}", crate::VERSION)
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        let from_file = read_config_file(path)?;
        cfg = merge_config(cfg, from_file);
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    base.render.width = other.render.width;
    if !other.render.mention_symbol.is_empty() {
        base.render.mention_symbol = other.render.mention_symbol;
    }
    if !other.render.hashtag_symbol.is_empty() {
        base.render.hashtag_symbol = other.render.hashtag_symbol;
    }

    if !other.http.user_agent.trim().is_empty() {
        base.http.user_agent = other.http.user_agent;
    }
    if !other.http.timeout.is_zero() {
        base.http.timeout = other.http.timeout;
    }

    base
}

fn apply_env(cfg: &mut Config, prefix: &str) {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "render.width" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.render.width = parsed;
            }
        }
        "render.mention_symbol" if !value.is_empty() => cfg.render.mention_symbol = value,
        "render.hashtag_symbol" if !value.is_empty() => cfg.render.hashtag_symbol = value,
        "http.user_agent" if !value.trim().is_empty() => cfg.http.user_agent = value,
        "http.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.http.timeout = duration;
            }
        }
        _ => {}
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fediread").join("config.yaml"))
}
