use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(alias = "API_BASE_URL", alias = "api_base_url")]
    pub api_base_url: String,
    #[serde(alias = "BIND_ADDR", alias = "bind_addr", default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(
        alias = "REQUEST_TIMEOUT_SECS",
        alias = "request_timeout_secs",
        default = "default_request_timeout_secs"
    )]
    pub request_timeout_secs: u64,
    #[serde(alias = "TOP_LIMIT", alias = "top_limit", default = "default_top_limit")]
    pub top_limit: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_top_limit() -> usize {
    10
}

impl Config {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("некорректный JSON конфигурации")
    }

    /// Загружает конфигурацию из файла `CONFIG_PATH` (по умолчанию `config.json`).
    /// Если файла нет — собирает конфигурацию из переменных окружения.
    pub fn load() -> Result<Self> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.json".to_string());
        match fs::read_to_string(&path) {
            Ok(raw) => {
                serde_json::from_str(&raw).with_context(|| format!("некорректный JSON: {}", path))
            }
            Err(_) => Self::from_env(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_base_url = std::env::var("API_BASE_URL")
            .context("не задан API_BASE_URL (ни в config.json, ни в окружении)")?;
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| default_bind_addr());
        let request_timeout_secs = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(default_request_timeout_secs);
        let top_limit = std::env::var("TOP_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(default_top_limit);
        Ok(Self {
            api_base_url,
            bind_addr,
            request_timeout_secs,
            top_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_env_style_keys() {
        let cfg = Config::from_json_str(
            r#"{"API_BASE_URL": "https://api.example.org/v1/", "TOP_LIMIT": 5}"#,
        )
        .unwrap();
        assert_eq!(cfg.api_base_url, "https://api.example.org/v1/");
        assert_eq!(cfg.top_limit, 5);
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080");
        assert_eq!(cfg.request_timeout_secs, 15);
    }

    #[test]
    fn parses_lowercase_keys() {
        let cfg = Config::from_json_str(
            r#"{"api_base_url": "http://localhost:3000", "bind_addr": "127.0.0.1:9000"}"#,
        )
        .unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
    }

    #[test]
    fn rejects_config_without_base_url() {
        assert!(Config::from_json_str("{}").is_err());
    }
}
