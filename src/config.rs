//! Application configuration resolved from the environment.

use anyhow::Result;
use std::fmt;
use std::str::FromStr;

use crate::runtime::Runtime;

pub const DEFAULT_API_BASE_URL: &str = "https://eight3compass-test.onrender.com/api/v1";
pub const DEFAULT_APP_NAME: &str = "Frontend Interview";

pub const API_BASE_URL_ENV: &str = "EVREG_API_BASE_URL";
pub const APP_NAME_ENV: &str = "EVREG_APP_NAME";
pub const APP_ENV_ENV: &str = "EVREG_APP_ENV";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    #[default]
    Development,
    Staging,
    Production,
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppEnv::Development => write!(f, "development"),
            AppEnv::Staging => write!(f, "staging"),
            AppEnv::Production => write!(f, "production"),
        }
    }
}

impl FromStr for AppEnv {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" => Ok(AppEnv::Development),
            "staging" => Ok(AppEnv::Staging),
            "production" => Ok(AppEnv::Production),
            _ => anyhow::bail!(
                "Unknown app environment: {}. Expected development, staging, or production.",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api_base_url: String,
    pub app_name: String,
    pub app_env: AppEnv,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            app_name: DEFAULT_APP_NAME.to_string(),
            app_env: AppEnv::default(),
        }
    }
}

impl AppConfig {
    /// Reads overrides from the environment. Empty variables count as unset.
    pub fn from_env<R: Runtime + ?Sized>(runtime: &R) -> Result<Self> {
        let var = |key: &str| runtime.env_var(key).ok().filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let app_env = match var(APP_ENV_ENV) {
            Some(value) => value.parse()?,
            None => defaults.app_env,
        };

        Ok(Self {
            api_base_url: var(API_BASE_URL_ENV).unwrap_or(defaults.api_base_url),
            app_name: var(APP_NAME_ENV).unwrap_or(defaults.app_name),
            app_env,
        })
    }
}
