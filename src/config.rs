//! Configuration management
//!
//! Loads configuration from config.toml with support for:
//! - Server binding settings
//! - SQLite database location
//! - Reputation point magnitudes for community actions

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub reputation: ReputationConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration (COUNCIL_DB env var takes precedence)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub path: Option<String>,
}

/// Named reputation point magnitudes. Grants and revocations use the same
/// magnitude so lifecycle hooks always net to zero when reversed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReputationConfig {
    pub thread_published: i64,
    pub reply_posted: i64,
    pub best_answer_awarded: i64,
}

/// Community actions that carry a configured point value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReputationAction {
    ThreadPublished,
    ReplyPosted,
    BestAnswerAwarded,
}

impl ReputationConfig {
    /// Resolve a named action to its point magnitude.
    pub fn points(&self, action: ReputationAction) -> i64 {
        match action {
            ReputationAction::ThreadPublished => self.thread_published,
            ReputationAction::ReplyPosted => self.reply_posted,
            ReputationAction::BestAnswerAwarded => self.best_answer_awarded,
        }
    }
}

impl Config {
    /// Load from config.toml or use defaults
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load from specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            // Use embedded default config
            toml::from_str(DEFAULT_CONFIG).context("Failed to parse default config")
        }
    }

    /// Resolve the database path (env var takes precedence over config)
    pub fn database_path(&self) -> String {
        match std::env::var("COUNCIL_DB") {
            Ok(path) if !path.is_empty() => path,
            _ => self
                .database
                .path
                .clone()
                .unwrap_or_else(|| "council.db".to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        // The embedded default config is validated at compile time,
        // so this should never fail. Using a fallback for robustness.
        toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|_| Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig::default(),
            reputation: ReputationConfig {
                thread_published: 10,
                reply_posted: 2,
                best_answer_awarded: 50,
            },
        })
    }
}
