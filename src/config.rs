// src/config.rs
//! Unified configuration management - one place loads every env-driven
//! setting the server needs.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ConfigManager {
    pub environment: EnvironmentConfig,
    pub service: ServiceConfig,
}

#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub data_path: PathBuf,
    pub database_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub ai_service_url: String,
    pub timeout_seconds: u64,
}

impl ConfigManager {
    pub fn load() -> Result<Self> {
        let environment = Self::load_environment()?;
        let service = Self::load_service();

        Ok(Self {
            environment,
            service,
        })
    }

    fn load_environment() -> Result<EnvironmentConfig> {
        let env = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "local".to_string());
        info!("Loading environment configuration for: {}", env);

        let base_dir = if env == "production" {
            PathBuf::from("/app")
        } else {
            std::env::current_dir().context("Failed to get current directory")?
        };

        Ok(EnvironmentConfig {
            data_path: base_dir.join("data"),
            database_path: base_dir.join("intervue.db"),
        })
    }

    fn load_service() -> ServiceConfig {
        let ai_service_url = std::env::var("AI_SERVICE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:5555".to_string());
        let timeout_seconds = std::env::var("AI_SERVICE_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        ServiceConfig {
            ai_service_url,
            timeout_seconds,
        }
    }

    pub async fn ensure_directories(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.environment.data_path)
            .await
            .context("Failed to create data directory")?;
        if let Some(db_parent) = self.environment.database_path.parent() {
            tokio::fs::create_dir_all(db_parent)
                .await
                .context("Failed to create database directory")?;
        }
        Ok(())
    }
}
