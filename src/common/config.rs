//! Конфигурация для RustKV
//!
//! Предоставляет структуры конфигурации для ядра и внешнего драйвера

use crate::common::constants::*;
use crate::common::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Основная конфигурация базы данных
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Имя базы данных
    pub name: String,
    /// Интервал опроса заблокированных транзакций (в миллисекундах)
    pub lock_poll_interval_ms: u64,
    /// Интервал обнаружения взаимоблокировок (в миллисекундах)
    pub deadlock_detection_interval_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: "rustkv".to_string(),
            lock_poll_interval_ms: DEFAULT_LOCK_POLL_INTERVAL_MS,
            deadlock_detection_interval_ms: DEFAULT_DEADLOCK_DETECTION_INTERVAL_MS,
        }
    }
}

impl DatabaseConfig {
    /// Загружает конфигурацию из TOML файла
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DatabaseConfig = toml::from_str(&content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Сохраняет конфигурацию в TOML файл
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::configuration(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Загружает конфигурацию из переменных окружения
    pub fn from_env() -> Result<Self> {
        let mut config = DatabaseConfig::default();

        if let Ok(name) = std::env::var("RUSTKV_NAME") {
            config.name = name;
        }

        if let Ok(interval) = std::env::var("RUSTKV_LOCK_POLL_INTERVAL_MS") {
            config.lock_poll_interval_ms = interval
                .parse()
                .map_err(|_| Error::configuration("RUSTKV_LOCK_POLL_INTERVAL_MS is not a number"))?;
        }

        if let Ok(interval) = std::env::var("RUSTKV_DEADLOCK_DETECTION_INTERVAL_MS") {
            config.deadlock_detection_interval_ms = interval.parse().map_err(|_| {
                Error::configuration("RUSTKV_DEADLOCK_DETECTION_INTERVAL_MS is not a number")
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Валидирует конфигурацию
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::configuration("Database name cannot be empty"));
        }

        if self.lock_poll_interval_ms == 0 || self.lock_poll_interval_ms > MAX_LOCK_POLL_INTERVAL_MS
        {
            return Err(Error::configuration(format!(
                "Lock poll interval must be in range 1..={} ms",
                MAX_LOCK_POLL_INTERVAL_MS
            )));
        }

        if self.deadlock_detection_interval_ms == 0
            || self.deadlock_detection_interval_ms > MAX_DEADLOCK_DETECTION_INTERVAL_MS
        {
            return Err(Error::configuration(format!(
                "Deadlock detection interval must be in range 1..={} ms",
                MAX_DEADLOCK_DETECTION_INTERVAL_MS
            )));
        }

        Ok(())
    }

    /// Интервал опроса заблокированных транзакций
    pub fn lock_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lock_poll_interval_ms)
    }

    /// Интервал обнаружения взаимоблокировок
    pub fn deadlock_detection_interval(&self) -> Duration {
        Duration::from_millis(self.deadlock_detection_interval_ms)
    }
}
