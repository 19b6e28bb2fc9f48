//! Обработка ошибок для RustKV

use thiserror::Error;

/// Основной тип ошибки для RustKV
#[derive(Error, Debug)]
pub enum Error {
    /// Ошибка I/O операций
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка блокировки
    #[error("Lock error: {message}")]
    Lock { message: String },

    /// Ошибка транзакции
    #[error("Transaction error: {message}")]
    Transaction { message: String },

    /// Ошибка конфигурации
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Внутренняя ошибка
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Тип результата для RustKV
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Создает ошибку блокировки
    pub fn lock(message: impl Into<String>) -> Self {
        Self::Lock {
            message: message.into(),
        }
    }

    /// Создает ошибку транзакции
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Создает ошибку конфигурации
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Создает внутреннюю ошибку
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
