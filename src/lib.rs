//! RustKV - транзакционное key-value хранилище на Rust
//!
//! Этот модуль предоставляет ядро управления конкурентностью для
//! однонодового транзакционного key-value хранилища: таблицу блокировок
//! с двухфазным блокированием (2PL), обработчики транзакций с журналом
//! отката и координатор обнаружения взаимоблокировок.

pub mod common;
pub mod core;
pub mod storage;

pub use common::error::{Error, Result};
pub use common::types::*;

use crate::common::config::DatabaseConfig;
use crate::core::{DeadlockCoordinator, LockTable, TransactionHandler, TransactionId};
use crate::storage::{InMemoryKvStore, KvStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Версия библиотеки
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Основная структура базы данных
///
/// Владеет общей таблицей блокировок, хранилищем и координатором;
/// выдает обработчики транзакций с уникальными идентификаторами.
/// Обработчиками управляет внешний драйвер: он опрашивает заблокированные
/// транзакции через `check_lock` и периодически вызывает
/// `detect_deadlocks`, отменяя названную транзакцию.
pub struct Database {
    /// Конфигурация базы данных
    config: DatabaseConfig,
    /// Общая таблица блокировок
    lock_table: Arc<LockTable>,
    /// Хранилище ключ-значение
    store: Arc<dyn KvStore>,
    /// Координатор обнаружения взаимоблокировок
    coordinator: DeadlockCoordinator,
    /// Счетчик для генерации уникальных ID транзакций
    next_transaction_id: AtomicU64,
}

impl Database {
    /// Создает новую базу данных с конфигурацией по умолчанию
    pub fn new() -> Result<Self> {
        Self::with_config(DatabaseConfig::default())
    }

    /// Создает новую базу данных с заданной конфигурацией
    pub fn with_config(config: DatabaseConfig) -> Result<Self> {
        Self::with_store(config, Arc::new(InMemoryKvStore::new()))
    }

    /// Создает новую базу данных поверх внешнего хранилища
    pub fn with_store(config: DatabaseConfig, store: Arc<dyn KvStore>) -> Result<Self> {
        config.validate()?;

        let lock_table = Arc::new(LockTable::new());
        let coordinator = DeadlockCoordinator::new(Arc::clone(&lock_table));

        Ok(Self {
            config,
            lock_table,
            store,
            coordinator,
            next_transaction_id: AtomicU64::new(1),
        })
    }

    /// Получает конфигурацию базы данных
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Возвращает общую таблицу блокировок
    pub fn lock_table(&self) -> Arc<LockTable> {
        Arc::clone(&self.lock_table)
    }

    /// Возвращает хранилище ключ-значение
    pub fn store(&self) -> Arc<dyn KvStore> {
        Arc::clone(&self.store)
    }

    /// Начинает новую транзакцию
    pub fn begin_transaction(&self) -> Result<TransactionHandler> {
        let xid = TransactionId::new(self.next_transaction_id.fetch_add(1, Ordering::SeqCst));
        log::debug!("{} started", xid);
        Ok(TransactionHandler::new(
            xid,
            Arc::clone(&self.lock_table),
            Arc::clone(&self.store),
        ))
    }

    /// Обнаруживает взаимоблокировку
    ///
    /// Возвращает идентификатор транзакции, которую драйвер должен
    /// отменить с `AbortMode::Deadlock`, или None, если циклов нет.
    pub fn detect_deadlocks(&self) -> Result<Option<TransactionId>> {
        self.coordinator.detect_deadlocks()
    }
}
