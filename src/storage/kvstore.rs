//! Хранилище ключ-значение для RustKV
//!
//! Ядро конкурентности рассматривает хранилище как внешнего участника:
//! атомарные get/put/remove по отдельным ключам, без кэширования.
//! Межоперационная согласованность обеспечивается только протоколом
//! блокировок.

use crate::common::{Error, Key, Result, Value};
use std::collections::HashMap;
use std::sync::RwLock;

/// Контракт хранилища, потребляемый обработчиком транзакций
pub trait KvStore: Send + Sync {
    /// Возвращает значение по ключу или None, если ключ отсутствует
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Записывает значение по ключу (вставка или обновление)
    fn put(&self, key: &str, value: Value) -> Result<()>;

    /// Удаляет ключ из хранилища
    ///
    /// Используется при откате: отмена первой записи ключа должна
    /// восстановить его отсутствие.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Хранилище ключ-значение в оперативной памяти
pub struct InMemoryKvStore {
    /// Данные хранилища
    data: RwLock<HashMap<Key, Value>>,
}

impl InMemoryKvStore {
    /// Создает новое пустое хранилище
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Возвращает количество ключей в хранилище
    pub fn len(&self) -> Result<usize> {
        let data = self
            .data
            .read()
            .map_err(|_| Error::internal("Failed to acquire read lock on store".to_string()))?;
        Ok(data.len())
    }

    /// Проверяет, пусто ли хранилище
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for InMemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let data = self
            .data
            .read()
            .map_err(|_| Error::internal("Failed to acquire read lock on store".to_string()))?;
        Ok(data.get(key).cloned())
    }

    fn put(&self, key: &str, value: Value) -> Result<()> {
        let mut data = self
            .data
            .write()
            .map_err(|_| Error::internal("Failed to acquire write lock on store".to_string()))?;
        data.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut data = self
            .data
            .write()
            .map_err(|_| Error::internal("Failed to acquire write lock on store".to_string()))?;
        data.remove(key);
        Ok(())
    }
}
