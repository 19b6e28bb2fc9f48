//! Менеджер блокировок для RustKV
//!
//! Реализует систему блокировок с поддержкой Shared/Exclusive блокировок,
//! повышения блокировки (upgrade) и двухфазного блокирования (2PL).
//! Блокировка на ключ представляет собой чистый конечный автомат:
//! текущие владельцы, режим и FIFO очередь ожидающих запросов.

use crate::common::{Error, Key, Result};
use crate::core::transaction::TransactionId;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

/// Режим блокировки
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Разделяемая блокировка (Shared) - для чтения
    Shared,
    /// Исключительная блокировка (Exclusive) - для записи
    Exclusive,
}

impl LockMode {
    /// Проверяет совместимость режимов блокировки
    pub fn is_compatible(&self, other: &LockMode) -> bool {
        match (self, other) {
            // Shared блокировки совместимы между собой
            (LockMode::Shared, LockMode::Shared) => true,
            // Exclusive блокировки не совместимы ни с чем
            (LockMode::Exclusive, _) | (_, LockMode::Exclusive) => false,
        }
    }
}

impl std::fmt::Display for LockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockMode::Shared => write!(f, "SharedLock"),
            LockMode::Exclusive => write!(f, "ExclusiveLock"),
        }
    }
}

/// Запрос на блокировку в очереди ожидания
#[derive(Debug, Clone)]
pub struct LockRequest {
    /// Транзакция, запрашивающая блокировку
    pub transaction_id: TransactionId,
    /// Запрашиваемый режим блокировки
    pub mode: LockMode,
}

/// Блокировка одного ключа таблицы блокировок
///
/// Инварианты:
/// - режим Exclusive => ровно один владелец;
/// - владельцев нет => режим отсутствует;
/// - в очереди ожидания не более одной записи на транзакцию.
#[derive(Debug, Default)]
pub struct Lock {
    /// Текущие владельцы в порядке предоставления
    holders: Vec<TransactionId>,
    /// Текущий режим; None, если владельцев нет
    mode: Option<LockMode>,
    /// FIFO очередь ожидающих запросов
    wait_queue: VecDeque<LockRequest>,
}

impl Lock {
    /// Создает новую свободную блокировку
    pub fn new() -> Self {
        Self::default()
    }

    /// Запрашивает блокировку для транзакции
    ///
    /// Возвращает true, если запрос предоставлен немедленно. Иначе запрос
    /// ставится в очередь ожидания и возвращается false; при этом уже
    /// удерживаемая блокировка той же транзакции снимается: транзакция не
    /// может одновременно владеть и ожидать один ключ.
    pub fn request(&mut self, transaction_id: TransactionId, mode: LockMode) -> bool {
        if self.can_acquire(transaction_id, mode) {
            if !self.holders.contains(&transaction_id) {
                self.holders.push(transaction_id);
            }
            self.mode = Some(mode);
            true
        } else {
            if let Some(pos) = self.holders.iter().position(|&h| h == transaction_id) {
                self.holders.remove(pos);
            }
            self.enqueue(transaction_id, mode);
            false
        }
    }

    /// Проверяет, может ли запрос быть предоставлен немедленно
    pub fn can_acquire(&self, transaction_id: TransactionId, mode: LockMode) -> bool {
        if self.holders.is_empty() {
            return true;
        }
        match self.mode {
            // Exclusive удерживается: допустим только повторный запрос владельца
            Some(LockMode::Exclusive) => self.holders.contains(&transaction_id),
            Some(LockMode::Shared) => {
                if mode == LockMode::Shared {
                    // Shared совместим с Shared независимо от числа владельцев
                    true
                } else {
                    // Upgrade на месте: единственный владелец запрашивает Exclusive
                    self.holders.len() == 1 && self.holders[0] == transaction_id
                }
            }
            None => false,
        }
    }

    /// Возвращает самого раннего из текущих владельцев
    pub fn first_holder(&self) -> Option<TransactionId> {
        self.holders.first().copied()
    }

    /// Проверяет, что транзакция владеет блокировкой именно в режиме `mode`
    pub fn holds(&self, transaction_id: TransactionId, mode: LockMode) -> bool {
        self.holders.contains(&transaction_id) && self.mode == Some(mode)
    }

    /// Освобождает блокировку, удерживаемую транзакцией
    ///
    /// Если владельцев не осталось, режим сбрасывается и предоставляется
    /// ровно головной запрос очереди ожидания. Последующие запросы ждут
    /// следующего цикла освобождения: строгий FIFO вместо пропускной
    /// способности.
    pub fn release(&mut self, transaction_id: TransactionId) {
        if let Some(pos) = self.holders.iter().position(|&h| h == transaction_id) {
            self.holders.remove(pos);
        }

        if self.holders.is_empty() {
            self.mode = None;
            self.grant_next();
        }
    }

    /// Удаляет запрос транзакции из очереди ожидания
    ///
    /// Вызывается при завершении транзакции, которая все еще ожидает
    /// блокировку: освобожденный позже ключ не должен быть предоставлен
    /// завершенной транзакции.
    pub fn cancel_request(&mut self, transaction_id: TransactionId) {
        self.wait_queue
            .retain(|r| r.transaction_id != transaction_id);
    }

    /// Возвращает текущих владельцев в порядке предоставления
    pub fn holders(&self) -> &[TransactionId] {
        &self.holders
    }

    /// Возвращает текущий режим блокировки
    pub fn mode(&self) -> Option<LockMode> {
        self.mode
    }

    /// Возвращает ожидающие запросы в порядке поступления
    pub fn requests(&self) -> impl Iterator<Item = &LockRequest> {
        self.wait_queue.iter()
    }

    /// Возвращает длину очереди ожидания
    pub fn queue_len(&self) -> usize {
        self.wait_queue.len()
    }

    /// Ставит запрос в очередь ожидания
    ///
    /// Если у транзакции уже есть запись в очереди, ее режим обновляется
    /// на месте: не более одной записи на транзакцию.
    fn enqueue(&mut self, transaction_id: TransactionId, mode: LockMode) {
        if let Some(existing) = self
            .wait_queue
            .iter_mut()
            .find(|r| r.transaction_id == transaction_id)
        {
            if mode == LockMode::Exclusive {
                existing.mode = LockMode::Exclusive;
            }
            return;
        }

        self.wait_queue.push_back(LockRequest {
            transaction_id,
            mode,
        });
    }

    /// Предоставляет головной запрос очереди ожидания
    fn grant_next(&mut self) {
        if let Some(request) = self.wait_queue.pop_front() {
            self.holders.push(request.transaction_id);
            self.mode = Some(request.mode);
        }
    }
}

/// Таблица блокировок: отображение ключа на его блокировку
///
/// Разделяется всеми транзакциями и координатором. Записи создаются при
/// первом обращении к ключу и никогда не удаляются; освободившаяся
/// блокировка остается в таблице со сброшенным режимом. Мутации одной
/// блокировки сериализуются ее собственным мьютексом, блокировки разных
/// ключей изменяются независимо.
pub struct LockTable {
    /// Блокировки по ключам
    locks: RwLock<HashMap<Key, Arc<Mutex<Lock>>>>,
}

impl LockTable {
    /// Создает новую пустую таблицу блокировок
    pub fn new() -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Возвращает блокировку ключа, создавая ее при первом обращении
    pub fn lock_for(&self, key: &str) -> Result<Arc<Mutex<Lock>>> {
        {
            let locks = self.locks.read().map_err(|_| {
                Error::internal("Failed to acquire read lock on lock table".to_string())
            })?;
            if let Some(lock) = locks.get(key) {
                return Ok(Arc::clone(lock));
            }
        }

        let mut locks = self.locks.write().map_err(|_| {
            Error::internal("Failed to acquire write lock on lock table".to_string())
        })?;
        let lock = locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Lock::new())));
        Ok(Arc::clone(lock))
    }

    /// Возвращает блокировку ключа, если она уже существует
    pub fn get(&self, key: &str) -> Result<Option<Arc<Mutex<Lock>>>> {
        let locks = self
            .locks
            .read()
            .map_err(|_| Error::internal("Failed to acquire read lock on lock table".to_string()))?;
        Ok(locks.get(key).map(Arc::clone))
    }

    /// Возвращает все ключи таблицы блокировок
    pub fn keys(&self) -> Result<Vec<Key>> {
        let locks = self
            .locks
            .read()
            .map_err(|_| Error::internal("Failed to acquire read lock on lock table".to_string()))?;
        Ok(locks.keys().cloned().collect())
    }

    /// Возвращает количество ключей в таблице
    pub fn len(&self) -> Result<usize> {
        let locks = self
            .locks
            .read()
            .map_err(|_| Error::internal("Failed to acquire read lock on lock table".to_string()))?;
        Ok(locks.len())
    }

    /// Проверяет, пуста ли таблица блокировок
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}
