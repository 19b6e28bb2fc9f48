//! Обработчик транзакций для RustKV
//!
//! Реализует протокол запросов одной транзакции поверх таблицы блокировок
//! и внешнего хранилища: получение блокировок по дисциплине 2PL, журнал
//! отката для отмены изменений и возобновляемый отложенный запрос для
//! заблокированных операций. Ожидание представлено данными, а не
//! приостановкой потока: заблокированный запрос немедленно возвращает
//! сигнал блокировки, и внешний драйвер периодически вызывает
//! `check_lock` до успеха или принудительной отмены.

use crate::common::{Error, Key, Result, Value};
use crate::core::lock::{Lock, LockMode, LockTable};
use crate::storage::KvStore;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Уникальный идентификатор транзакции
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TXN{}", self.0)
    }
}

/// Состояния транзакции
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Транзакция активна и может выдавать запросы
    Active,
    /// Транзакция ожидает предоставления блокировки
    Blocked,
    /// Транзакция завершена фиксацией или отменой
    Terminated,
}

/// Причина отмены транзакции
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortMode {
    /// Отмена по запросу клиента
    User,
    /// Принудительная отмена координатором из-за взаимоблокировки
    Deadlock,
}

/// Отложенная операция, возобновляемая после предоставления блокировки
///
/// Помеченный вариант вместо замыкания: возобновляемая операция
/// инспектируема и не содержит скрытого захваченного состояния.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOperation {
    /// Отложенное чтение ключа
    Get {
        /// Ключ чтения
        key: Key,
    },
    /// Отложенная запись ключа
    Put {
        /// Ключ записи
        key: Key,
        /// Записываемое значение
        value: Value,
    },
}

/// Ожидаемая блокировка заблокированной транзакции
#[derive(Debug, Clone)]
pub struct DesiredLock {
    /// Ключ, на который ожидается блокировка
    pub key: Key,
    /// Запрошенный режим
    pub mode: LockMode,
    /// Операция, возобновляемая после предоставления
    pub operation: PendingOperation,
}

/// Результат операции транзакции
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Запись выполнена
    Success,
    /// Прочитанное значение
    Value(Value),
    /// Ключ отсутствует в хранилище
    NoSuchKey,
    /// Транзакция зафиксирована
    Completed,
    /// Транзакция отменена клиентом
    UserAbort,
    /// Транзакция отменена из-за взаимоблокировки
    DeadlockAbort,
}

impl std::fmt::Display for OperationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationResult::Success => write!(f, "Success"),
            OperationResult::Value(value) => write!(f, "{}", value),
            OperationResult::NoSuchKey => write!(f, "No such key"),
            OperationResult::Completed => write!(f, "Transaction Completed"),
            OperationResult::UserAbort => write!(f, "User Abort"),
            OperationResult::DeadlockAbort => write!(f, "Deadlock Abort"),
        }
    }
}

/// Обработчик запросов одной транзакции
///
/// `Ok(None)` из `perform_put`/`perform_get`/`check_lock` является сигналом
/// блокировки: запрос не может быть предоставлен сейчас и транзакция ждет.
/// Конфликт блокировок не считается ошибкой и никогда не попадает в `Err`.
pub struct TransactionHandler {
    /// Идентификатор транзакции
    xid: TransactionId,
    /// Общая таблица блокировок
    lock_table: Arc<LockTable>,
    /// Внешнее хранилище ключ-значение
    store: Arc<dyn KvStore>,
    /// Ключи, заблокированные этой транзакцией
    acquired_keys: HashSet<Key>,
    /// Журнал отката: пары (ключ, прежнее значение), None = ключ отсутствовал
    undo_log: Vec<(Key, Option<Value>)>,
    /// Ожидаемая блокировка, если транзакция заблокирована
    desired_lock: Option<DesiredLock>,
    /// Текущее состояние транзакции
    state: TransactionState,
}

impl TransactionHandler {
    /// Создает обработчик новой транзакции
    pub fn new(xid: TransactionId, lock_table: Arc<LockTable>, store: Arc<dyn KvStore>) -> Self {
        Self {
            xid,
            lock_table,
            store,
            acquired_keys: HashSet::new(),
            undo_log: Vec::new(),
            desired_lock: None,
            state: TransactionState::Active,
        }
    }

    /// Идентификатор транзакции
    pub fn xid(&self) -> TransactionId {
        self.xid
    }

    /// Текущее состояние транзакции
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Проверяет, ожидает ли транзакция блокировку
    pub fn is_blocked(&self) -> bool {
        self.state == TransactionState::Blocked
    }

    /// Ожидаемая блокировка, если транзакция заблокирована
    pub fn desired_lock(&self) -> Option<&DesiredLock> {
        self.desired_lock.as_ref()
    }

    /// Ключи, заблокированные этой транзакцией
    pub fn acquired_keys(&self) -> &HashSet<Key> {
        &self.acquired_keys
    }

    /// Обрабатывает запрос PUT
    ///
    /// Запрашивает Exclusive блокировку ключа. При предоставлении прежнее
    /// значение записывается в журнал отката, новое значение попадает в
    /// хранилище и возвращается `Success`. Иначе запрос сохраняется как
    /// ожидаемая блокировка и возвращается сигнал блокировки.
    pub fn perform_put(&mut self, key: &str, value: &str) -> Result<Option<OperationResult>> {
        self.ensure_can_request()?;
        self.do_put(key, value)
    }

    /// Обрабатывает запрос GET
    ///
    /// Тот же протокол получения блокировки с режимом Shared; чтения не
    /// попадают в журнал отката.
    pub fn perform_get(&mut self, key: &str) -> Result<Option<OperationResult>> {
        self.ensure_can_request()?;
        self.do_get(key)
    }

    /// Проверяет, предоставлена ли ожидаемая блокировка
    ///
    /// Ничего не делает, если транзакция не заблокирована. Если блокировка
    /// уже удерживается в запрошенном режиме, возобновляет отложенную
    /// операцию и возвращает ее результат; иначе возвращает `Ok(None)`, и
    /// внешний драйвер повторяет вызов позже.
    pub fn check_lock(&mut self) -> Result<Option<OperationResult>> {
        let desired = match &self.desired_lock {
            Some(desired) => desired.clone(),
            None => return Ok(None),
        };

        let lock = match self.lock_table.get(&desired.key)? {
            Some(lock) => lock,
            None => return Ok(None),
        };

        let held = self.locked(&lock)?.holds(self.xid, desired.mode);
        if !held {
            return Ok(None);
        }

        // Блокировка предоставлена: повторяем исходную операцию, теперь
        // запрос проходит по повторному/совместимому пути
        let result = match desired.operation {
            PendingOperation::Get { key } => self.do_get(&key)?,
            PendingOperation::Put { key, value } => self.do_put(&key, &value)?,
        };

        if result.is_some() {
            self.desired_lock = None;
            self.state = TransactionState::Active;
            log::debug!("{} resumed after waiting for {}", self.xid, desired.key);
        }

        Ok(result)
    }

    /// Фиксирует транзакцию
    ///
    /// Освобождает все блокировки (фаза сокращения в 2PL); изменения
    /// сохраняются, журнал отката не затрагивается.
    pub fn commit(&mut self) -> Result<OperationResult> {
        self.ensure_not_terminated()?;

        self.cancel_desired_lock()?;
        self.release_and_grant_locks()?;
        self.state = TransactionState::Terminated;

        log::debug!("{} committed", self.xid);
        Ok(OperationResult::Completed)
    }

    /// Отменяет транзакцию
    ///
    /// Журнал отката применяется в обратном порядке (LIFO): хранилище
    /// возвращается к состоянию до начала транзакции. Затем освобождаются
    /// все блокировки. Отмена синхронна и всегда завершается.
    pub fn abort(&mut self, mode: AbortMode) -> Result<OperationResult> {
        self.ensure_not_terminated()?;

        while let Some((key, prior)) = self.undo_log.pop() {
            match prior {
                Some(value) => self.store.put(&key, value)?,
                // Ключ отсутствовал до транзакции: восстанавливаем отсутствие
                None => self.store.remove(&key)?,
            }
        }

        self.cancel_desired_lock()?;
        self.release_and_grant_locks()?;
        self.state = TransactionState::Terminated;

        match mode {
            AbortMode::User => {
                log::debug!("{} aborted by user", self.xid);
                Ok(OperationResult::UserAbort)
            }
            AbortMode::Deadlock => {
                log::warn!("{} aborted to break a deadlock", self.xid);
                Ok(OperationResult::DeadlockAbort)
            }
        }
    }

    /// Освобождает все блокировки транзакции и предоставляет их следующим
    /// запросам в очередях
    pub fn release_and_grant_locks(&mut self) -> Result<()> {
        let keys: Vec<Key> = self.acquired_keys.drain().collect();
        for key in keys {
            if let Some(lock) = self.lock_table.get(&key)? {
                self.locked(&lock)?.release(self.xid);
            }
        }
        Ok(())
    }

    /// Внутренняя реализация PUT без проверки состояния
    fn do_put(&mut self, key: &str, value: &str) -> Result<Option<OperationResult>> {
        let lock = self.lock_table.lock_for(key)?;
        let granted = self.locked(&lock)?.request(self.xid, LockMode::Exclusive);

        if granted {
            let prior = self.store.get(key)?;
            self.undo_log.push((key.to_string(), prior));
            self.acquired_keys.insert(key.to_string());
            self.store.put(key, value.to_string())?;
            Ok(Some(OperationResult::Success))
        } else {
            log::debug!("{} blocked: {} on key {}", self.xid, LockMode::Exclusive, key);
            self.desired_lock = Some(DesiredLock {
                key: key.to_string(),
                mode: LockMode::Exclusive,
                operation: PendingOperation::Put {
                    key: key.to_string(),
                    value: value.to_string(),
                },
            });
            self.state = TransactionState::Blocked;
            Ok(None)
        }
    }

    /// Внутренняя реализация GET без проверки состояния
    fn do_get(&mut self, key: &str) -> Result<Option<OperationResult>> {
        let lock = self.lock_table.lock_for(key)?;
        let granted = self.locked(&lock)?.request(self.xid, LockMode::Shared);

        if granted {
            self.acquired_keys.insert(key.to_string());
            match self.store.get(key)? {
                Some(value) => Ok(Some(OperationResult::Value(value))),
                None => Ok(Some(OperationResult::NoSuchKey)),
            }
        } else {
            log::debug!("{} blocked: {} on key {}", self.xid, LockMode::Shared, key);
            self.desired_lock = Some(DesiredLock {
                key: key.to_string(),
                mode: LockMode::Shared,
                operation: PendingOperation::Get {
                    key: key.to_string(),
                },
            });
            self.state = TransactionState::Blocked;
            Ok(None)
        }
    }

    /// Удаляет ожидающий запрос завершаемой транзакции из очереди
    fn cancel_desired_lock(&mut self) -> Result<()> {
        if let Some(desired) = self.desired_lock.take() {
            if let Some(lock) = self.lock_table.get(&desired.key)? {
                self.locked(&lock)?.cancel_request(self.xid);
            }
        }
        Ok(())
    }

    /// Проверяет, что транзакция может выдать новый запрос
    fn ensure_can_request(&self) -> Result<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Blocked => Err(Error::transaction(format!(
                "{} has a pending lock request",
                self.xid
            ))),
            TransactionState::Terminated => Err(Error::transaction(format!(
                "{} is already terminated",
                self.xid
            ))),
        }
    }

    /// Проверяет, что транзакция еще не завершена
    fn ensure_not_terminated(&self) -> Result<()> {
        if self.state == TransactionState::Terminated {
            return Err(Error::transaction(format!(
                "{} is already terminated",
                self.xid
            )));
        }
        Ok(())
    }

    /// Захватывает мьютекс блокировки с обработкой отравления
    fn locked<'a>(&self, lock: &'a Arc<Mutex<Lock>>) -> Result<MutexGuard<'a, Lock>> {
        lock.lock()
            .map_err(|_| Error::internal("Failed to acquire lock mutex".to_string()))
    }
}
