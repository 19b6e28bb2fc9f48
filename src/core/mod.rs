//! Ядро конкурентности RustKV

pub mod coordinator;
pub mod lock;
pub mod transaction;

// Переэкспортируем основные типы
pub use coordinator::{DeadlockCoordinator, WaitForGraph};
pub use lock::{Lock, LockMode, LockRequest, LockTable};
pub use transaction::{
    AbortMode, DesiredLock, OperationResult, PendingOperation, TransactionHandler, TransactionId,
    TransactionState,
};

#[cfg(test)]
pub mod tests;
