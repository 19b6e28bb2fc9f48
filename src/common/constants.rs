//! Константы для RustKV

/// Интервал опроса заблокированных транзакций по умолчанию (в миллисекундах)
pub const DEFAULT_LOCK_POLL_INTERVAL_MS: u64 = 10;

/// Максимальный интервал опроса заблокированных транзакций (в миллисекундах)
pub const MAX_LOCK_POLL_INTERVAL_MS: u64 = 10_000;

/// Интервал обнаружения взаимоблокировок по умолчанию (в миллисекундах)
pub const DEFAULT_DEADLOCK_DETECTION_INTERVAL_MS: u64 = 100;

/// Максимальный интервал обнаружения взаимоблокировок (в миллисекундах)
pub const MAX_DEADLOCK_DETECTION_INTERVAL_MS: u64 = 60_000;

/// Число циклов опроса, после которого драйвер демо-сценария останавливается
pub const DEMO_MAX_POLL_ATTEMPTS: usize = 1000;
