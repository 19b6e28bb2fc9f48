//! Общие типы данных для RustKV

/// Ключ в хранилище
pub type Key = String;

/// Значение в хранилище
pub type Value = String;
