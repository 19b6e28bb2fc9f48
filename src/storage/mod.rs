//! Модуль хранения данных RustKV

pub mod kvstore;

pub use kvstore::{InMemoryKvStore, KvStore};
