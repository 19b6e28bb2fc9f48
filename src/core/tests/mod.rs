//! Тесты для модулей ядра RustKV
