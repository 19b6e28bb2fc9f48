//! Интеграционные тесты для RustKV

pub mod fairness_tests;
pub mod scenario_tests;
