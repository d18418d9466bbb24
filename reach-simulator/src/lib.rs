//! Симулятор прошивки TPM: генерирует детерминированные спектры и шлёт
//! их SPEAD-пакетами по UDP. Для стендов без железа и для интеграционных
//! тестов приёмника.

pub mod config;
pub mod error;
pub mod metrics;
pub mod session;

pub use config::*;
pub use error::*;
pub use metrics::*;
pub use session::*;
