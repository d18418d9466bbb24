//! Приёмник спектров REACH: UDP-сокет, рабочий поток и сборка кадров
//! из SPEAD-пакетов прошивки TPM.

pub mod config;
pub mod error;
pub mod metrics;
pub mod receiver;

pub use config::*;
pub use error::*;
pub use metrics::*;
pub use receiver::*;
