//! Оркестратор наблюдений REACH: читает YAML-план, дожидается стартового
//! времени и прогоняет операции измерения через приёмник спектров.

pub mod config;
pub mod error;
pub mod operation;
pub mod session;

pub use config::*;
pub use error::*;
pub use operation::*;
pub use session::*;
