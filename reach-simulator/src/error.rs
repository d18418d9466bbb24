use thiserror::Error;

pub type SimulatorResult<T> = std::result::Result<T, SimulatorError>;

#[derive(Debug, Error)]
pub enum SimulatorError {
    /// Некорректная конфигурация сессии
    #[error("Config error: {0}")]
    Config(String),

    /// Ошибка сокета
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка кодирования кадра
    #[error("SPEAD error: {0}")]
    Spead(#[from] reach_types::SpeadError),
}
