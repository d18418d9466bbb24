use thiserror::Error;

pub type ObserveResult<T> = std::result::Result<T, ObserveError>;

#[derive(Debug, Error)]
pub enum ObserveError {
    /// Некорректный план наблюдения
    #[error("Config error: {0}")]
    Config(String),

    /// Ошибка разбора YAML
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Ошибка файла плана или выходных данных
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сессии приёмника
    #[error("Receiver error: {0}")]
    Receiver(#[from] reach_receiver::ReceiverError),

    /// Ошибка геометрии спектра
    #[error("SPEAD error: {0}")]
    Spead(#[from] reach_types::SpeadError),
}
