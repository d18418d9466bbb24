use thiserror::Error;

pub type ReceiverResult<T> = std::result::Result<T, ReceiverError>;

#[derive(Debug, Error)]
pub enum ReceiverError {
    /// Не удалось открыть приёмный сокет
    #[error("Failed to bind {addr}: {source}")]
    SocketBind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    /// Сокет ещё не создан (initialise не вызывался)
    #[error("Receiver not initialised: call initialise() before starting")]
    NotInitialised,

    /// Рабочий поток уже собирает спектры
    #[error("Receiver busy: a capture session is already running")]
    ReceiverBusy,

    /// wait_for_receiver без start_receiver
    #[error("Receiver not started: no capture session to wait for")]
    ReceiverNotStarted,

    /// Сессия прервана stop-флагом до первого собранного кадра
    #[error("Capture cancelled before a frame was assembled")]
    Cancelled,

    /// Рабочий поток аварийно завершился
    #[error("Worker thread failed: {0}")]
    Worker(String),

    /// Ошибка сокета
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Невосстановимая ошибка протокола (режим прошивки, геометрия)
    #[error("SPEAD error: {0}")]
    Spead(#[from] reach_types::SpeadError),
}
