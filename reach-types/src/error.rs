use thiserror::Error;

/// Результат для операций протокола SPEAD
pub type SpeadResult<T> = std::result::Result<T, SpeadError>;

/// Ошибки декодирования пакетов и сборки кадра.
///
/// Ошибки уровня пакета (`TruncatedHeader`, `InvalidMagic`,
/// `MalformedHeader`, `TruncatedPayload`, `LaneOutOfRange`) восстановимы:
/// пакет отбрасывается, цикл приёма продолжается. `ModeMismatch` фатальна —
/// неверная интерпретация ширины выборок испортила бы все данные.
#[derive(Debug, Error)]
pub enum SpeadError {
    /// Датаграмма короче 9 заголовочных слов (72 байта)
    #[error("Truncated header: {0} bytes, need at least 72")]
    TruncatedHeader(usize),

    /// Первое слово заголовка не несёт магический идентификатор
    #[error("Not a SPEAD packet: first item id {0:#06x}")]
    InvalidMagic(u16),

    /// Неопознанный идентификатор заголовочного слова
    #[error("Unexpected header item {id:#06x} at position {index}")]
    MalformedHeader { id: u16, index: usize },

    /// В заголовке отсутствует обязательное поле
    #[error("Mandatory header item missing: {0}")]
    MissingHeaderItem(&'static str),

    /// Payload короче, чем обещает заголовок
    #[error("Truncated payload: have {have} bytes, header claims {need}")]
    TruncatedPayload { have: usize, need: usize },

    /// Capture mode прошивки не совпадает с настройкой приёмника
    #[error("Capture mode mismatch: firmware floating point {firmware}, receiver configured {configured}")]
    ModeMismatch { firmware: bool, configured: bool },

    /// Пакет адресован несуществующей FPGA-линии
    #[error("Fragment outside lane bounds: antenna {antenna}, channel {channel}")]
    LaneOutOfRange { antenna: u16, channel: u16 },

    /// Некорректная геометрия спектра
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),
}

impl SpeadError {
    /// Восстановимые ошибки: пакет отброшен, приём продолжается.
    /// UDP без ретрансмиссии — потеря пакета здесь штатный случай.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            SpeadError::ModeMismatch { .. } | SpeadError::InvalidLayout(_)
        )
    }
}
