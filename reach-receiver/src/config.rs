use std::net::IpAddr;

use reach_types::{SpeadResult, SpectrumLayout};

/// Полная конфигурация сессии приёма.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Адрес интерфейса для bind (обычно адрес 10G-линка к TPM)
    pub ip: IpAddr,
    /// UDP-порт, на который прошивка шлёт спектры
    pub port: u16,
    /// Количество логических сигналов
    pub nof_signals: usize,
    /// Частотных каналов на сигнал
    pub nof_channels: usize,
    /// Режим выборок прошивки: floating point или fixed point
    pub floating_point: bool,
    /// Таймаут чтения сокета (секунды); каждый тик проверяется stop-флаг
    pub read_timeout_secs: u64,
    /// Размер приёмного буфера ядра, SO_RCVBUF (байты)
    pub recv_buffer_bytes: usize,
    /// Интервал вывода статистики (секунды)
    pub stats_interval_secs: u64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ReceiverConfig {
    /// Строит и валидирует геометрию спектра из конфигурации.
    pub fn layout(&self) -> SpeadResult<SpectrumLayout> {
        SpectrumLayout::new(self.nof_signals, self.nof_channels)
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            ip: IpAddr::from([0, 0, 0, 0]),
            port: 4660,
            nof_signals: 2,
            nof_channels: 16_384,
            floating_point: false,
            read_timeout_secs: 2,
            recv_buffer_bytes: 2 * 1024 * 1024,
            stats_interval_secs: 5,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
