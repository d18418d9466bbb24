use reach_types::{SpeadResult, SpectrumLayout};

/// Конфигурация сессии симуляции.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Адрес приёмника (host:port)
    pub target_addr: String,
    /// Локальный адрес для bind
    pub bind_addr: String,
    /// Количество логических сигналов
    pub nof_signals: usize,
    /// Частотных каналов на сигнал
    pub nof_channels: usize,
    /// Эмулировать floating point прошивку
    pub floating_point: bool,
    /// Сколько кадров отправить (None = до Ctrl+C)
    pub nof_frames: Option<u64>,
    /// Пауза между кадрами (миллисекунды)
    pub frame_interval_ms: u64,
    /// Перемешивать пакеты внутри кадра (эмуляция сетевого reorder)
    pub shuffle: bool,
    /// Зерно перемешивания (None = недетерминированное)
    pub seed: Option<u64>,
    /// Интервал вывода статистики (секунды)
    pub stats_interval_secs: u64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl SimulatorConfig {
    /// Строит и валидирует геометрию спектра из конфигурации.
    pub fn layout(&self) -> SpeadResult<SpectrumLayout> {
        SpectrumLayout::new(self.nof_signals, self.nof_channels)
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            target_addr: "127.0.0.1:4660".to_string(),
            bind_addr: "0.0.0.0:0".to_string(),
            nof_signals: 2,
            nof_channels: 16_384,
            floating_point: false,
            nof_frames: None,
            frame_interval_ms: 100,
            shuffle: true,
            seed: None,
            stats_interval_secs: 5,
        }
    }
}

/// Парсит `udp://host:port` или просто `host:port`.
pub fn parse_udp_target(s: &str) -> Result<String, String> {
    let addr = s.strip_prefix("udp://").unwrap_or(s);
    addr.parse::<std::net::SocketAddr>()
        .map(|a| a.to_string())
        .map_err(|e| format!("Invalid UDP address '{s}': {e}"))
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_udp_target() {
        assert_eq!(
            parse_udp_target("udp://127.0.0.1:4660").unwrap(),
            "127.0.0.1:4660"
        );
        assert_eq!(
            parse_udp_target("127.0.0.1:4660").unwrap(),
            "127.0.0.1:4660"
        );
        assert!(parse_udp_target("not_an_addr").is_err());
    }

    #[test]
    fn test_default_config_layout() {
        let layout = SimulatorConfig::default().layout().unwrap();
        assert_eq!(layout.expected_fragments(), 256);
    }
}
