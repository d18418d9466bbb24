use crate::error::{SpeadError, SpeadResult};

/// Количество физических FPGA-линий в приборе (две FPGA на TPM).
pub const NOF_LANES: usize = 2;

/// Байт в одной выборке payload (64-битные слова).
pub const BYTES_PER_SAMPLE: usize = 8;

/// Размер payload одного пакета по умолчанию (прошивка шлёт по 1024 байта).
pub const DEFAULT_BYTES_PER_PACKET: usize = 1024;

/// Геометрия спектра: сколько сигналов, каналов и как прошивка режет
/// кадр на фрагменты. Проверяется один раз при создании и дальше
/// передаётся по значению во все компоненты — без глобального состояния.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpectrumLayout {
    /// Количество логических сигналов (антенных входов)
    pub nof_signals: usize,
    /// Количество частотных каналов на сигнал
    pub nof_channels: usize,
    /// Байт payload в одном пакете
    pub bytes_per_packet: usize,
}

impl SpectrumLayout {
    /// Создаёт и валидирует геометрию.
    pub fn new(
        nof_signals: usize,
        nof_channels: usize,
    ) -> SpeadResult<Self> {
        Self::with_packet_size(nof_signals, nof_channels, DEFAULT_BYTES_PER_PACKET)
    }

    /// То же, но с нестандартным размером пакета (тесты, урезанные кадры).
    pub fn with_packet_size(
        nof_signals: usize,
        nof_channels: usize,
        bytes_per_packet: usize,
    ) -> SpeadResult<Self> {
        if nof_signals == 0 || nof_signals % NOF_LANES != 0 {
            return Err(SpeadError::InvalidLayout(format!(
                "nof_signals must be a positive multiple of {NOF_LANES}, got {nof_signals}"
            )));
        }

        if !nof_channels.is_power_of_two() {
            return Err(SpeadError::InvalidLayout(format!(
                "nof_channels must be a power of two, got {nof_channels}"
            )));
        }

        if bytes_per_packet == 0 || bytes_per_packet % BYTES_PER_SAMPLE != 0 {
            return Err(SpeadError::InvalidLayout(format!(
                "bytes_per_packet must be a multiple of {BYTES_PER_SAMPLE}, got {bytes_per_packet}"
            )));
        }

        let layout = Self {
            nof_signals,
            nof_channels,
            bytes_per_packet,
        };

        // Линия должна делиться на целое число пакетов
        let lane_bytes = layout.lane_len() * BYTES_PER_SAMPLE;
        if lane_bytes % bytes_per_packet != 0 {
            return Err(SpeadError::InvalidLayout(format!(
                "lane of {lane_bytes} bytes is not divisible into {bytes_per_packet}-byte packets"
            )));
        }

        // Граница пакета не может резать группу мультиплексированных сигналов
        if layout.words_per_packet() % layout.signals_per_fpga() != 0 {
            return Err(SpeadError::InvalidLayout(format!(
                "packet of {} words does not align with {} signals per lane",
                layout.words_per_packet(),
                layout.signals_per_fpga()
            )));
        }

        Ok(layout)
    }

    /// Логических сигналов, мультиплексированных на одну FPGA-линию.
    pub fn signals_per_fpga(&self) -> usize {
        self.nof_signals / NOF_LANES
    }

    /// Длина плоского буфера одной линии в выборках.
    pub fn lane_len(&self) -> usize {
        self.signals_per_fpga() * self.nof_channels
    }

    /// Выборок в одном пакете.
    pub fn words_per_packet(&self) -> usize {
        self.bytes_per_packet / BYTES_PER_SAMPLE
    }

    /// Сколько фрагментов составляют полный кадр. Константа кадра:
    /// именно по достижении этого счётчика кадр считается собранным
    /// (явного маркера конца кадра в протоколе нет).
    pub fn expected_fragments(&self) -> usize {
        self.nof_signals * self.nof_channels * BYTES_PER_SAMPLE / self.bytes_per_packet
    }
}

impl Default for SpectrumLayout {
    /// Штатная конфигурация REACH: 2 сигнала по 16384 канала.
    fn default() -> Self {
        Self {
            nof_signals: 2,
            nof_channels: 16_384,
            bytes_per_packet: DEFAULT_BYTES_PER_PACKET,
        }
    }
}
