use crate::{layout::SpectrumLayout, sample::Sample};

/// Тактов аппаратного счётчика на один кадр интеграции.
pub const TICKS_PER_FRAME: u64 = 32_768;

/// Период одного такта АЦП в секундах (800 MHz / 2 = 2.5 нс).
pub const TICK_SECONDS: f64 = 2.5e-9;

/// Собранный спектр одного кадра: матрица `[сигнал][канал]` плюс
/// временная привязка. Создаётся заново на каждый завершённый кадр,
/// владение передаётся вызывающему.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum<T: Sample> {
    /// Аппаратный счётчик тактов кадра
    pub timestamp: u64,
    /// Опорное время синхронизации (Unix, секунды)
    pub sync_time: u64,
    nof_signals: usize,
    nof_channels: usize,
    data: Vec<T>,
}

impl<T: Sample> Spectrum<T> {
    /// Создаёт спектр из построчной матрицы `[сигнал][канал]`.
    ///
    /// Паникует при несовпадении длины с геометрией — внутренняя ошибка
    /// сборщика кадров, а не входных данных.
    pub fn new(
        layout: &SpectrumLayout,
        timestamp: u64,
        sync_time: u64,
        data: Vec<T>,
    ) -> Self {
        assert_eq!(
            data.len(),
            layout.nof_signals * layout.nof_channels,
            "spectrum data does not match layout"
        );

        Self {
            timestamp,
            sync_time,
            nof_signals: layout.nof_signals,
            nof_channels: layout.nof_channels,
            data,
        }
    }

    pub fn nof_signals(&self) -> usize {
        self.nof_signals
    }

    pub fn nof_channels(&self) -> usize {
        self.nof_channels
    }

    /// Строка матрицы — все каналы одного сигнала.
    pub fn signal(
        &self,
        index: usize,
    ) -> &[T] {
        let start = index * self.nof_channels;
        &self.data[start..start + self.nof_channels]
    }

    /// Плоские данные в порядке `[сигнал][канал]`.
    pub fn as_flat(&self) -> &[T] {
        &self.data
    }

    /// Абсолютное время кадра: sync_time + timestamp тактов.
    pub fn unix_time(&self) -> f64 {
        self.sync_time as f64 + self.timestamp as f64 * TICKS_PER_FRAME as f64 * TICK_SECONDS
    }
}
