use serde::{Deserialize, Serialize};

/// Операция плана наблюдения.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    /// Собрать `nof_spectra` спектров и сохранить под именем `name`.
    /// `source` — метка входа (antenna, cold_load, ...), идёт в журнал
    /// и метаданные; коммутацией входов занимается оператор.
    MeasureSpectrum {
        name: String,
        #[serde(default)]
        source: Option<String>,
        #[serde(default = "default_nof_spectra")]
        nof_spectra: usize,
    },
    /// Пауза между измерениями (секунды).
    Wait { seconds: f64 },
    /// Повторить вложенный блок операций.
    Repeat {
        repetitions: usize,
        operations: Vec<Operation>,
    },
}

fn default_nof_spectra() -> usize {
    1
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Operation {
    /// Сколько спектров даст операция с учётом вложенных повторов.
    pub fn total_spectra(&self) -> usize {
        match self {
            Operation::MeasureSpectrum { nof_spectra, .. } => *nof_spectra,
            Operation::Wait { .. } => 0,
            Operation::Repeat {
                repetitions,
                operations,
            } => repetitions * operations.iter().map(Operation::total_spectra).sum::<usize>(),
        }
    }

    /// Суммарное время пауз (секунды) с учётом вложенных повторов.
    pub fn total_wait_secs(&self) -> f64 {
        match self {
            Operation::MeasureSpectrum { .. } => 0.0,
            Operation::Wait { seconds } => *seconds,
            Operation::Repeat {
                repetitions,
                operations,
            } => {
                *repetitions as f64
                    * operations.iter().map(Operation::total_wait_secs).sum::<f64>()
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
