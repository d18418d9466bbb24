use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, SystemTime},
};

use log::{info, warn};

use reach_receiver::SpectrumReceiver;
use reach_types::{Sample, Spectrum};

use crate::{ObservationConfig, ObserveResult, Operation};

/// Источник спектров для плана наблюдения. Боевая реализация —
/// [`SpectrumReceiver`]; тесты подставляют синтетический источник.
pub trait SpectrumSource<T: Sample> {
    /// Блокирующий захват очередной порции спектров.
    fn capture(
        &mut self,
        nof_spectra: usize,
    ) -> ObserveResult<(Vec<f64>, Vec<Spectrum<T>>)>;
}

impl<T: Sample> SpectrumSource<T> for SpectrumReceiver<T> {
    fn capture(
        &mut self,
        nof_spectra: usize,
    ) -> ObserveResult<(Vec<f64>, Vec<Spectrum<T>>)> {
        Ok(self.receive_spectra(nof_spectra)?)
    }
}

/// Получатель измеренных спектров.
pub trait SpectrumSink<T: Sample> {
    fn store(
        &mut self,
        measurement: &str,
        unix_time: f64,
        spectrum: &Spectrum<T>,
    ) -> ObserveResult<()>;
}

/// Запись одного измерения.
#[derive(Debug, Clone)]
pub struct MeasurementRecord<T: Sample> {
    pub measurement: String,
    pub unix_time: f64,
    pub spectrum: Spectrum<T>,
}

/// Накапливает измерения в памяти (тесты, пост-обработка).
#[derive(Debug, Default)]
pub struct MemorySink<T: Sample> {
    pub records: Vec<MeasurementRecord<T>>,
}

impl<T: Sample> MemorySink<T> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<T: Sample> SpectrumSink<T> for MemorySink<T> {
    fn store(
        &mut self,
        measurement: &str,
        unix_time: f64,
        spectrum: &Spectrum<T>,
    ) -> ObserveResult<()> {
        self.records.push(MeasurementRecord {
            measurement: measurement.to_string(),
            unix_time,
            spectrum: spectrum.clone(),
        });

        Ok(())
    }
}

/// Пишет каждый спектр отдельным CSV-файлом:
/// `<наблюдение>_<измерение>_<номер>.csv`, строка на канал.
pub struct CsvSink {
    dir: PathBuf,
    observation: String,
    counter: usize,
}

impl CsvSink {
    pub fn new(
        dir: PathBuf,
        observation: &str,
    ) -> Self {
        Self {
            dir,
            observation: observation.to_string(),
            counter: 0,
        }
    }
}

impl<T: Sample + std::fmt::Display> SpectrumSink<T> for CsvSink {
    fn store(
        &mut self,
        measurement: &str,
        unix_time: f64,
        spectrum: &Spectrum<T>,
    ) -> ObserveResult<()> {
        let path = self.dir.join(format!(
            "{}_{}_{:04}.csv",
            self.observation, measurement, self.counter
        ));
        self.counter += 1;

        let mut w = BufWriter::new(File::create(&path)?);

        write!(w, "# unix_time={unix_time:.6} timestamp={}", spectrum.timestamp)?;
        writeln!(w)?;

        write!(w, "channel")?;
        for signal in 0..spectrum.nof_signals() {
            write!(w, ",signal{signal}")?;
        }
        writeln!(w)?;

        for channel in 0..spectrum.nof_channels() {
            write!(w, "{channel}")?;
            for signal in 0..spectrum.nof_signals() {
                write!(w, ",{}", spectrum.signal(signal)[channel])?;
            }
            writeln!(w)?;
        }

        w.flush()?;
        info!("Stored {measurement} -> {path:?}");
        Ok(())
    }
}

/// Сессия наблюдения: ожидание стартового времени и прогон операций.
pub struct ObservationSession {
    config: ObservationConfig,
    stop_flag: Arc<AtomicBool>,
}

impl ObservationSession {
    pub fn new(config: ObservationConfig) -> Self {
        Self {
            config,
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    /// Печатает план без выполнения. Возвращает итоговые числа
    /// (спектров, секунд пауз).
    pub fn dry_run(&self) -> (usize, f64) {
        info!("Observation '{}' plan:", self.config.name);
        Self::print_operations(&self.config.operations, 1);

        let total: usize = self.config.total_spectra();
        let waits: f64 = self
            .config
            .operations
            .iter()
            .map(Operation::total_wait_secs)
            .sum();

        info!("Total: {total} spectra, {waits:.1}s of waits");
        (total, waits)
    }

    fn print_operations(
        operations: &[Operation],
        depth: usize,
    ) {
        let indent = "  ".repeat(depth);

        for op in operations {
            match op {
                Operation::MeasureSpectrum {
                    name,
                    source,
                    nof_spectra,
                } => match source {
                    Some(source) => info!("{indent}measure '{name}' x{nof_spectra} from {source}"),
                    None => info!("{indent}measure '{name}' x{nof_spectra}"),
                },
                Operation::Wait { seconds } => {
                    info!("{indent}wait {seconds}s");
                }
                Operation::Repeat {
                    repetitions,
                    operations,
                } => {
                    info!("{indent}repeat x{repetitions}:");
                    Self::print_operations(operations, depth + 1);
                }
            }
        }
    }

    /// Выполняет план. Возвращает количество сохранённых спектров;
    /// stop-флаг прерывает план с частичным результатом.
    pub fn run<T, S, K>(
        &self,
        source: &mut S,
        sink: &mut K,
    ) -> ObserveResult<usize>
    where
        T: Sample,
        S: SpectrumSource<T>,
        K: SpectrumSink<T>,
    {
        self.wait_for_start();

        if self.stop_flag.load(Ordering::Relaxed) {
            warn!("Observation cancelled before start");
            return Ok(0);
        }

        info!("Observation '{}' started", self.config.name);
        let mut stored = 0usize;
        self.run_operations(&self.config.operations, source, sink, &mut stored)?;

        info!(
            "Observation '{}' finished: {stored} spectra stored",
            self.config.name
        );
        Ok(stored)
    }

    fn run_operations<T, S, K>(
        &self,
        operations: &[Operation],
        source: &mut S,
        sink: &mut K,
        stored: &mut usize,
    ) -> ObserveResult<()>
    where
        T: Sample,
        S: SpectrumSource<T>,
        K: SpectrumSink<T>,
    {
        for op in operations {
            if self.stop_flag.load(Ordering::Relaxed) {
                warn!("Observation interrupted: {stored} spectra stored so far");
                return Ok(());
            }

            match op {
                Operation::MeasureSpectrum {
                    name,
                    source: source_label,
                    nof_spectra,
                } => {
                    match source_label {
                        Some(label) => {
                            info!("Measuring '{name}' from {label} ({nof_spectra} spectra)...");
                        }
                        None => info!("Measuring '{name}' ({nof_spectra} spectra)..."),
                    }
                    let (unix_times, spectra) = source.capture(*nof_spectra)?;

                    for (unix_time, spectrum) in unix_times.iter().zip(&spectra) {
                        sink.store(name, *unix_time, spectrum)?;
                        *stored += 1;
                    }

                    if spectra.len() < *nof_spectra {
                        warn!(
                            "Measurement '{name}' incomplete: {} of {nof_spectra} spectra",
                            spectra.len()
                        );
                    }
                }
                Operation::Wait { seconds } => {
                    info!("Waiting {seconds}s...");
                    self.sleep_interruptible(Duration::from_secs_f64(*seconds));
                }
                Operation::Repeat {
                    repetitions,
                    operations,
                } => {
                    for repetition in 0..*repetitions {
                        if self.stop_flag.load(Ordering::Relaxed) {
                            break;
                        }
                        info!("Repetition {}/{repetitions}", repetition + 1);
                        self.run_operations(operations, source, sink, stored)?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Ждёт стартового времени, проверяя stop-флаг каждые 100 мс.
    fn wait_for_start(&self) {
        let start = self.config.start_time.resolve();

        if let Ok(delay) = start.duration_since(SystemTime::now()) {
            info!("Waiting {:.0}s until start time...", delay.as_secs_f64());
            self.sleep_interruptible(delay);
        }
    }

    fn sleep_interruptible(
        &self,
        total: Duration,
    ) {
        let tick = Duration::from_millis(100);
        let deadline = SystemTime::now() + total;

        while SystemTime::now() < deadline {
            if self.stop_flag.load(Ordering::Relaxed) {
                return;
            }
            std::thread::sleep(tick.min(total));
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
