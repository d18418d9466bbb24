use std::{net::IpAddr, sync::atomic::Ordering, time::Instant};

use clap::Parser;
use log::{error, info, warn};

use reach_receiver::{ReceiverConfig, ReceiverResult, SpectrumReceiver};
use reach_types::Sample;

#[derive(Parser, Debug)]
#[command(
    name = "reach-receiver",
    version = env!("CARGO_PKG_VERSION"),
    about = "Receive and assemble REACH spectra from TPM UDP streams",
    long_about = None,
)]
struct Cli {
    /// Адрес интерфейса для приёма
    #[arg(short, long, default_value = "0.0.0.0")]
    ip: IpAddr,
    /// UDP-порт спектрометра
    #[arg(short, long, default_value = "4660")]
    port: u16,
    /// Количество логических сигналов
    #[arg(long, default_value = "2")]
    signals: usize,
    /// Частотных каналов на сигнал
    #[arg(long, default_value = "16384")]
    channels: usize,
    /// Прошивка в режиме floating point
    #[arg(long)]
    float: bool,
    /// Сколько спектров собрать за сессию
    #[arg(short = 'n', long, default_value = "10")]
    nof_spectra: usize,
    /// Таймаут чтения сокета, секунды
    #[arg(long, default_value = "2")]
    timeout: u64,
    /// Размер приёмного буфера ядра, байты
    #[arg(long, default_value = "2097152")]
    recv_buffer: usize,
    /// Интервал вывода статистики (секунды)
    #[arg(long, default_value = "5")]
    stats_interval: u64,
    /// Тихий режим (только ошибки)
    #[arg(short, long)]
    quiet: bool,
}

/// Сессия приёма для конкретного режима выборок.
fn run_session<T: Sample>(
    config: ReceiverConfig,
    nof_spectra: usize,
) -> ReceiverResult<()> {
    let mut receiver = SpectrumReceiver::<T>::new(config)?;
    receiver.initialise()?;

    let stop_ctrlc = receiver.stop_flag();

    if let Err(e) = ctrlc::set_handler(move || {
        if stop_ctrlc.swap(true, Ordering::SeqCst) {
            // Второй Ctrl+C — принудительный выход
            warn!("Force exit");
            std::process::exit(130);
        }
        warn!("Ctrl+C received — finishing current frame and returning partial result...");
    }) {
        warn!("Failed to set Ctrl+C handler: {e}");
    }

    let metrics = receiver.metrics();
    let session_start = Instant::now();

    let (unix_times, spectra) = receiver.receive_spectra(nof_spectra)?;

    for (unix_time, spectrum) in unix_times.iter().zip(&spectra) {
        info!(
            "Spectrum: timestamp={} unix_time={unix_time:.6} signals={} channels={}",
            spectrum.timestamp,
            spectrum.nof_signals(),
            spectrum.nof_channels()
        );
    }

    // --- Итоговая статистика ---
    let summary = metrics.summary(&session_start);
    info!("\n{summary}");

    if metrics.frames_discarded.load(Ordering::Relaxed) > 0 {
        warn!(
            "⚠ {} incomplete frames discarded ({:.2}% loss). Consider: larger --recv-buffer",
            metrics.frames_discarded.load(Ordering::Relaxed),
            summary.loss_rate_pct
        );
    }

    info!("✓ Capture complete: {} spectra", spectra.len());
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.quiet { "error" } else { "info" };

    env_logger::Builder::new()
        .filter_level(level.parse().unwrap())
        .format_target(false)
        .format_timestamp_secs()
        .init();

    let config = ReceiverConfig {
        ip: cli.ip,
        port: cli.port,
        nof_signals: cli.signals,
        nof_channels: cli.channels,
        floating_point: cli.float,
        read_timeout_secs: cli.timeout,
        recv_buffer_bytes: cli.recv_buffer,
        stats_interval_secs: cli.stats_interval,
    };

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Listen        : {}:{}", cli.ip, cli.port);
    info!("  Signals       : {}", cli.signals);
    info!("  Channels      : {}", cli.channels);
    info!(
        "  Sample mode   : {}",
        if cli.float { "floating point" } else { "fixed point" }
    );
    info!("  Spectra       : {}", cli.nof_spectra);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Режим выборок фиксирует тип на этапе компиляции
    let result = if cli.float {
        run_session::<f64>(config, cli.nof_spectra)
    } else {
        run_session::<u64>(config, cli.nof_spectra)
    };

    if let Err(e) = result {
        error!("Capture failed: {e}");
        std::process::exit(1);
    }
}
