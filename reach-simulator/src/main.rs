use std::sync::atomic::Ordering;

use clap::Parser;
use log::{error, info, warn};

use reach_simulator::{parse_udp_target, SimulatorConfig, SimulatorSession};

#[derive(Parser, Debug)]
#[command(
    name = "reach-simulator",
    version = env!("CARGO_PKG_VERSION"),
    about = "Stream synthetic REACH spectra over UDP (TPM firmware stand-in)",
    long_about = None,
)]
struct Cli {
    /// Адрес приёмника (udp://host:port или host:port)
    #[arg(short, long, default_value = "127.0.0.1:4660")]
    target: String,
    /// Количество логических сигналов
    #[arg(long, default_value = "2")]
    signals: usize,
    /// Частотных каналов на сигнал
    #[arg(long, default_value = "16384")]
    channels: usize,
    /// Эмулировать floating point прошивку
    #[arg(long)]
    float: bool,
    /// Сколько кадров отправить. По умолчанию: до Ctrl+C
    #[arg(short = 'n', long)]
    frames: Option<u64>,
    /// Пауза между кадрами, миллисекунды
    #[arg(long, default_value = "100")]
    interval: u64,
    /// Не перемешивать пакеты внутри кадра
    #[arg(long)]
    no_shuffle: bool,
    /// Зерно перемешивания (воспроизводимые сессии)
    #[arg(long)]
    seed: Option<u64>,
    /// Интервал вывода статистики (секунды)
    #[arg(long, default_value = "5")]
    stats_interval: u64,
    /// Тихий режим (только ошибки)
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.quiet { "error" } else { "info" };

    env_logger::Builder::new()
        .filter_level(level.parse().unwrap())
        .format_target(false)
        .format_timestamp_secs()
        .init();

    let target_addr = match parse_udp_target(&cli.target) {
        Ok(a) => a,
        Err(e) => {
            error!("--target: {e}");
            std::process::exit(1);
        }
    };

    let config = SimulatorConfig {
        target_addr: target_addr.clone(),
        nof_signals: cli.signals,
        nof_channels: cli.channels,
        floating_point: cli.float,
        nof_frames: cli.frames,
        frame_interval_ms: cli.interval,
        shuffle: !cli.no_shuffle,
        seed: cli.seed,
        stats_interval_secs: cli.stats_interval,
        ..Default::default()
    };

    let session = match SimulatorSession::new(config) {
        Ok(s) => s,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let stop_ctrlc = session.stop_flag();

    if let Err(e) = ctrlc::set_handler(move || {
        if stop_ctrlc.swap(true, Ordering::SeqCst) {
            // Второй Ctrl+C — принудительный выход
            warn!("Force exit");
            std::process::exit(130);
        }
        warn!("Ctrl+C received — finishing current frame...");
    }) {
        warn!("Failed to set Ctrl+C handler: {e}");
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Target        : {target_addr}");
    info!("  Signals       : {}", cli.signals);
    info!("  Channels      : {}", cli.channels);
    info!(
        "  Sample mode   : {}",
        if cli.float { "floating point" } else { "fixed point" }
    );
    info!(
        "  Frames        : {}",
        cli.frames
            .map(|n| n.to_string())
            .unwrap_or_else(|| "until Ctrl+C".to_string())
    );
    info!("  Frame interval: {} ms", cli.interval);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if let Err(e) = session.run() {
        error!("Simulation failed: {e}");
        std::process::exit(1);
    }

    info!("✓ Simulation complete");
}
