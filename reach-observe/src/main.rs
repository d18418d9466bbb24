use std::{path::PathBuf, sync::atomic::Ordering};

use clap::Parser;
use log::{error, info, warn};

use reach_observe::{
    CsvSink, ObservationConfig, ObservationSession, ObserveResult,
};
use reach_receiver::SpectrumReceiver;
use reach_types::Sample;

#[derive(Parser, Debug)]
#[command(
    name = "reach-observe",
    version = env!("CARGO_PKG_VERSION"),
    about = "Run a REACH observation plan from a YAML file",
    long_about = None,
)]
struct Cli {
    /// Путь к YAML-плану наблюдения
    #[arg(short, long)]
    config: PathBuf,
    /// Каталог для CSV-файлов измерений
    #[arg(short, long, default_value = ".")]
    output: PathBuf,
    /// Напечатать план и выйти
    #[arg(long)]
    dry_run: bool,
    /// Тихий режим (только ошибки)
    #[arg(short, long)]
    quiet: bool,
}

/// Выполняет план для конкретного режима выборок.
fn run_observation<T: Sample + std::fmt::Display>(
    config: ObservationConfig,
    output: PathBuf,
) -> ObserveResult<usize> {
    let mut receiver = SpectrumReceiver::<T>::new(config.receiver.to_config())?;
    receiver.initialise()?;

    let mut sink = CsvSink::new(output, &config.name);
    let session = ObservationSession::new(config);

    let stop_session = session.stop_flag();
    let stop_receiver = receiver.stop_flag();

    if let Err(e) = ctrlc::set_handler(move || {
        let already = stop_session.swap(true, Ordering::SeqCst);
        stop_receiver.store(true, Ordering::SeqCst);

        if already {
            // Второй Ctrl+C — принудительный выход
            warn!("Force exit");
            std::process::exit(130);
        }
        warn!("Ctrl+C received — finishing current measurement...");
    }) {
        warn!("Failed to set Ctrl+C handler: {e}");
    }

    session.run(&mut receiver, &mut sink)
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.quiet { "error" } else { "info" };

    env_logger::Builder::new()
        .filter_level(level.parse().unwrap())
        .format_target(false)
        .format_timestamp_secs()
        .init();

    let config = match ObservationConfig::from_file(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load plan {:?}: {e}", cli.config);
            std::process::exit(1);
        }
    };

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Observation   : {}", config.name);
    info!(
        "  Receiver      : {}:{}",
        config.receiver.ip, config.receiver.port
    );
    info!(
        "  Geometry      : {} signals x {} channels",
        config.receiver.nof_signals, config.receiver.nof_channels
    );
    info!(
        "  Sample mode   : {}",
        if config.receiver.floating_point {
            "floating point"
        } else {
            "fixed point"
        }
    );
    info!("  Planned       : {} spectra", config.total_spectra());
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if cli.dry_run {
        ObservationSession::new(config).dry_run();
        return;
    }

    let floating_point = config.receiver.floating_point;
    let result = if floating_point {
        run_observation::<f64>(config, cli.output)
    } else {
        run_observation::<u64>(config, cli.output)
    };

    match result {
        Ok(stored) => info!("✓ Observation complete: {stored} spectra stored"),
        Err(e) => {
            error!("Observation failed: {e}");
            std::process::exit(1);
        }
    }
}
