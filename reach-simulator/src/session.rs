use std::{
    net::UdpSocket,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use log::{info, warn};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use reach_core::build_frame_packets;
use reach_types::{Sample, SpectrumLayout};

use crate::{metrics::SimulatorMetrics, SimulatorConfig, SimulatorResult};

/// Выборка с детерминированным тестовым паттерном: по значению можно
/// восстановить кадр, сигнал и канал, откуда она пришла.
pub trait PatternSample: Sample {
    fn pattern(
        frame: u64,
        signal: usize,
        channel: usize,
    ) -> Self;
}

impl PatternSample for u64 {
    fn pattern(
        frame: u64,
        signal: usize,
        channel: usize,
    ) -> Self {
        ((frame & 0xFFFF) << 40) | ((signal as u64) << 32) | channel as u64
    }
}

impl PatternSample for f64 {
    fn pattern(
        frame: u64,
        signal: usize,
        channel: usize,
    ) -> Self {
        frame as f64 * 1_000.0 + signal as f64 * 100.0 + channel as f64 * 0.25
    }
}

/// Заполняет кадр `[сигнал][канал]` тестовым паттерном.
pub fn pattern_spectrum<T: PatternSample>(
    layout: &SpectrumLayout,
    frame: u64,
) -> Vec<T> {
    let mut spectrum = Vec::with_capacity(layout.nof_signals * layout.nof_channels);

    for signal in 0..layout.nof_signals {
        for channel in 0..layout.nof_channels {
            spectrum.push(T::pattern(frame, signal, channel));
        }
    }

    spectrum
}

/// Сессия симуляции (single-threaded).
pub struct SimulatorSession {
    config: SimulatorConfig,
    layout: SpectrumLayout,
    metrics: Arc<SimulatorMetrics>,
    stop_flag: Arc<AtomicBool>,
}

impl SimulatorSession {
    /// Создаёт сессию, проверяя конфигурацию.
    pub fn new(config: SimulatorConfig) -> SimulatorResult<Self> {
        let layout = config.layout()?;

        Ok(Self {
            config,
            layout,
            metrics: SimulatorMetrics::new(),
            stop_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    pub fn metrics(&self) -> Arc<SimulatorMetrics> {
        self.metrics.clone()
    }

    /// Запускает отправку. Блокирует до исчерпания кадров или stop_flag.
    pub fn run(self) -> SimulatorResult<()> {
        if self.config.floating_point {
            self.run_typed::<f64>()
        } else {
            self.run_typed::<u64>()
        }
    }

    fn run_typed<T: PatternSample>(self) -> SimulatorResult<()> {
        let cfg = &self.config;
        let metrics = &self.metrics;
        let stop = &self.stop_flag;
        let session_start = Instant::now();
        let stats_interval = Duration::from_secs(cfg.stats_interval_secs);
        let frame_interval = Duration::from_millis(cfg.frame_interval_ms);

        let socket = UdpSocket::bind(&cfg.bind_addr)?;
        socket.connect(&cfg.target_addr)?;

        // Синхронизация один раз на сессию, как у настоящей прошивки
        let sync_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            "Streaming to {} ({} fragments per frame)",
            cfg.target_addr,
            self.layout.expected_fragments()
        );

        let mut last_stats = Instant::now();
        let mut frame: u64 = 0;

        loop {
            if stop.load(Ordering::Relaxed) {
                info!("Stop signal received after {frame} frames");
                break;
            }

            if let Some(limit) = cfg.nof_frames {
                if frame >= limit {
                    break;
                }
            }

            let spectrum = pattern_spectrum::<T>(&self.layout, frame);
            let mut packets =
                build_frame_packets(&self.layout, sync_time, frame + 1, &spectrum)?;

            if cfg.shuffle {
                packets.shuffle(&mut rng);
            }

            for packet in &packets {
                match socket.send(packet) {
                    Ok(n) => {
                        metrics.packets_sent.fetch_add(1, Ordering::Relaxed);
                        metrics.bytes_sent.fetch_add(n as u64, Ordering::Relaxed);
                    }
                    Err(e) => {
                        warn!("UDP send error: {e}");
                        metrics.send_errors.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }

            metrics.frames_sent.fetch_add(1, Ordering::Relaxed);
            frame += 1;

            if last_stats.elapsed() >= stats_interval {
                info!(
                    "[ {:.0}s ] frames={} packets={} errors={} rate={:.1}MB/s",
                    session_start.elapsed().as_secs_f64(),
                    metrics.frames_sent.load(Ordering::Relaxed),
                    metrics.packets_sent.load(Ordering::Relaxed),
                    metrics.send_errors.load(Ordering::Relaxed),
                    metrics.data_rate_mbps(&session_start),
                );
                last_stats = Instant::now();
            }

            if !frame_interval.is_zero() {
                std::thread::sleep(frame_interval);
            }
        }

        info!("\n{}", metrics.summary(&session_start));
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use reach_core::{decode_header, FrameAssembler, FrameState};

    use super::*;

    fn test_config(target: String) -> SimulatorConfig {
        SimulatorConfig {
            target_addr: target,
            nof_signals: 2,
            nof_channels: 1_024,
            nof_frames: Some(2),
            frame_interval_ms: 0,
            shuffle: true,
            seed: Some(42),
            stats_interval_secs: 60,
            ..Default::default()
        }
    }

    #[test]
    fn test_session_streams_assemblable_frames() {
        let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        listener
            .set_read_timeout(Some(Duration::from_millis(500)))
            .unwrap();

        let session = SimulatorSession::new(test_config(addr)).unwrap();
        let layout = session.layout;
        session.run().unwrap();

        // Собираем оба кадра из перемешанных пакетов
        let mut assembler = FrameAssembler::<u64>::new(layout);
        let mut buf = [0u8; 9000];
        let mut frames = Vec::new();

        while let Ok(n) = listener.recv(&mut buf) {
            let datagram = &buf[..n];
            let header = decode_header(datagram).unwrap();
            let payload = header.payload(datagram).unwrap();
            if assembler.write_fragment(&header, payload).unwrap() == FrameState::Complete {
                frames.push(assembler.finalize());
            }
        }

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].timestamp, 1);
        assert_eq!(frames[1].timestamp, 2);

        // Паттерн восстанавливается после всех перестановок
        for (i, spectrum) in frames.iter().enumerate() {
            for signal in 0..2 {
                for channel in 0..1_024 {
                    assert_eq!(
                        spectrum.signal(signal)[channel],
                        u64::pattern(i as u64, signal, channel),
                    );
                }
            }
        }
    }

    #[test]
    fn test_session_metrics_updated() {
        let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let session = SimulatorSession::new(test_config(addr)).unwrap();
        let layout = session.layout;
        let metrics = session.metrics();
        session.run().unwrap();

        let expected_packets = 2 * layout.expected_fragments() as u64;
        assert_eq!(metrics.frames_sent.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.packets_sent.load(Ordering::Relaxed), expected_packets);
        assert_eq!(metrics.send_errors.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_session_stop_flag() {
        let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let mut config = test_config(addr);
        config.nof_frames = None;
        config.frame_interval_ms = 10;

        let session = SimulatorSession::new(config).unwrap();
        let stop = session.stop_flag();
        let metrics = session.metrics();

        let m_clone = metrics.clone();
        std::thread::spawn(move || {
            while m_clone.frames_sent.load(Ordering::Relaxed) < 2 {
                std::thread::sleep(Duration::from_millis(1));
            }
            stop.store(true, Ordering::Relaxed);
        });

        session.run().unwrap();
        assert!(metrics.frames_sent.load(Ordering::Relaxed) >= 2);
    }

    #[test]
    fn test_invalid_geometry_rejected() {
        let mut config = test_config("127.0.0.1:4660".to_string());
        config.nof_signals = 3;

        assert!(SimulatorSession::new(config).is_err());
    }

    #[test]
    fn test_pattern_is_deterministic() {
        let layout = SpectrumLayout::with_packet_size(2, 4, 16).unwrap();

        let a = pattern_spectrum::<u64>(&layout, 7);
        let b = pattern_spectrum::<u64>(&layout, 7);
        assert_eq!(a, b);

        let c = pattern_spectrum::<u64>(&layout, 8);
        assert_ne!(a, c);
    }
}
