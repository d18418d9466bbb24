use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

/// Метрики приёма, обновляемые lock-free из рабочего потока.
#[derive(Debug, Default)]
pub struct ReceiverMetrics {
    pub packets_received: AtomicU64,
    pub packets_invalid: AtomicU64,
    pub packets_malformed: AtomicU64,
    pub packets_rejected: AtomicU64,
    pub frames_completed: AtomicU64,
    pub frames_discarded: AtomicU64,
    pub socket_timeouts: AtomicU64,
    pub bytes_received: AtomicU64,
}

/// Snapshot метрик для отображения / тестирования.
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub duration_secs: f64,
    pub packets_received: u64,
    pub packets_invalid: u64,
    pub packets_malformed: u64,
    pub packets_rejected: u64,
    pub frames_completed: u64,
    pub frames_discarded: u64,
    pub socket_timeouts: u64,
    pub bytes_received: u64,
    pub packet_rate_kpps: f64,
    pub data_rate_mbps: f64,
    pub loss_rate_pct: f64,
}

impl ReceiverMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn packet_rate_kpps(
        &self,
        elapsed: &Instant,
    ) -> f64 {
        let secs = elapsed.elapsed().as_secs_f64();

        if secs < 1e-9 {
            return 0.0;
        }

        self.packets_received.load(Ordering::Relaxed) as f64 / secs / 1_000.0
    }

    /// Скорость приёма в МБ/с.
    pub fn data_rate_mbps(
        &self,
        elapsed: &Instant,
    ) -> f64 {
        let secs = elapsed.elapsed().as_secs_f64();

        if secs < 1e-9 {
            return 0.0;
        }

        self.bytes_received.load(Ordering::Relaxed) as f64 / secs / 1_000_000.0
    }

    /// Процент отброшенных кадров (0.0-100.0).
    pub fn loss_rate_pct(&self) -> f64 {
        let completed = self.frames_completed.load(Ordering::Relaxed);
        let discarded = self.frames_discarded.load(Ordering::Relaxed);
        let total = completed + discarded;

        if total == 0 {
            0.0
        } else {
            discarded as f64 / total as f64 * 100.0
        }
    }

    /// Итоговая сводка для вывода в конце сессии.
    pub fn summary(
        &self,
        elapsed: &Instant,
    ) -> MetricsSummary {
        MetricsSummary {
            duration_secs: elapsed.elapsed().as_secs_f64(),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_invalid: self.packets_invalid.load(Ordering::Relaxed),
            packets_malformed: self.packets_malformed.load(Ordering::Relaxed),
            packets_rejected: self.packets_rejected.load(Ordering::Relaxed),
            frames_completed: self.frames_completed.load(Ordering::Relaxed),
            frames_discarded: self.frames_discarded.load(Ordering::Relaxed),
            socket_timeouts: self.socket_timeouts.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            packet_rate_kpps: self.packet_rate_kpps(elapsed),
            data_rate_mbps: self.data_rate_mbps(elapsed),
            loss_rate_pct: self.loss_rate_pct(),
        }
    }
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(f, "  Duration        : {:.1}s", self.duration_secs)?;
        writeln!(f, "  Packets         : {}", self.packets_received)?;
        writeln!(f, "  Invalid packets : {}", self.packets_invalid)?;
        writeln!(f, "  Malformed hdrs  : {}", self.packets_malformed)?;
        writeln!(f, "  Rejected packets: {}", self.packets_rejected)?;
        writeln!(f, "  Frames complete : {}", self.frames_completed)?;
        writeln!(
            f,
            "  Frames discarded: {} ({:.2}%)",
            self.frames_discarded, self.loss_rate_pct
        )?;
        writeln!(f, "  Socket timeouts : {}", self.socket_timeouts)?;
        writeln!(
            f,
            "  Bytes received  : {:.1} MB",
            self.bytes_received as f64 / 1e6
        )?;
        writeln!(f, "  Packet rate     : {:.1} kpps", self.packet_rate_kpps)?;
        writeln!(f, "  Data rate       : {:.1} MB/s", self.data_rate_mbps)?;
        write!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")
    }
}
