use std::{
    net::{SocketAddr, UdpSocket},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use crossbeam_channel::Receiver;
use log::{debug, info, warn};
use socket2::{Domain, Protocol, Socket, Type};

use reach_core::{decode_header, FrameAssembler, FrameState, MAX_DATAGRAM_BYTES};
use reach_types::{Sample, SpeadError, Spectrum, SpectrumLayout};

use crate::{
    metrics::ReceiverMetrics, ReceiverConfig, ReceiverError, ReceiverResult,
};

/// Результат сессии захвата: unix-времена кадров и сами спектры.
/// Длины векторов всегда совпадают; при остановке по stop-флагу
/// возвращается то, что успели собрать.
pub type CaptureResult<T> = (Vec<f64>, Vec<Spectrum<T>>);

/// Активная сессия рабочего потока: handle + канал с готовыми кадрами.
struct Worker<T: Sample> {
    handle: JoinHandle<ReceiverResult<usize>>,
    spectra_rx: Receiver<(f64, Spectrum<T>)>,
}

/// Приёмник спектров: владеет UDP-сокетом и, на время сессии захвата,
/// рабочим потоком.
///
/// Тип выборки `T` фиксирует режим прошивки на этапе компиляции:
/// `SpectrumReceiver<u64>` для fixed point, `SpectrumReceiver<f64>`
/// для floating point. Пакет с другим capture mode — фатальная ошибка
/// сессии, а не тихий пропуск.
pub struct SpectrumReceiver<T: Sample> {
    config: ReceiverConfig,
    layout: SpectrumLayout,
    socket: Option<UdpSocket>,
    metrics: Arc<ReceiverMetrics>,
    stop_flag: Arc<AtomicBool>,
    worker: Option<Worker<T>>,
}

impl<T: Sample> SpectrumReceiver<T> {
    /// Создаёт приёмник, валидируя геометрию из конфигурации.
    /// Сокет не открывается до вызова [`initialise`](Self::initialise).
    pub fn new(config: ReceiverConfig) -> ReceiverResult<Self> {
        let layout = config.layout()?;

        Ok(Self {
            config,
            layout,
            socket: None,
            metrics: ReceiverMetrics::new(),
            stop_flag: Arc::new(AtomicBool::new(false)),
            worker: None,
        })
    }

    /// Shared-ссылка на метрики приёма.
    pub fn metrics(&self) -> Arc<ReceiverMetrics> {
        self.metrics.clone()
    }

    /// Флаг остановки. Установка в `true` завершает текущую сессию
    /// с частичным результатом; по завершении сессии флаг сбрасывается,
    /// и приёмник готов к следующей.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    /// Геометрия, с которой работает приёмник.
    pub fn layout(&self) -> SpectrumLayout {
        self.layout
    }

    /// Фактический адрес сокета (порт 0 в конфигурации — эфемерный).
    pub fn local_addr(&self) -> ReceiverResult<SocketAddr> {
        let socket = self.socket.as_ref().ok_or(ReceiverError::NotInitialised)?;
        Ok(socket.local_addr()?)
    }

    /// Открывает UDP-сокет: увеличенный SO_RCVBUF под burst прошивки
    /// и таймаут чтения, чтобы stop-флаг проверялся регулярно.
    pub fn initialise(&mut self) -> ReceiverResult<()> {
        let addr = SocketAddr::new(self.config.ip, self.config.port);

        let (socket, actual) = open_socket(addr, &self.config)
            .map_err(|source| ReceiverError::SocketBind { addr, source })?;

        // Ядро могло урезать запрошенный буфер (rmem_max)
        if actual < self.config.recv_buffer_bytes {
            warn!(
                "SO_RCVBUF clamped by kernel: requested {} bytes, got {actual}",
                self.config.recv_buffer_bytes
            );
        }

        info!(
            "Listening on {} (recv buffer {} bytes)",
            socket.local_addr()
                .map_err(|source| ReceiverError::SocketBind { addr, source })?,
            actual
        );

        self.socket = Some(socket);
        Ok(())
    }

    /// Синхронный приём одного спектра. Блокируется до первого
    /// собранного кадра; прерывание stop-флагом — [`ReceiverError::Cancelled`].
    pub fn receive_spectrum(&mut self) -> ReceiverResult<Spectrum<T>> {
        let (_, mut spectra) = self.receive_spectra(1)?;
        spectra.pop().ok_or(ReceiverError::Cancelled)
    }

    /// Синхронный приём: блокируется, пока не соберёт `nof_spectra`
    /// кадров (или пока не взведут stop-флаг).
    pub fn receive_spectra(
        &mut self,
        nof_spectra: usize,
    ) -> ReceiverResult<CaptureResult<T>> {
        let socket = self.socket.as_ref().ok_or(ReceiverError::NotInitialised)?;

        let mut unix_times = Vec::with_capacity(nof_spectra);
        let mut spectra = Vec::with_capacity(nof_spectra);

        let result = receive_loop::<T, _>(
            socket,
            self.layout,
            nof_spectra,
            self.metrics.clone(),
            self.stop_flag.clone(),
            Duration::from_secs(self.config.stats_interval_secs),
            |unix_time, spectrum| {
                unix_times.push(unix_time);
                spectra.push(spectrum);
            },
        );

        // Флаг относится только к завершившейся сессии
        self.stop_flag.store(false, Ordering::SeqCst);
        result?;

        Ok((unix_times, spectra))
    }

    /// Запускает рабочий поток, собирающий `nof_spectra` кадров.
    /// Возвращает управление сразу; результат забирается через
    /// [`wait_for_receiver`](Self::wait_for_receiver).
    pub fn start_receiver(
        &mut self,
        nof_spectra: usize,
    ) -> ReceiverResult<()> {
        if self.worker.is_some() {
            return Err(ReceiverError::ReceiverBusy);
        }

        let socket = self
            .socket
            .as_ref()
            .ok_or(ReceiverError::NotInitialised)?
            .try_clone()?;
        let layout = self.layout;
        let metrics = self.metrics.clone();
        let stop_flag = self.stop_flag.clone();
        let stats_interval = Duration::from_secs(self.config.stats_interval_secs);

        // Готовые кадры уходят из потока сразу, не дожидаясь join
        let (tx, spectra_rx) = crossbeam_channel::bounded(nof_spectra.max(1));

        debug!("Starting capture worker for {nof_spectra} spectra");

        let handle = std::thread::spawn(move || {
            receive_loop::<T, _>(
                &socket,
                layout,
                nof_spectra,
                metrics,
                stop_flag,
                stats_interval,
                |unix_time, spectrum| {
                    if tx.send((unix_time, spectrum)).is_err() {
                        warn!("Capture consumer dropped, spectrum lost");
                    }
                },
            )
        });

        self.worker = Some(Worker { handle, spectra_rx });
        Ok(())
    }

    /// Дожидается завершения рабочего потока и возвращает собранные
    /// спектры с их unix-временами.
    pub fn wait_for_receiver(&mut self) -> ReceiverResult<CaptureResult<T>> {
        let worker = self.worker.take().ok_or(ReceiverError::ReceiverNotStarted)?;

        let joined = worker
            .handle
            .join()
            .map_err(|_| ReceiverError::Worker("capture thread panicked".into()));

        // Рабочий поток завершён, его флаг остановки больше не действует
        self.stop_flag.store(false, Ordering::SeqCst);

        let collected = joined??;

        let mut unix_times = Vec::with_capacity(collected);
        let mut spectra = Vec::with_capacity(collected);

        while let Ok((unix_time, spectrum)) = worker.spectra_rx.try_recv() {
            unix_times.push(unix_time);
            spectra.push(spectrum);
        }

        Ok((unix_times, spectra))
    }

    /// Текущая сессия активна?
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Просит текущую сессию завершиться с частичным результатом.
    /// Не выводит приёмник из строя: следующая сессия стартует с чистым
    /// флагом.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}

fn open_socket(
    addr: SocketAddr,
    config: &ReceiverConfig,
) -> std::io::Result<(UdpSocket, usize)> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_recv_buffer_size(config.recv_buffer_bytes)?;
    socket.set_read_timeout(Some(Duration::from_secs(config.read_timeout_secs)))?;
    socket.bind(&addr.into())?;

    let actual = socket.recv_buffer_size()?;
    Ok((socket.into(), actual))
}

/// Цикл приёма: датаграмма → заголовок → фрагмент → кадр.
///
/// Восстановимые ошибки протокола (обрезанный пакет, чужой трафик на
/// порту) отбрасывают датаграмму и идут дальше; ошибка режима или
/// геометрии завершает сессию. Возвращает число собранных кадров.
#[allow(clippy::too_many_arguments)]
fn receive_loop<T, F>(
    socket: &UdpSocket,
    layout: SpectrumLayout,
    nof_spectra: usize,
    metrics: Arc<ReceiverMetrics>,
    stop_flag: Arc<AtomicBool>,
    stats_interval: Duration,
    mut on_spectrum: F,
) -> ReceiverResult<usize>
where
    T: Sample,
    F: FnMut(f64, Spectrum<T>),
{
    let mut assembler = FrameAssembler::<T>::new(layout);
    let mut buf = [0u8; MAX_DATAGRAM_BYTES];
    let mut collected = 0usize;

    let session_start = Instant::now();
    let mut last_stats = Instant::now();

    while collected < nof_spectra {
        if stop_flag.load(Ordering::Relaxed) {
            info!("Stop signal received: returning {collected} of {nof_spectra} spectra");
            break;
        }

        let nof_bytes = match socket.recv(&mut buf) {
            Ok(n) => n,
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                metrics.socket_timeouts.fetch_add(1, Ordering::Relaxed);
                debug!("Socket read timeout, waiting for data...");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        metrics.packets_received.fetch_add(1, Ordering::Relaxed);
        metrics
            .bytes_received
            .fetch_add(nof_bytes as u64, Ordering::Relaxed);

        let datagram = &buf[..nof_bytes];

        let header = match decode_header(datagram) {
            Ok(h) => h,
            Err(e @ (SpeadError::MalformedHeader { .. } | SpeadError::MissingHeaderItem(_))) => {
                // Магия на месте, но заголовок битый — это уже не шум
                metrics.packets_malformed.fetch_add(1, Ordering::Relaxed);
                warn!("Dropping malformed packet: {e}");
                continue;
            }
            Err(e) => {
                metrics.packets_invalid.fetch_add(1, Ordering::Relaxed);
                debug!("Dropping datagram: {e}");
                continue;
            }
        };

        let payload = match header.payload(datagram) {
            Ok(p) => p,
            Err(e) => {
                metrics.packets_invalid.fetch_add(1, Ordering::Relaxed);
                debug!("Dropping datagram: {e}");
                continue;
            }
        };

        match assembler.write_fragment(&header, payload) {
            Ok(FrameState::Accumulating) => {}
            Ok(FrameState::Restarted) => {
                metrics.frames_discarded.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Frame restarted at timestamp {}: previous frame incomplete",
                    header.timestamp
                );
            }
            Ok(FrameState::Complete) => {
                let spectrum = assembler.finalize();
                metrics.frames_completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Frame complete: timestamp={} unix_time={:.6}",
                    spectrum.timestamp,
                    spectrum.unix_time()
                );
                collected += 1;
                on_spectrum(spectrum.unix_time(), spectrum);
            }
            Err(e) if e.is_recoverable() => {
                metrics.packets_rejected.fetch_add(1, Ordering::Relaxed);
                debug!("Rejecting fragment: {e}");
            }
            Err(e) => {
                warn!("Fatal protocol error, aborting capture: {e}");
                return Err(e.into());
            }
        }

        if last_stats.elapsed() >= stats_interval {
            info!(
                "[ {:.0}s ] packets={} frames={collected}/{nof_spectra} discarded={} rate={:.1}MB/s",
                session_start.elapsed().as_secs_f64(),
                metrics.packets_received.load(Ordering::Relaxed),
                metrics.frames_discarded.load(Ordering::Relaxed),
                metrics.data_rate_mbps(&session_start),
            );
            last_stats = Instant::now();
        }
    }

    Ok(collected)
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
