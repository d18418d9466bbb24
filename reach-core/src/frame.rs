//! Пересборка кадра спектра из фрагментов.
//!
//! Прошивка режет кадр на фрагменты фиксированного размера и шлёт их
//! по UDP без гарантий порядка. Явного маркера конца кадра нет — кадр
//! считается собранным, когда счётчик принятых фрагментов достигает
//! ожидаемого числа. Фрагмент с новым timestamp молча хоронит
//! недособранный кадр: очереди кадров не существует.

use reach_types::{
    Sample, SpeadError, SpeadResult, Spectrum, SpectrumLayout, BYTES_PER_SAMPLE, NOF_LANES,
};

use crate::protocol::PacketHeader;

/// Состояние сборки после очередного фрагмента.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Кадр ещё накапливается
    Accumulating,
    /// Фрагмент принёс новый timestamp — частичный кадр отброшен
    Restarted,
    /// Все фрагменты на месте, можно вызывать [`FrameAssembler::finalize`]
    Complete,
}

/// Обратная перестановка чётно/нечётного разбиения каналов FFT.
///
/// Канализатор выдаёт каналы в расщеплённом виде: чётный индекс `n`
/// уходит в `n/2`, нечётный — в `n/2 + C/2`.
pub fn descrambled_channel(
    n: usize,
    nof_channels: usize,
) -> usize {
    if n % 2 == 0 {
        n / 2
    } else {
        n / 2 + nof_channels / 2
    }
}

/// Бит-реверсная перестановка выхода decimation-in-frequency FFT
/// над log2(C) битами индекса.
pub fn bit_reversed_channel(
    n: usize,
    nof_channels: usize,
) -> usize {
    if nof_channels <= 1 {
        return n;
    }

    let bits = nof_channels.trailing_zeros();
    n.reverse_bits() >> (usize::BITS - bits)
}

/// Сборщик кадров: двухлинейный staging-буфер + детектор полноты.
///
/// Владеет буфером единолично, между кадрами переиспользует память.
/// Дубликаты фрагментов не отслеживаются: повторная доставка молча
/// перезаписывает данные и засчитывается в счётчик — поведение
/// унаследовано от прошивочной утилиты, см. DESIGN.md.
pub struct FrameAssembler<T: Sample> {
    layout: SpectrumLayout,
    lanes: Vec<Vec<T>>,
    received_fragments: usize,
    previous_timestamp: u64,
    sync_time: u64,
    timestamp: u64,
}

impl<T: Sample> FrameAssembler<T> {
    pub fn new(layout: SpectrumLayout) -> Self {
        Self {
            layout,
            lanes: vec![vec![T::default(); layout.lane_len()]; NOF_LANES],
            received_fragments: 0,
            previous_timestamp: 0,
            sync_time: 0,
            timestamp: 0,
        }
    }

    pub fn layout(&self) -> &SpectrumLayout {
        &self.layout
    }

    /// Фрагментов принято для текущего кадра.
    pub fn received_fragments(&self) -> usize {
        self.received_fragments
    }

    /// Записывает payload фрагмента в staging-буфер и отслеживает
    /// полноту кадра.
    ///
    /// Пакет от неожиданного источника (линия вне диапазона, фрагмент
    /// за границей буфера) отклоняется без инкремента счётчика.
    /// Несовпадение режима захвата с типом `T` — фатальная ошибка.
    pub fn write_fragment(
        &mut self,
        header: &PacketHeader,
        payload: &[u8],
    ) -> SpeadResult<FrameState> {
        if header.capture_mode.floating_point != T::FLOATING_POINT {
            return Err(SpeadError::ModeMismatch {
                firmware: header.capture_mode.floating_point,
                configured: T::FLOATING_POINT,
            });
        }

        if payload.len() < header.payload_length {
            return Err(SpeadError::TruncatedPayload {
                have: payload.len(),
                need: header.payload_length,
            });
        }

        let spf = self.layout.signals_per_fpga();
        let lane = header.start_antenna_id as usize / spf;
        let offset = header.start_channel_id as usize * spf;
        let words = header.payload_length / BYTES_PER_SAMPLE;

        if lane >= NOF_LANES || offset + words > self.layout.lane_len() {
            return Err(SpeadError::LaneOutOfRange {
                antenna: header.start_antenna_id,
                channel: header.start_channel_id,
            });
        }

        let dst = &mut self.lanes[lane][offset..offset + words];
        for (slot, chunk) in dst.iter_mut().zip(payload.chunks_exact(BYTES_PER_SAMPLE)) {
            *slot = T::from_le_bytes(chunk.try_into().expect("chunks_exact(8)"));
        }

        self.received_fragments += 1;

        // Новый timestamp — предыдущий кадр не дособрался и отбрасывается
        let mut state = FrameState::Accumulating;
        if self.previous_timestamp != header.timestamp {
            if self.received_fragments > 1 {
                state = FrameState::Restarted;
            }
            self.received_fragments = 1;
            self.previous_timestamp = header.timestamp;
        }

        self.sync_time = header.sync_time;
        self.timestamp = header.timestamp;

        if self.received_fragments == self.layout.expected_fragments() {
            self.received_fragments = 0;
            return Ok(FrameState::Complete);
        }

        Ok(state)
    }

    /// Превращает staging-буфер в канонический спектр `[сигнал][канал]`.
    ///
    /// Порядок преобразований фиксирован прошивкой:
    /// 1. De-multiplex: сигналы, чередованные внутри линии, разводятся
    ///    по строкам (тождественно при одном сигнале на линию).
    /// 2. De-scramble чётно/нечётного разбиения (в одноканальном режиме
    ///    прошивка каналы не перемешивает — пропускается).
    /// 3. Bit-reversal — только для floating point.
    pub fn finalize(&mut self) -> Spectrum<T> {
        let spf = self.layout.signals_per_fpga();
        let channels = self.layout.nof_channels;
        let signals = self.layout.nof_signals;

        // De-multiplex
        let mut data = vec![T::default(); signals * channels];
        if spf == 1 {
            for (lane, row) in self.lanes.iter().enumerate() {
                data[lane * channels..(lane + 1) * channels].copy_from_slice(row);
            }
        } else {
            for (lane, row) in self.lanes.iter().enumerate() {
                for (n, &value) in row.iter().enumerate() {
                    let signal = (n % spf) + spf * lane;
                    let channel = n / spf;
                    data[signal * channels + channel] = value;
                }
            }
        }

        // De-scramble
        if spf != 1 {
            let mut descrambled = vec![T::default(); signals * channels];
            for signal in 0..signals {
                for n in 0..channels {
                    let channel = descrambled_channel(n, channels);
                    descrambled[signal * channels + channel] = data[signal * channels + n];
                }
            }
            data = descrambled;
        }

        // Bit-reversal
        if T::FLOATING_POINT {
            let mut reversed = vec![T::default(); signals * channels];
            for signal in 0..signals {
                for n in 0..channels {
                    let channel = bit_reversed_channel(n, channels);
                    reversed[signal * channels + channel] = data[signal * channels + n];
                }
            }
            data = reversed;
        }

        for lane in &mut self.lanes {
            lane.fill(T::default());
        }

        Spectrum::new(&self.layout, self.timestamp, self.sync_time, data)
    }

    /// Полный сброс состояния сборки.
    pub fn reset(&mut self) {
        self.received_fragments = 0;
        self.previous_timestamp = 0;
        self.sync_time = 0;
        self.timestamp = 0;

        for lane in &mut self.lanes {
            lane.fill(T::default());
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use reach_types::CaptureMode;

    use super::*;
    use crate::protocol::PAYLOAD_OFFSET_BASE;

    /// Урезанный кадр: 2 сигнала, 4 канала, spf=1, 4 фрагмента по 16 байт.
    fn small_layout() -> SpectrumLayout {
        SpectrumLayout::with_packet_size(2, 4, 16).unwrap()
    }

    fn fragment_header(
        layout: &SpectrumLayout,
        timestamp: u64,
        antenna: u16,
        channel: u16,
        floating_point: bool,
    ) -> PacketHeader {
        PacketHeader {
            packet_counter: 0,
            logical_channel_id: 0,
            payload_length: layout.bytes_per_packet,
            sync_time: 1_600_000_000,
            timestamp,
            capture_mode: CaptureMode::from_raw(if floating_point { 0x80 } else { 0 }),
            start_channel_id: channel,
            start_antenna_id: antenna,
            buffer_id: 0,
            payload_offset: PAYLOAD_OFFSET_BASE,
        }
    }

    fn payload_from(values: &[u64]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_frame_completes_exactly_once() {
        let layout = small_layout();
        let mut asm = FrameAssembler::<u64>::new(layout);

        // 4 уникальных фрагмента одного timestamp
        let fragments = [(0u16, 0u16), (0, 2), (1, 0), (1, 2)];
        let payload = payload_from(&[1, 2]);

        for (i, (antenna, channel)) in fragments.iter().enumerate() {
            let header = fragment_header(&layout, 5, *antenna, *channel, false);
            let state = asm.write_fragment(&header, &payload).unwrap();

            if i == fragments.len() - 1 {
                assert_eq!(state, FrameState::Complete);
            } else {
                assert_ne!(state, FrameState::Complete);
            }
        }

        // Счётчик обнулён — кадр не сообщается дважды
        assert_eq!(asm.received_fragments(), 0);
    }

    #[test]
    fn test_timestamp_rollover_discards_partial_frame() {
        let layout = small_layout();
        let mut asm = FrameAssembler::<u64>::new(layout);
        let payload = payload_from(&[0, 0]);

        // Два фрагмента кадра T
        let h = fragment_header(&layout, 10, 0, 0, false);
        asm.write_fragment(&h, &payload).unwrap();
        let h = fragment_header(&layout, 10, 0, 2, false);
        asm.write_fragment(&h, &payload).unwrap();
        assert_eq!(asm.received_fragments(), 2);

        // Фрагмент кадра T+1 — частичный кадр T отброшен, счёт с единицы
        let h = fragment_header(&layout, 11, 0, 0, false);
        let state = asm.write_fragment(&h, &payload).unwrap();

        assert_eq!(state, FrameState::Restarted);
        assert_eq!(asm.received_fragments(), 1);
    }

    #[test]
    fn test_rollover_never_reports_old_frame_complete() {
        let layout = small_layout();
        let mut asm = FrameAssembler::<u64>::new(layout);
        let payload = payload_from(&[0, 0]);

        // 3 из 4 фрагментов кадра T
        for (antenna, channel) in [(0u16, 0u16), (0, 2), (1, 0)] {
            let h = fragment_header(&layout, 20, antenna, channel, false);
            let state = asm.write_fragment(&h, &payload).unwrap();
            assert_ne!(state, FrameState::Complete);
        }

        // Кадр T+1 целиком: завершиться должен именно он
        for (i, (antenna, channel)) in [(0u16, 0u16), (0, 2), (1, 0), (1, 2)]
            .iter()
            .enumerate()
        {
            let h = fragment_header(&layout, 21, *antenna, *channel, false);
            let state = asm.write_fragment(&h, &payload).unwrap();
            assert_eq!(state == FrameState::Complete, i == 3);
        }
    }

    #[test]
    fn test_lane_out_of_range_rejected_without_count() {
        let layout = small_layout();
        let mut asm = FrameAssembler::<u64>::new(layout);
        let payload = payload_from(&[0, 0]);

        // Антенна 5 при spf=1 — линия 5, таких FPGA в приборе нет
        let h = fragment_header(&layout, 1, 5, 0, false);
        let err = asm.write_fragment(&h, &payload).unwrap_err();

        assert!(matches!(err, SpeadError::LaneOutOfRange { antenna: 5, .. }));
        assert_eq!(asm.received_fragments(), 0, "счётчик не должен расти");
    }

    #[test]
    fn test_fragment_overrunning_lane_rejected() {
        let layout = small_layout();
        let mut asm = FrameAssembler::<u64>::new(layout);
        let payload = payload_from(&[0, 0]);

        // Канал 3 при 2 словах payload вылезает за границу линии (4 слова)
        let h = fragment_header(&layout, 1, 0, 3, false);
        let err = asm.write_fragment(&h, &payload).unwrap_err();

        assert!(matches!(err, SpeadError::LaneOutOfRange { .. }));
    }

    #[test]
    fn test_mode_mismatch_is_error() {
        let layout = small_layout();
        let mut asm = FrameAssembler::<u64>::new(layout);
        let payload = payload_from(&[0, 0]);

        // Прошивка говорит floating point, приёмник собран под u64
        let h = fragment_header(&layout, 1, 0, 0, true);
        let err = asm.write_fragment(&h, &payload).unwrap_err();

        assert!(matches!(
            err,
            SpeadError::ModeMismatch {
                firmware: true,
                configured: false
            }
        ));
        assert_eq!(asm.received_fragments(), 0);
    }

    #[test]
    fn test_duplicate_fragment_still_counts() {
        // Референсное поведение: дедупликации нет, повторный фрагмент
        // засчитывается и может преждевременно "завершить" кадр
        let layout = small_layout();
        let mut asm = FrameAssembler::<u64>::new(layout);
        let payload = payload_from(&[7, 7]);

        let h = fragment_header(&layout, 3, 0, 0, false);
        for _ in 0..3 {
            asm.write_fragment(&h, &payload).unwrap();
        }

        let state = asm.write_fragment(&h, &payload).unwrap();
        assert_eq!(state, FrameState::Complete);
    }

    #[test]
    fn test_demux_undoes_interleave() {
        // spf=2: линия [0,1,2,3,4,5,6,7] разводится в
        // signal0=[0,2,4,6], signal1=[1,3,5,7] до descramble
        let layout = SpectrumLayout::with_packet_size(4, 4, 64).unwrap();
        assert_eq!(layout.signals_per_fpga(), 2);
        assert_eq!(layout.expected_fragments(), 2);

        let mut asm = FrameAssembler::<u64>::new(layout);

        // Одна линия = один фрагмент из 8 слов
        let h = fragment_header(&layout, 9, 0, 0, false);
        asm.write_fragment(&h, &payload_from(&[0, 1, 2, 3, 4, 5, 6, 7]))
            .unwrap();
        let h = fragment_header(&layout, 9, 2, 0, false);
        let state = asm
            .write_fragment(&h, &payload_from(&[10, 11, 12, 13, 14, 15, 16, 17]))
            .unwrap();
        assert_eq!(state, FrameState::Complete);

        let spectrum = asm.finalize();

        // После demux: s0=[0,2,4,6]; descramble при C=4: n→{0:0,1:2,2:1,3:3}
        // т.е. [a,b,c,d] → [a,c,b,d]
        assert_eq!(spectrum.signal(0), &[0, 4, 2, 6]);
        assert_eq!(spectrum.signal(1), &[1, 5, 3, 7]);
        assert_eq!(spectrum.signal(2), &[10, 14, 12, 16]);
        assert_eq!(spectrum.signal(3), &[11, 15, 13, 17]);
    }

    #[test]
    fn test_descramble_map() {
        // C=8: нечётный 3 → 3/2 + 4 = 5; чётный 2 → 1
        assert_eq!(descrambled_channel(3, 8), 5);
        assert_eq!(descrambled_channel(2, 8), 1);
        assert_eq!(descrambled_channel(0, 8), 0);
        assert_eq!(descrambled_channel(7, 8), 7);
    }

    #[test]
    fn test_descramble_is_permutation() {
        let mut seen = [false; 16];
        for n in 0..16 {
            seen[descrambled_channel(n, 16)] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_bit_reversal_map() {
        // C=16 (4 бита): 0b0001 → 0b1000
        assert_eq!(bit_reversed_channel(1, 16), 8);
        assert_eq!(bit_reversed_channel(0, 16), 0);
        assert_eq!(bit_reversed_channel(0b0110, 16), 0b0110);
        assert_eq!(bit_reversed_channel(0b0011, 16), 0b1100);
    }

    #[test]
    fn test_bit_reversal_involution() {
        for n in 0..64 {
            assert_eq!(bit_reversed_channel(bit_reversed_channel(n, 64), 64), n);
        }
    }

    #[test]
    fn test_single_signal_mode_skips_descramble() {
        // spf=1: лишь тождественная раскладка линий по строкам
        let layout = small_layout();
        let mut asm = FrameAssembler::<u64>::new(layout);

        for (antenna, channel, values) in [
            (0u16, 0u16, [100u64, 101]),
            (0, 2, [102, 103]),
            (1, 0, [200, 201]),
            (1, 2, [202, 203]),
        ] {
            let h = fragment_header(&layout, 4, antenna, channel, false);
            asm.write_fragment(&h, &payload_from(&values)).unwrap();
        }

        let spectrum = asm.finalize();
        assert_eq!(spectrum.signal(0), &[100, 101, 102, 103]);
        assert_eq!(spectrum.signal(1), &[200, 201, 202, 203]);
        assert_eq!(spectrum.timestamp, 4);
        assert_eq!(spectrum.sync_time, 1_600_000_000);
    }

    #[test]
    fn test_floating_point_applies_bit_reversal() {
        let layout = small_layout();
        let mut asm = FrameAssembler::<f64>::new(layout);

        let values: [[f64; 2]; 4] = [[0.0, 1.0], [2.0, 3.0], [10.0, 11.0], [12.0, 13.0]];
        let coords = [(0u16, 0u16), (0, 2), (1, 0), (1, 2)];

        for ((antenna, channel), vals) in coords.iter().zip(values.iter()) {
            let payload: Vec<u8> = vals.iter().flat_map(|v| v.to_le_bytes()).collect();
            let h = fragment_header(&layout, 6, *antenna, *channel, true);
            asm.write_fragment(&h, &payload).unwrap();
        }

        let spectrum = asm.finalize();

        // C=4 (2 бита): перестановка 0→0, 1→2, 2→1, 3→3
        assert_eq!(spectrum.signal(0), &[0.0, 2.0, 1.0, 3.0]);
        assert_eq!(spectrum.signal(1), &[10.0, 12.0, 11.0, 13.0]);
    }

    #[test]
    fn test_reset_clears_state() {
        let layout = small_layout();
        let mut asm = FrameAssembler::<u64>::new(layout);
        let payload = payload_from(&[1, 2]);

        let h = fragment_header(&layout, 8, 0, 0, false);
        asm.write_fragment(&h, &payload).unwrap();
        asm.reset();

        assert_eq!(asm.received_fragments(), 0);
    }
}
