//! Передающая сторона протокола: прямая аппаратная перестановка и
//! нарезка кадра на wire-пакеты.
//!
//! Нужна симулятору и тестам: настоящий источник кадров — прошивка TPM.
//! Перестановки здесь — точная обратная к [`crate::FrameAssembler`]:
//! что закодировано `build_frame_packets`, то приёмник соберёт
//! бит-в-бит.

use reach_types::{
    CaptureMode, Sample, SpeadError, SpeadResult, SpectrumLayout, NOF_LANES,
};

use crate::{
    frame::{bit_reversed_channel, descrambled_channel},
    protocol::PacketHeader,
};

/// Кодирует кадр спектра `[сигнал][канал]` в готовые UDP-датаграммы.
///
/// На каждый фрагмент — заголовок из 9 слов (всегда с маркером 0x3300,
/// payload со смещения 72) плюс little-endian payload. Порядок пакетов
/// в результате детерминирован; перемешивание — забота отправителя.
pub fn build_frame_packets<T: Sample>(
    layout: &SpectrumLayout,
    sync_time: u64,
    timestamp: u64,
    spectrum: &[T],
) -> SpeadResult<Vec<Vec<u8>>> {
    let channels = layout.nof_channels;
    let spf = layout.signals_per_fpga();

    if spectrum.len() != layout.nof_signals * channels {
        return Err(SpeadError::InvalidLayout(format!(
            "spectrum of {} samples does not match layout ({} expected)",
            spectrum.len(),
            layout.nof_signals * channels
        )));
    }

    let mut packets = Vec::with_capacity(layout.expected_fragments());
    let words_per_packet = layout.words_per_packet();
    let fragments_per_lane = layout.lane_len() / words_per_packet;
    let mut packet_counter = 0u32;

    for lane in 0..NOF_LANES {
        // Прямая перестановка: индекс в линии → (сигнал, канал на проводе)
        let mut lane_buf = vec![T::default(); layout.lane_len()];
        for (n, slot) in lane_buf.iter_mut().enumerate() {
            let signal = (n % spf) + spf * lane;
            let mut channel = n / spf;
            if spf != 1 {
                channel = descrambled_channel(channel, channels);
            }
            if T::FLOATING_POINT {
                channel = bit_reversed_channel(channel, channels);
            }
            *slot = spectrum[signal * channels + channel];
        }

        for fragment in 0..fragments_per_lane {
            let word_offset = fragment * words_per_packet;
            let header = PacketHeader {
                packet_counter: packet_counter & 0xFF_FFFF,
                logical_channel_id: 0,
                payload_length: layout.bytes_per_packet,
                sync_time,
                timestamp,
                capture_mode: CaptureMode {
                    floating_point: T::FLOATING_POINT,
                    sub_mode: 0,
                },
                start_channel_id: (word_offset / spf) as u16,
                start_antenna_id: (lane * spf) as u16,
                buffer_id: 0,
                payload_offset: crate::protocol::PAYLOAD_OFFSET_BASE,
            };

            let mut packet = Vec::with_capacity(header.encode().len() + layout.bytes_per_packet);
            packet.extend_from_slice(&header.encode());
            for value in &lane_buf[word_offset..word_offset + words_per_packet] {
                packet.extend_from_slice(&value.to_le_bytes());
            }

            packets.push(packet);
            packet_counter += 1;
        }
    }

    Ok(packets)
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        frame::{FrameAssembler, FrameState},
        protocol::decode_header,
    };

    #[test]
    fn test_packet_count_matches_layout() {
        let layout = SpectrumLayout::with_packet_size(2, 4, 16).unwrap();
        let spectrum: Vec<u64> = (0..8).collect();

        let packets = build_frame_packets(&layout, 0, 1, &spectrum).unwrap();
        assert_eq!(packets.len(), layout.expected_fragments());
    }

    #[test]
    fn test_wrong_spectrum_size_rejected() {
        let layout = SpectrumLayout::with_packet_size(2, 4, 16).unwrap();
        let spectrum: Vec<u64> = (0..5).collect();

        assert!(build_frame_packets(&layout, 0, 1, &spectrum).is_err());
    }

    #[test]
    fn test_headers_carry_frame_metadata() {
        let layout = SpectrumLayout::with_packet_size(2, 4, 16).unwrap();
        let spectrum: Vec<u64> = (0..8).collect();

        let packets = build_frame_packets(&layout, 1_600_000_000, 77, &spectrum).unwrap();

        for packet in &packets {
            let header = decode_header(packet).unwrap();
            assert_eq!(header.timestamp, 77);
            assert_eq!(header.sync_time, 1_600_000_000);
            assert_eq!(header.payload_length, 16);
            assert!(!header.capture_mode.floating_point);
        }
    }

    #[test]
    fn test_encode_then_assemble_is_identity_fixed_point() {
        // Что передали — то и собрали, spf=1
        let layout = SpectrumLayout::with_packet_size(2, 8, 32).unwrap();
        let spectrum: Vec<u64> = (0..16).map(|v| v * 1000 + 3).collect();

        let packets = build_frame_packets(&layout, 42, 9, &spectrum).unwrap();
        let mut asm = FrameAssembler::<u64>::new(layout);

        let mut completed = false;
        for packet in &packets {
            let header = decode_header(packet).unwrap();
            let payload = header.payload(packet).unwrap();
            if asm.write_fragment(&header, payload).unwrap() == FrameState::Complete {
                completed = true;
            }
        }

        assert!(completed, "кадр обязан собраться из всех фрагментов");
        let result = asm.finalize();
        assert_eq!(result.as_flat(), &spectrum[..]);
        assert_eq!(result.timestamp, 9);
    }

    #[test]
    fn test_encode_then_assemble_is_identity_multiplexed() {
        // spf=2: demux + descramble должны точно обратить кодирование
        let layout = SpectrumLayout::with_packet_size(4, 8, 32).unwrap();
        let spectrum: Vec<u64> = (0..32).map(|v| v * 7 + 1).collect();

        let packets = build_frame_packets(&layout, 0, 3, &spectrum).unwrap();
        assert_eq!(packets.len(), layout.expected_fragments());

        let mut asm = FrameAssembler::<u64>::new(layout);
        let mut completed = false;
        for packet in &packets {
            let header = decode_header(packet).unwrap();
            let payload = header.payload(packet).unwrap();
            if asm.write_fragment(&header, payload).unwrap() == FrameState::Complete {
                completed = true;
            }
        }

        assert!(completed);
        assert_eq!(asm.finalize().as_flat(), &spectrum[..]);
    }

    #[test]
    fn test_encode_then_assemble_is_identity_floating_point() {
        // floating point добавляет bit-reversal поверх остальных перестановок
        let layout = SpectrumLayout::with_packet_size(4, 16, 64).unwrap();
        let spectrum: Vec<f64> = (0..64).map(|v| v as f64 * 0.25 - 3.0).collect();

        let packets = build_frame_packets(&layout, 0, 12, &spectrum).unwrap();
        let mut asm = FrameAssembler::<f64>::new(layout);

        let mut completed = false;
        for packet in &packets {
            let header = decode_header(packet).unwrap();
            let payload = header.payload(packet).unwrap();
            if asm.write_fragment(&header, payload).unwrap() == FrameState::Complete {
                completed = true;
            }
        }

        assert!(completed);
        assert_eq!(asm.finalize().as_flat(), &spectrum[..]);
    }
}
