//! Разбор заголовков SPEAD-подобных датаграмм.
//!
//! Каждая датаграмма начинается с 9 big-endian 64-битных слов вида
//! `(id:16, value:48)`. Payload — упакованные little-endian 8-байтовые
//! выборки, начинающиеся со смещения 104 (или 72, если присутствует
//! маркер 0x3300).

use byteorder::{BigEndian, ByteOrder};
use reach_types::{CaptureMode, SpeadError, SpeadResult};

/// Слов в заголовке.
pub const HEADER_WORDS: usize = 9;

/// Минимальный размер датаграммы — заголовок целиком.
pub const HEADER_BYTES: usize = HEADER_WORDS * 8;

/// Смещение payload без маркера 0x3300 (заголовок с расширением).
pub const PAYLOAD_OFFSET_EXTENDED: usize = 104;

/// Смещение payload при наличии маркера 0x3300.
pub const PAYLOAD_OFFSET_BASE: usize = 72;

/// Максимальный размер датаграммы, который имеет смысл принимать.
pub const MAX_DATAGRAM_BYTES: usize = 9_000;

// Идентификаторы заголовочных слов
pub const ITEM_MAGIC: u16 = 0x5304;
pub const ITEM_HEAP_COUNTER: u16 = 0x8001;
pub const ITEM_PAYLOAD_LENGTH: u16 = 0x8004;
pub const ITEM_SYNC_TIME: u16 = 0x9027;
pub const ITEM_TIMESTAMP: u16 = 0x9600;
pub const ITEM_CAPTURE_MODE: u16 = 0xA004;
pub const ITEM_ANTENNA_INFO: u16 = 0xA002;
pub const ITEM_BUFFER_ID: u16 = 0xA001;
pub const ITEM_BUFFER_ID_ALT: u16 = 0xA003;
pub const ITEM_PAYLOAD_OFFSET: u16 = 0x3300;

/// Маска 48-битного значения заголовочного слова.
const VALUE_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

/// Разобранный заголовок одного пакета. Живёт ровно одну датаграмму —
/// декодер чистый и состояния приёмника не трогает.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    /// Счётчик пакетов внутри heap (24 бита, диагностика)
    pub packet_counter: u32,
    /// Логический идентификатор канала передачи (диагностика)
    pub logical_channel_id: u32,
    /// Длина payload в байтах
    pub payload_length: usize,
    /// Опорное время синхронизации (Unix, секунды)
    pub sync_time: u64,
    /// Аппаратный счётчик тактов кадра
    pub timestamp: u64,
    /// Режим захвата (fixed/floating point + подрежим)
    pub capture_mode: CaptureMode,
    /// Первый частотный канал фрагмента
    pub start_channel_id: u16,
    /// Антенный вход, которому принадлежит фрагмент
    pub start_antenna_id: u16,
    /// Номер аппаратного буфера (диагностика)
    pub buffer_id: u32,
    /// Смещение payload от начала датаграммы
    pub payload_offset: usize,
}

/// Декодирует заголовок датаграммы.
///
/// Первое слово обязано нести магический идентификатор — иначе
/// `InvalidMagic` (штатный случай для постороннего UDP-шума на порту).
/// Неопознанное слово прерывает разбор всего пакета (`MalformedHeader`):
/// частично извлечённые поля не переживают ошибку, в отличие от
/// референсной прошивочной утилиты, где они протекали в следующий пакет.
pub fn decode_header(datagram: &[u8]) -> SpeadResult<PacketHeader> {
    if datagram.len() < HEADER_BYTES {
        return Err(SpeadError::TruncatedHeader(datagram.len()));
    }

    let first = BigEndian::read_u64(&datagram[0..8]);
    let first_id = (first >> 48) as u16;

    if first_id != ITEM_MAGIC {
        return Err(SpeadError::InvalidMagic(first_id));
    }

    let mut packet_counter = 0u32;
    let mut logical_channel_id = 0u32;
    let mut buffer_id = 0u32;
    let mut payload_length: Option<usize> = None;
    let mut sync_time: Option<u64> = None;
    let mut timestamp: Option<u64> = None;
    let mut capture_mode: Option<CaptureMode> = None;
    let mut antenna_info: Option<(u16, u16)> = None;
    let mut payload_offset = PAYLOAD_OFFSET_EXTENDED;

    for idx in 1..HEADER_WORDS {
        let word = BigEndian::read_u64(&datagram[idx * 8..(idx + 1) * 8]);
        let id = (word >> 48) as u16;
        let value = word & VALUE_MASK;

        match id {
            ITEM_HEAP_COUNTER => {
                packet_counter = (value & 0xFF_FFFF) as u32;
                logical_channel_id = (value >> 24) as u32;
            }
            ITEM_PAYLOAD_LENGTH => payload_length = Some(value as usize),
            ITEM_SYNC_TIME => sync_time = Some(value),
            ITEM_TIMESTAMP => timestamp = Some(value),
            ITEM_CAPTURE_MODE => capture_mode = Some(CaptureMode::from_raw(value)),
            ITEM_ANTENNA_INFO => {
                let channel = ((value & 0x0000_00FF_FF00_0000) >> 24) as u16;
                let antenna = ((value & 0xFF00) >> 8) as u16;
                antenna_info = Some((channel, antenna));
            }
            ITEM_BUFFER_ID | ITEM_BUFFER_ID_ALT => {
                buffer_id = ((value & 0xFFFF_FFFF) >> 16) as u32;
            }
            ITEM_PAYLOAD_OFFSET => payload_offset = PAYLOAD_OFFSET_BASE,
            other => {
                return Err(SpeadError::MalformedHeader { id: other, index: idx });
            }
        }
    }

    let (start_channel_id, start_antenna_id) =
        antenna_info.ok_or(SpeadError::MissingHeaderItem("antenna info (0xA002)"))?;

    Ok(PacketHeader {
        packet_counter,
        logical_channel_id,
        payload_length: payload_length
            .ok_or(SpeadError::MissingHeaderItem("payload length (0x8004)"))?,
        sync_time: sync_time.ok_or(SpeadError::MissingHeaderItem("sync time (0x9027)"))?,
        timestamp: timestamp.ok_or(SpeadError::MissingHeaderItem("timestamp (0x9600)"))?,
        capture_mode: capture_mode
            .ok_or(SpeadError::MissingHeaderItem("capture mode (0xA004)"))?,
        start_channel_id,
        start_antenna_id,
        buffer_id,
        payload_offset,
    })
}

impl PacketHeader {
    /// Срез payload согласно заголовку.
    pub fn payload<'a>(
        &self,
        datagram: &'a [u8],
    ) -> SpeadResult<&'a [u8]> {
        let end = self.payload_offset + self.payload_length;

        if datagram.len() < end {
            return Err(SpeadError::TruncatedPayload {
                have: datagram.len().saturating_sub(self.payload_offset),
                need: self.payload_length,
            });
        }

        Ok(&datagram[self.payload_offset..end])
    }

    /// Собирает заголовок обратно в 9 слов. Всегда включает маркер
    /// 0x3300, поэтому payload начинается со смещения 72.
    pub fn encode(&self) -> [u8; HEADER_BYTES] {
        let heap_counter = ((self.logical_channel_id as u64) << 24)
            | (self.packet_counter as u64 & 0xFF_FFFF);
        let antenna_info = ((self.start_channel_id as u64) << 24)
            | ((self.start_antenna_id as u64) << 8);
        let buffer_id = (self.buffer_id as u64) << 16;

        let words: [u64; HEADER_WORDS] = [
            (ITEM_MAGIC as u64) << 48,
            make_item(ITEM_HEAP_COUNTER, heap_counter),
            make_item(ITEM_PAYLOAD_LENGTH, self.payload_length as u64),
            make_item(ITEM_SYNC_TIME, self.sync_time),
            make_item(ITEM_TIMESTAMP, self.timestamp),
            make_item(ITEM_CAPTURE_MODE, self.capture_mode.to_raw()),
            make_item(ITEM_ANTENNA_INFO, antenna_info),
            make_item(ITEM_BUFFER_ID_ALT, buffer_id),
            make_item(ITEM_PAYLOAD_OFFSET, 0),
        ];

        let mut buf = [0u8; HEADER_BYTES];
        for (idx, word) in words.iter().enumerate() {
            BigEndian::write_u64(&mut buf[idx * 8..(idx + 1) * 8], *word);
        }
        buf
    }
}

fn make_item(
    id: u16,
    value: u64,
) -> u64 {
    ((id as u64) << 48) | (value & VALUE_MASK)
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> PacketHeader {
        PacketHeader {
            packet_counter: 0x00_1234,
            logical_channel_id: 3,
            payload_length: 1024,
            sync_time: 1_600_000_000,
            timestamp: 42,
            capture_mode: CaptureMode::from_raw(0x80),
            start_channel_id: 128,
            start_antenna_id: 1,
            buffer_id: 7,
            payload_offset: PAYLOAD_OFFSET_BASE,
        }
    }

    #[test]
    fn test_header_roundtrip() {
        let header = sample_header();
        let decoded = decode_header(&header.encode()).unwrap();

        // Все обязательные поля восстанавливаются бит-в-бит
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_truncated_header() {
        let err = decode_header(&[0u8; 71]).unwrap_err();
        assert!(matches!(err, SpeadError::TruncatedHeader(71)));
    }

    #[test]
    fn test_invalid_magic_dropped() {
        let mut buf = sample_header().encode();
        // Портим идентификатор первого слова
        buf[0] = 0x12;
        buf[1] = 0x34;

        let err = decode_header(&buf).unwrap_err();
        assert!(matches!(err, SpeadError::InvalidMagic(0x1234)));
    }

    #[test]
    fn test_unknown_item_aborts_packet() {
        let mut buf = sample_header().encode();
        // Подменяем id шестого слова на мусор
        buf[5 * 8] = 0xDE;
        buf[5 * 8 + 1] = 0xAD;

        let err = decode_header(&buf).unwrap_err();
        assert!(matches!(
            err,
            SpeadError::MalformedHeader {
                id: 0xDEAD,
                index: 5
            }
        ));
    }

    #[test]
    fn test_missing_mandatory_item() {
        let mut buf = sample_header().encode();
        // Слово timestamp превращаем в дубликат buffer id — id известен,
        // но обязательное поле пропадает
        let word = make_item(ITEM_BUFFER_ID, 0);
        BigEndian::write_u64(&mut buf[4 * 8..5 * 8], word);

        let err = decode_header(&buf).unwrap_err();
        assert!(matches!(
            err,
            SpeadError::MissingHeaderItem("timestamp (0x9600)")
        ));
    }

    #[test]
    fn test_offset_marker_selects_base_offset() {
        let header = sample_header();
        let decoded = decode_header(&header.encode()).unwrap();
        assert_eq!(decoded.payload_offset, PAYLOAD_OFFSET_BASE);
    }

    #[test]
    fn test_no_marker_means_extended_offset() {
        let mut buf = sample_header().encode();
        // Убираем маркер 0x3300 (последнее слово) — дубликат buffer id
        let word = make_item(ITEM_BUFFER_ID, 0);
        BigEndian::write_u64(&mut buf[8 * 8..9 * 8], word);

        let decoded = decode_header(&buf).unwrap();
        assert_eq!(decoded.payload_offset, PAYLOAD_OFFSET_EXTENDED);
    }

    #[test]
    fn test_antenna_info_bit_packing() {
        let mut header = sample_header();
        header.start_channel_id = 0xABCD;
        header.start_antenna_id = 0x00EF;

        let decoded = decode_header(&header.encode()).unwrap();
        assert_eq!(decoded.start_channel_id, 0xABCD);
        assert_eq!(decoded.start_antenna_id, 0x00EF);
    }

    #[test]
    fn test_heap_counter_split() {
        let mut header = sample_header();
        header.packet_counter = 0xAB_CDEF;
        header.logical_channel_id = 0x12;

        let decoded = decode_header(&header.encode()).unwrap();
        assert_eq!(decoded.packet_counter, 0xAB_CDEF);
        assert_eq!(decoded.logical_channel_id, 0x12);
    }

    #[test]
    fn test_payload_slice() {
        let header = sample_header();
        let mut datagram = Vec::from(header.encode());
        datagram.extend_from_slice(&vec![0x55u8; 1024]);

        let payload = header.payload(&datagram).unwrap();
        assert_eq!(payload.len(), 1024);
        assert!(payload.iter().all(|&b| b == 0x55));
    }

    #[test]
    fn test_payload_truncated() {
        let header = sample_header();
        let mut datagram = Vec::from(header.encode());
        // Обещано 1024 байта, пришло 100
        datagram.extend_from_slice(&vec![0u8; 100]);

        let err = header.payload(&datagram).unwrap_err();
        assert!(matches!(
            err,
            SpeadError::TruncatedPayload {
                have: 100,
                need: 1024
            }
        ));
    }
}
