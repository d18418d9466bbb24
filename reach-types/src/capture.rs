/// Режим захвата из заголовочного слова 0xA004.
///
/// Старший (7-й) бит 48-битного значения — признак floating point,
/// младшие биты (маска 0xEF) — подрежим конфигурации прошивки.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureMode {
    /// Payload содержит IEEE double вместо u64
    pub floating_point: bool,
    /// Подрежим прошивки (диагностика, на сборку кадра не влияет)
    pub sub_mode: u8,
}

impl CaptureMode {
    /// Разбирает 48-битное значение заголовочного слова.
    pub fn from_raw(value: u64) -> Self {
        Self {
            floating_point: (value >> 7) & 0x1 == 1,
            sub_mode: (value & 0xEF) as u8,
        }
    }

    /// Собирает значение обратно (симулятор, тесты).
    pub fn to_raw(self) -> u64 {
        let mut v = self.sub_mode as u64 & 0xEF;
        if self.floating_point {
            v |= 1 << 7;
        }
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floating_point_bit() {
        assert!(CaptureMode::from_raw(0x80).floating_point);
        assert!(!CaptureMode::from_raw(0x00).floating_point);
        assert!(!CaptureMode::from_raw(0x7F).floating_point);
    }

    #[test]
    fn test_sub_mode_mask() {
        let mode = CaptureMode::from_raw(0x83);
        assert!(mode.floating_point);
        assert_eq!(mode.sub_mode, 0x83 & 0xEF);
    }

    #[test]
    fn test_raw_roundtrip() {
        for raw in [0u64, 0x80, 0x03, 0x83, 0xEF] {
            let mode = CaptureMode::from_raw(raw);
            assert_eq!(CaptureMode::from_raw(mode.to_raw()), mode);
        }
    }
}
