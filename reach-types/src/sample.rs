/// Тип выборки в payload: аккумулятор прошивки отдаёт либо беззнаковые
/// 64-битные целые (fixed point), либо IEEE double (floating point).
/// Режим фиксируется при создании приёмника и не меняется в сессии.
pub trait Sample:
    Copy + Default + PartialEq + Send + std::fmt::Debug + 'static
{
    /// Установлен ли в этом режиме старший бит capture mode
    const FLOATING_POINT: bool;

    /// Восстанавливает выборку из 8 байт payload (little-endian)
    fn from_le_bytes(bytes: [u8; 8]) -> Self;

    /// Обратное преобразование (симулятор, тесты)
    fn to_le_bytes(self) -> [u8; 8];
}

impl Sample for u64 {
    const FLOATING_POINT: bool = false;

    fn from_le_bytes(bytes: [u8; 8]) -> Self {
        u64::from_le_bytes(bytes)
    }

    fn to_le_bytes(self) -> [u8; 8] {
        self.to_le_bytes()
    }
}

impl Sample for f64 {
    const FLOATING_POINT: bool = true;

    fn from_le_bytes(bytes: [u8; 8]) -> Self {
        f64::from_le_bytes(bytes)
    }

    fn to_le_bytes(self) -> [u8; 8] {
        self.to_le_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u64_roundtrip() {
        let v: u64 = 0x0102_0304_0506_0708;
        assert_eq!(u64::from_le_bytes(Sample::to_le_bytes(v)), v);
        assert!(!<u64 as Sample>::FLOATING_POINT);
    }

    #[test]
    fn test_f64_roundtrip() {
        let v: f64 = 1234.5678;
        assert_eq!(<f64 as Sample>::from_le_bytes(Sample::to_le_bytes(v)), v);
        assert!(<f64 as Sample>::FLOATING_POINT);
    }

    #[test]
    fn test_payload_words_are_little_endian() {
        // Payload идёт little-endian в отличие от big-endian заголовка
        let v: u64 = 1;
        assert_eq!(Sample::to_le_bytes(v)[0], 1);
    }
}
