//! Протокол спектрометра REACH
//!
//! Эталонная реализация приёмной стороны SPEAD-подобного протокола TPM:
//! разбор заголовков датаграмм, пересборка фрагментов в кадр спектра и
//! обратные аппаратные перестановки каналов (demux, descramble,
//! bit-reversal).
//!
//! # Быстрый старт
//!
//! ```
//! use reach_core::{decode_header, FrameAssembler, FrameState};
//! use reach_types::SpectrumLayout;
//!
//! let layout = SpectrumLayout::with_packet_size(2, 4, 16)?;
//! let mut assembler = FrameAssembler::<u64>::new(layout);
//! # Ok::<(), reach_types::SpeadError>(())
//! ```

pub mod frame;
pub mod protocol;
pub mod transmit;

pub use frame::*;
pub use protocol::*;
pub use transmit::*;

/// Версия библиотеки.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
