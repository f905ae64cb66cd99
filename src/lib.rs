#![allow(non_snake_case)]

// Базовые модули
pub mod config;
pub mod budget;
pub mod error;
pub mod metrics;

// Сегменты: mmap lifecycle + чтение диапазонов
pub mod segment; // src/segment/{mod,mapper,controller,reader,owner}.rs

// Набор сегментов каталога (общий бюджет)
pub mod set;

// Удобные реэкспорты
pub use budget::{stats, MmapBudget, MmapStats};
pub use config::MmapConfig;
pub use error::{seg_error, SegError};
pub use segment::{
    mapper::Mapper, MapView, MemOwner, OffsetOwner, OsMapper, ReadAt, SegBytes, Segment,
    SegmentInfo,
};
pub use segment::owner::MmapOwner;
pub use set::{SegmentSet, WarmReport};
