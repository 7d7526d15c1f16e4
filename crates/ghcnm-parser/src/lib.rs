//! GHCN-Monthly (version 3) format support.
//!
//! The Global Historical Climatology Network monthly dataset ships as a pair
//! of fixed-column text files: observations (`.dat`, one station-year per
//! line with twelve monthly value/flag groups) and a station inventory
//! (`.inv`). [`GhcnmDecoder`] exposes both as record streams and maintains a
//! binary station-index sidecar (`.ncsx`) so reopening a large dataset skips
//! the full scan.

pub mod decoder;
pub mod index;
pub mod stream;
pub mod table;

pub use decoder::{GhcnmDecoder, DATA_VAR, STATION_VAR};
pub use index::{
    build_index, is_index_file, read_index, write_index, IndexStats, StationIndexEntry,
    StationIndexMap, INDEX_MAGIC,
};
pub use stream::LineCursor;
pub use table::{Field, FieldKind, RecordSpec};
