//! SIGMET-IRIS RAW radar volume format support.
//!
//! A RAW file is a series of fixed 6144-byte little-endian records: two
//! header records carrying the product and ingest configuration, then
//! run-length compressed ray data for up to five parameters across one or
//! more sweeps. [`SigmetDecoder`] exposes the volume as per-sweep
//! `[radial, gate]` data variables plus synthesized `time` / `azimuthR` /
//! `elevationR` / `distanceR` coordinates. Derived values round half-down
//! at two decimals for bit-for-bit compatibility with legacy consumers.

pub mod angles;
pub mod decoder;
pub mod header;
pub mod rounding;
pub mod scan;
pub mod values;

pub use angles::{decode_angle16, decode_angle32, decode_elevation, mean_azimuth};
pub use decoder::SigmetDecoder;
pub use header::{VolumeHeader, FORMAT_NAME, MULTI_PRF_COEF, STRUCT_MARKERS};
pub use rounding::round_half_down;
pub use scan::{read_ray_bins, scan_volume, CodeWord, Ray, SweepInfo, VolumeScan};
pub use values::{decode_sample, MISSING};
