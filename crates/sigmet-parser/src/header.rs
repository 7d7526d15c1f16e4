//! Fixed-offset volume header of a SIGMET-IRIS RAW file.
//!
//! The first two 6144-byte records hold the product and ingest
//! configuration. Everything the decoder needs is at a documented absolute
//! offset, little-endian; [`VolumeHeader::read`] pulls those fields in one
//! pass and validates the structural markers.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use cdm_core::{CdmError, CdmResult, RandomSource};

use crate::angles::decode_angle32;
use crate::rounding::round_half_down;

pub const FORMAT_NAME: &str = "SIGMET";

/// Structure-type markers of the product header, product configuration and
/// RAW product type, as 16-bit words 0, 6 and 12 of the file.
pub const STRUCT_MARKERS: [i16; 3] = [27, 26, 15];

/// Multi-PRF unfolding coefficients indexed by the header mode flag.
pub const MULTI_PRF_COEF: [f64; 4] = [1.0, 2.0, 3.0, 4.0];

/// Scalars decoded from the product/ingest header region. Returned by value
/// and threaded explicitly; nothing here is process-global.
#[derive(Debug, Clone)]
pub struct VolumeHeader {
    pub station_name: String,
    pub setup_utility_name: String,
    /// Site position decoded from 32-bit binary angles, three decimals.
    pub radar_lat: f32,
    pub radar_lon: f32,
    /// Meters above sea level of the ground at the site.
    pub ground_height: i16,
    /// Meters of the radar above the ground.
    pub radar_height: i16,
    pub radar_alt_cm: i32,
    pub num_rays: i16,
    pub prf: i32,
    /// Wavelength in hundredths of a centimeter.
    pub wavelength: i32,
    /// Ingest sweep start/stop seconds; informational only.
    pub ingest_sweep_start_secs: i32,
    pub ingest_sweep_stop_secs: i32,
    /// Per-sweep parameter bitmask; the popcount is the parameter count.
    pub data_mask: u32,
    pub num_params: usize,
    pub multi_prf_mode: i16,
    pub range_first_cm: i32,
    pub range_last_cm: i32,
    /// Nominal gate count, rounded up to even.
    pub nominal_bins: i16,
    /// Nominal gate spacing from the header; distances are derived by
    /// interpolation instead.
    pub gate_step_cm: i32,
    pub number_sweeps: i16,
    /// Seconds since midnight of the first ingest data header.
    pub base_time_secs: i32,
    pub base_date: NaiveDate,
}

impl VolumeHeader {
    /// Read and validate the header region.
    pub fn read(source: &mut RandomSource) -> CdmResult<Self> {
        source.seek(0)?;
        let mut markers = [0i16; 13];
        for word in markers.iter_mut() {
            *word = source.read_i16_le()?;
        }
        if [markers[0], markers[6], markers[12]] != STRUCT_MARKERS {
            return Err(CdmError::format(
                FORMAT_NAME,
                format!(
                    "structure markers {:?} do not identify a RAW product",
                    [markers[0], markers[6], markers[12]]
                ),
            ));
        }

        source.seek(452)?;
        let prf = source.read_i32_le()?;
        source.seek(480)?;
        let wavelength = source.read_i32_le()?;

        source.seek(6288)?;
        let station_name = source.read_string(16)?;
        source.seek(6306)?;
        let setup_utility_name = source.read_string(16)?;

        source.seek(6324)?;
        let radar_lat = decode_angle32(source.read_i32_le()?);
        let radar_lon = decode_angle32(source.read_i32_le()?);
        let ground_height = source.read_i16_le()?;
        let radar_height = source.read_i16_le()?;
        source.seek(6340)?;
        let num_rays = source.read_i16_le()?;
        source.seek(6344)?;
        let radar_alt_cm = source.read_i32_le()?;

        source.seek(6648)?;
        let ingest_sweep_start_secs = source.read_i32_le()?;
        let ingest_sweep_stop_secs = source.read_i32_le()?;

        source.seek(6772)?;
        let data_mask = source.read_u32_le()?;
        let num_params = data_mask.count_ones() as usize;

        source.seek(6912)?;
        let multi_prf_mode = source.read_i16_le()?;

        source.seek(7408)?;
        let range_first_cm = source.read_i32_le()?;
        let range_last_cm = source.read_i32_le()?;
        source.seek(7418)?;
        let mut nominal_bins = source.read_i16_le()?;
        if nominal_bins % 2 != 0 {
            nominal_bins += 1;
        }
        source.seek(7424)?;
        let gate_step_cm = source.read_i32_le()?;

        source.seek(7574)?;
        let number_sweeps = source.read_i16_le()?;

        source.seek(12312)?;
        let base_time_secs = source.read_i32_le()?;
        source.seek(12318)?;
        let year = source.read_i16_le()?;
        let month = source.read_i16_le()?;
        let day = source.read_i16_le()?;

        if num_params == 0 || num_params > 5 {
            return Err(CdmError::format(
                FORMAT_NAME,
                format!("data mask {:#010x} selects {} parameters", data_mask, num_params),
            ));
        }
        if number_sweeps < 1 {
            return Err(CdmError::format(
                FORMAT_NAME,
                format!("sweep count {} is not positive", number_sweeps),
            ));
        }
        if num_rays < 1 {
            return Err(CdmError::format(
                FORMAT_NAME,
                format!("ray count {} is not positive", num_rays),
            ));
        }
        if nominal_bins < 2 {
            return Err(CdmError::format(
                FORMAT_NAME,
                format!("gate count {} is too small", nominal_bins),
            ));
        }
        if !(0..=3).contains(&multi_prf_mode) {
            return Err(CdmError::format(
                FORMAT_NAME,
                format!("unsupported multi-PRF mode flag {}", multi_prf_mode),
            ));
        }
        let base_date = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
            .ok_or_else(|| {
                CdmError::format(
                    FORMAT_NAME,
                    format!("invalid volume date {:04}-{:02}-{:02}", year, month, day),
                )
            })?;

        Ok(VolumeHeader {
            station_name,
            setup_utility_name,
            radar_lat,
            radar_lon,
            ground_height,
            radar_height,
            radar_alt_cm,
            num_rays,
            prf,
            wavelength,
            ingest_sweep_start_secs,
            ingest_sweep_stop_secs,
            data_mask,
            num_params,
            multi_prf_mode,
            range_first_cm,
            range_last_cm,
            nominal_bins,
            gate_step_cm,
            number_sweeps,
            base_time_secs,
            base_date,
        })
    }

    /// Nyquist velocity in m/s from PRF and wavelength, two decimals.
    pub fn nyquist_velocity(&self) -> f32 {
        round_half_down(self.prf as f64 * self.wavelength as f64 * 0.01 * 0.25 * 0.01, 2)
    }

    pub fn range_first_m(&self) -> f32 {
        self.range_first_cm as f32 * 0.01
    }

    pub fn range_last_m(&self) -> f32 {
        self.range_last_cm as f32 * 0.01
    }

    /// Radar altitude in whole meters.
    pub fn radar_alt_m(&self) -> i32 {
        self.radar_alt_cm / 100
    }
}

/// Gate spacing in meters from the first/last bin ranges, two decimals.
pub fn gate_step(range_first_m: f32, range_last_m: f32, num_bins: i16) -> f32 {
    let step = (range_last_m - range_first_m) / (num_bins - 1) as f32;
    round_half_down(step as f64, 2)
}

/// Format a date plus seconds-from-midnight, carrying overflow into the
/// following days.
pub fn format_instant(date: NaiveDate, seconds_from_midnight: i64) -> String {
    let instant: NaiveDateTime =
        date.and_time(NaiveTime::MIN) + Duration::seconds(seconds_from_midnight);
    instant.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> VolumeHeader {
        VolumeHeader {
            station_name: "SYNTH".to_string(),
            setup_utility_name: "SYNTH-SETUP".to_string(),
            radar_lat: 36.722,
            radar_lon: 3.25,
            ground_height: 24,
            radar_height: 30,
            radar_alt_cm: 15260,
            num_rays: 360,
            prf: 540,
            wavelength: 1000,
            ingest_sweep_start_secs: 0,
            ingest_sweep_stop_secs: 0,
            data_mask: 0b111,
            num_params: 3,
            multi_prf_mode: 0,
            range_first_cm: 0,
            range_last_cm: 10_900_000,
            nominal_bins: 100,
            gate_step_cm: 110_000,
            number_sweeps: 1,
            base_time_secs: 22248,
            base_date: NaiveDate::from_ymd_opt(2002, 5, 28).unwrap(),
        }
    }

    #[test]
    fn test_nyquist_velocity() {
        // 540 Hz at 10 cm: 540 * 1000 * 0.01 * 0.25 * 0.01 = 13.5
        assert_eq!(sample_header().nyquist_velocity(), 13.5);
    }

    #[test]
    fn test_range_conversions() {
        let hdr = sample_header();
        assert_eq!(hdr.range_first_m(), 0.0);
        assert_eq!(hdr.range_last_m(), 109000.0);
        assert_eq!(hdr.radar_alt_m(), 152);
    }

    #[test]
    fn test_gate_step_exact() {
        assert_eq!(gate_step(100.0, 1090.0, 100), 10.0);
    }

    #[test]
    fn test_gate_step_rounds() {
        // 1000 / 63 = 15.873...
        assert_eq!(gate_step(0.0, 1000.0, 64), 15.87);
    }

    #[test]
    fn test_format_instant() {
        let date = NaiveDate::from_ymd_opt(2002, 5, 28).unwrap();
        assert_eq!(format_instant(date, 22248), "2002-05-28 06:10:48 UTC");
    }

    #[test]
    fn test_format_instant_rolls_past_midnight() {
        let date = NaiveDate::from_ymd_opt(2002, 5, 28).unwrap();
        assert_eq!(format_instant(date, 90000), "2002-05-29 01:00:00 UTC");
    }
}
