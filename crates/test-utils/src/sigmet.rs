//! Synthetic SIGMET-IRIS RAW volume files.
//!
//! A volume is built record by record: two 6144-byte header records with the
//! structure markers and configuration scalars at their documented offsets,
//! then data records carrying run-length compressed rays. Each data record
//! opens with a 12-byte raw product header (record number, sweep number);
//! the first record of a sweep adds one 76-byte ingest data header per
//! parameter. Rays interleave round-robin across parameters, matching the
//! order the real ingest writes.

use std::io::Write;
use std::path::PathBuf;

/// Physical record length of the format.
pub const SIGMET_RECORD_LEN: usize = 6144;

fn put_i16(buf: &mut [u8], off: usize, v: i16) {
    buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

fn put_u16(buf: &mut [u8], off: usize, v: u16) {
    buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

fn put_i32(buf: &mut [u8], off: usize, v: i32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

fn put_str(buf: &mut [u8], off: usize, s: &str, width: usize) {
    let bytes = s.as_bytes();
    assert!(bytes.len() <= width, "string wider than its field");
    buf[off..off + bytes.len()].copy_from_slice(bytes);
}

/// Degrees to the 16-bit binary angle encoding.
pub fn encode_angle16(degrees: f64) -> i16 {
    ((degrees / 360.0) * 65536.0).round() as u16 as i16
}

/// One ray: angular extent, timing, and gate bytes per parameter.
#[derive(Debug, Clone)]
pub struct SyntheticRay {
    pub azimuth_start: i16,
    pub azimuth_end: i16,
    pub elevation: i16,
    pub time_offset: u16,
    /// Gate bytes per parameter, in `data_types` order.
    pub samples: Vec<Vec<u8>>,
}

impl SyntheticRay {
    /// A ray spanning one degree of azimuth starting at `azimuth_deg`.
    pub fn new(azimuth_deg: f64, elevation_deg: f64, time_offset: u16, samples: Vec<Vec<u8>>) -> Self {
        SyntheticRay {
            azimuth_start: encode_angle16(azimuth_deg),
            azimuth_end: encode_angle16(azimuth_deg + 1.0),
            elevation: encode_angle16(elevation_deg),
            time_offset,
            samples,
        }
    }
}

/// One sweep: start time plus its rays in scan order.
#[derive(Debug, Clone)]
pub struct SyntheticSweep {
    pub start_secs: i32,
    pub rays: Vec<SyntheticRay>,
}

/// Builder for a complete synthetic volume file.
///
/// Defaults give a 10 cm radar at 540 Hz (Nyquist velocity 13.5 m/s) so
/// value-decode assertions can be written against round numbers.
#[derive(Debug, Clone)]
pub struct SigmetVolumeBuilder {
    pub station_name: String,
    pub setup_utility: String,
    pub prf: i32,
    /// Hundredths of a centimeter.
    pub wavelength: i32,
    pub num_rays: i16,
    pub nominal_bins: i16,
    pub range_first_cm: i32,
    pub range_last_cm: i32,
    pub multi_prf_mode: i16,
    /// Parameter type codes, one per data variable.
    pub data_types: Vec<i16>,
    pub year: i16,
    pub month: i16,
    pub day: i16,
    pub radar_lat_bin32: i32,
    pub radar_lon_bin32: i32,
    pub ground_height: i16,
    pub radar_height: i16,
    pub radar_alt_cm: i32,
    sweeps: Vec<SyntheticSweep>,
}

impl Default for SigmetVolumeBuilder {
    fn default() -> Self {
        SigmetVolumeBuilder {
            station_name: "SYNTH".to_string(),
            setup_utility: "SYNTH-SETUP".to_string(),
            prf: 540,
            wavelength: 1000,
            num_rays: 4,
            nominal_bins: 8,
            range_first_cm: 0,
            range_last_cm: 70_000,
            multi_prf_mode: 0,
            data_types: vec![1, 2],
            year: 2002,
            month: 5,
            day: 28,
            radar_lat_bin32: 1 << 28,
            radar_lon_bin32: 1 << 26,
            ground_height: 24,
            radar_height: 30,
            radar_alt_cm: 15260,
            sweeps: Vec::new(),
        }
    }
}

impl SigmetVolumeBuilder {
    pub fn new() -> Self {
        SigmetVolumeBuilder::default()
    }

    pub fn add_sweep(&mut self, start_secs: i32, rays: Vec<SyntheticRay>) -> &mut Self {
        self.sweeps.push(SyntheticSweep { start_secs, rays });
        self
    }

    /// Assemble the volume bytes.
    pub fn build(&self) -> Vec<u8> {
        assert!(!self.sweeps.is_empty(), "volume needs at least one sweep");
        let num_params = self.data_types.len();

        let mut head = vec![0u8; 2 * SIGMET_RECORD_LEN];
        // structure markers: words 0, 6, 12
        put_i16(&mut head, 0, 27);
        put_i16(&mut head, 12, 26);
        put_i16(&mut head, 24, 15);
        put_i32(&mut head, 452, self.prf);
        put_i32(&mut head, 480, self.wavelength);
        put_str(&mut head, 6288, &self.station_name, 16);
        put_str(&mut head, 6306, &self.setup_utility, 16);
        put_i32(&mut head, 6324, self.radar_lat_bin32);
        put_i32(&mut head, 6328, self.radar_lon_bin32);
        put_i16(&mut head, 6332, self.ground_height);
        put_i16(&mut head, 6334, self.radar_height);
        put_i16(&mut head, 6340, self.num_rays);
        put_i32(&mut head, 6344, self.radar_alt_cm);
        put_i32(&mut head, 6648, self.sweeps[0].start_secs);
        put_i32(&mut head, 6652, self.sweeps[self.sweeps.len() - 1].start_secs);
        let mask = self
            .data_types
            .iter()
            .fold(0u32, |m, &dt| m | 1 << (dt - 1));
        put_u32(&mut head, 6772, mask);
        put_i16(&mut head, 6912, self.multi_prf_mode);
        put_i32(&mut head, 7408, self.range_first_cm);
        put_i32(&mut head, 7412, self.range_last_cm);
        put_i16(&mut head, 7418, self.nominal_bins);
        let step = (self.range_last_cm - self.range_first_cm) / (self.nominal_bins as i32 - 1);
        put_i32(&mut head, 7424, step);
        put_i16(&mut head, 7574, self.sweeps.len() as i16);

        let mut writer = RecordWriter::new(head);
        for (si, sweep) in self.sweeps.iter().enumerate() {
            let sweep_number = (si + 1) as i16;
            writer.start_sweep_record(sweep_number);
            for &dt in &self.data_types {
                let mut idh = [0u8; 76];
                put_i32(&mut idh, 12, sweep.start_secs);
                put_i16(&mut idh, 18, self.year);
                put_i16(&mut idh, 20, self.month);
                put_i16(&mut idh, 22, self.day);
                put_i16(&mut idh, 24, sweep_number);
                put_i16(&mut idh, 30, sweep.rays.len() as i16);
                put_i16(&mut idh, 32, sweep.rays.len() as i16);
                let fixed = sweep.rays.first().map(|r| r.elevation).unwrap_or(0);
                put_u16(&mut idh, 34, fixed as u16);
                put_i16(&mut idh, 38, dt);
                writer.push_raw(&idh);
            }
            for ray in &sweep.rays {
                assert_eq!(
                    ray.samples.len(),
                    num_params,
                    "ray needs one sample vector per parameter"
                );
                for samples in &ray.samples {
                    for word in encode_ray_words(ray, samples) {
                        writer.push_word(word);
                    }
                }
            }
        }
        writer.finish()
    }

    /// Write the volume into a fresh temp directory.
    pub fn write_temp(&self) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("volume.RAW");
        std::fs::File::create(&path)
            .expect("create volume file")
            .write_all(&self.build())
            .expect("write volume file");
        (dir, path)
    }
}

/// Compress one physical ray (12-byte header plus gate bytes) into code
/// words: zero runs of two or more words collapse to a skip code, everything
/// else travels in literal runs, and the ray ends with the end-of-ray word.
fn encode_ray_words(ray: &SyntheticRay, samples: &[u8]) -> Vec<u16> {
    let mut head = [0u8; 12];
    put_i16(&mut head, 0, ray.azimuth_start);
    put_i16(&mut head, 2, ray.elevation);
    put_i16(&mut head, 4, ray.azimuth_end);
    put_i16(&mut head, 6, ray.elevation);
    put_i16(&mut head, 8, samples.len() as i16);
    put_u16(&mut head, 10, ray.time_offset);

    let mut bytes = Vec::with_capacity(12 + samples.len() + 1);
    bytes.extend_from_slice(&head);
    bytes.extend_from_slice(samples);
    if bytes.len() % 2 != 0 {
        bytes.push(0);
    }
    let words: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    let zero_run = |from: usize| -> usize {
        words[from..].iter().take_while(|&&w| w == 0).count()
    };

    let mut out = Vec::new();
    let mut i = 0;
    while i < words.len() {
        let zeros = zero_run(i);
        if zeros >= 2 {
            out.push(zeros as u16);
            i += zeros;
            continue;
        }
        let start = i;
        while i < words.len() && zero_run(i) < 2 {
            i += 1;
        }
        out.push(0x8000 | (i - start) as u16);
        out.extend_from_slice(&words[start..i]);
    }
    out.push(1);
    out
}

/// Appends code words to a file, inserting the 12-byte raw product header
/// whenever a record boundary is crossed.
struct RecordWriter {
    buf: Vec<u8>,
    sweep_number: i16,
}

impl RecordWriter {
    fn new(header_region: Vec<u8>) -> Self {
        assert_eq!(header_region.len() % SIGMET_RECORD_LEN, 0);
        RecordWriter {
            buf: header_region,
            sweep_number: 0,
        }
    }

    fn record_header(&mut self) {
        let record_number = (self.buf.len() / SIGMET_RECORD_LEN) as i16;
        let mut hdr = [0u8; 12];
        put_i16(&mut hdr, 0, record_number);
        put_i16(&mut hdr, 2, self.sweep_number);
        self.buf.extend_from_slice(&hdr);
    }

    /// Pad out the current record and open a new one for `sweep_number`.
    fn start_sweep_record(&mut self, sweep_number: i16) {
        while self.buf.len() % SIGMET_RECORD_LEN != 0 {
            self.buf.push(0);
        }
        self.sweep_number = sweep_number;
        self.record_header();
    }

    fn push_word(&mut self, word: u16) {
        if self.buf.len() % SIGMET_RECORD_LEN == 0 {
            self.record_header();
        }
        self.buf.extend_from_slice(&word.to_le_bytes());
    }

    fn push_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn finish(mut self) -> Vec<u8> {
        while self.buf.len() % SIGMET_RECORD_LEN != 0 {
            self.buf.push(0);
        }
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_angle16_quadrants() {
        assert_eq!(encode_angle16(0.0), 0);
        assert_eq!(encode_angle16(90.0), 16384);
        assert_eq!(encode_angle16(180.0), i16::MIN);
    }

    #[test]
    fn test_built_volume_framing() {
        let mut builder = SigmetVolumeBuilder::new();
        builder.add_sweep(
            100,
            vec![SyntheticRay::new(5.0, 0.5, 0, vec![vec![1, 2], vec![3, 4]])],
        );
        let bytes = builder.build();

        assert_eq!(bytes.len() % SIGMET_RECORD_LEN, 0);
        assert!(bytes.len() >= 3 * SIGMET_RECORD_LEN);
        // structure markers at 16-bit words 0, 6, 12
        for (off, marker) in [(0usize, 27i16), (12, 26), (24, 15)] {
            assert_eq!(i16::from_le_bytes([bytes[off], bytes[off + 1]]), marker);
        }
        // first data record carries the sweep number and the first ingest
        // data header, whose seconds field doubles as the volume base time
        let data = 2 * SIGMET_RECORD_LEN;
        assert_eq!(i16::from_le_bytes([bytes[data + 2], bytes[data + 3]]), 1);
        let secs_at = data + 12 + 12;
        assert_eq!(
            i32::from_le_bytes([
                bytes[secs_at],
                bytes[secs_at + 1],
                bytes[secs_at + 2],
                bytes[secs_at + 3]
            ]),
            100
        );
    }

    #[test]
    fn test_encode_ray_words_single_literal_run() {
        // no zero words anywhere: 12 header bytes + 3 samples padded to 16
        // bytes travel as one 8-word literal run plus the end-of-ray word
        let ray = SyntheticRay::new(10.0, 0.5, 3, vec![vec![9, 8, 7]]);
        let words = encode_ray_words(&ray, &ray.samples[0]);
        assert_eq!(words.len(), 10);
        assert_eq!(words[0], 0x8008);
        assert_eq!(*words.last().unwrap(), 1);
    }

    #[test]
    fn test_encode_ray_words_collapses_zero_runs() {
        // eight zero samples form four zero words, collapsed to one skip code
        let ray = SyntheticRay::new(10.0, 0.5, 3, vec![vec![0; 8]]);
        let words = encode_ray_words(&ray, &ray.samples[0]);
        assert_eq!(words[0], 0x8006);
        assert_eq!(words[7], 4);
        assert_eq!(words[8], 1);
        assert_eq!(words.len(), 9);
    }
}
