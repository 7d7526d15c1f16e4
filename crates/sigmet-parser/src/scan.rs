//! Ray discovery over the record-structured data region.
//!
//! After the two header records, a SIGMET-IRIS RAW file is a run of fixed
//! 6144-byte records. Each record opens with a 12-byte raw product header;
//! the first record of a sweep additionally carries one 76-byte ingest data
//! header per parameter. Ray payloads are run-length compressed 16-bit code
//! words, so ray boundaries are data-dependent and the whole region is
//! walked once at open time. Payload bytes stay on disk; a [`Ray`] records
//! only the file span to decode on demand.

use chrono::NaiveDate;
use tracing::{debug, warn};

use cdm_core::{CdmError, CdmResult, RandomSource};

use crate::angles::{decode_elevation, mean_azimuth};
use crate::header::{VolumeHeader, FORMAT_NAME};

/// Physical record length of the format.
pub const RECORD_LEN: u64 = 6144;
/// Raw product header at the start of every record.
pub const RECORD_HEADER_LEN: usize = 12;
/// Per-parameter header at the start of every sweep.
pub const INGEST_DATA_HEADER_LEN: usize = 76;
/// Decompressed prefix of every ray: angles, bin count, time offset.
pub const RAY_HEADER_LEN: usize = 12;

const END_OF_RAY: u16 = 1;

fn i16_at(buf: &[u8], off: usize) -> i16 {
    i16::from_le_bytes([buf[off], buf[off + 1]])
}

fn u16_at(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

fn i32_at(buf: &[u8], off: usize) -> i32 {
    i32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

/// One 16-bit compression code word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeWord {
    /// Terminates the current ray.
    EndOfRay,
    /// That many data words follow verbatim.
    Literal(usize),
    /// That many zero data words were elided.
    Zeros(usize),
    /// Record padding; carries nothing.
    Filler,
}

impl CodeWord {
    pub fn parse(word: u16) -> CodeWord {
        if word == END_OF_RAY {
            CodeWord::EndOfRay
        } else if word & 0x8000 != 0 {
            CodeWord::Literal((word & 0x7fff) as usize)
        } else if word == 0 {
            CodeWord::Filler
        } else {
            CodeWord::Zeros(word as usize)
        }
    }
}

/// One angular sample within a sweep: decoded header fields plus the file
/// span of its compressed payload.
#[derive(Debug, Clone)]
pub struct Ray {
    pub azimuth_start: i16,
    pub elevation_start: i16,
    pub azimuth_end: i16,
    pub elevation_end: i16,
    pub bin_count: i16,
    pub time_offset_secs: i32,
    /// File offset of the ray's first code word.
    pub payload_start: u64,
    /// File offset one past the ray's end-of-ray word.
    pub payload_end: u64,
}

impl Ray {
    /// Mean azimuth over the ray's angular extent, degrees.
    pub fn azimuth(&self) -> f32 {
        mean_azimuth(self.azimuth_start, self.azimuth_end)
    }

    /// Pointing elevation at the end of the ray, degrees.
    pub fn elevation(&self) -> f32 {
        decode_elevation(self.elevation_end)
    }
}

/// Per-parameter header at the start of each sweep's first record.
#[derive(Debug, Clone)]
pub struct IngestDataHeader {
    pub seconds: i32,
    pub date: Option<NaiveDate>,
    pub sweep_number: i16,
    pub expected_rays: i16,
    pub rays_written: i16,
    pub fixed_angle: u16,
    pub data_type: i16,
}

impl IngestDataHeader {
    fn parse(buf: &[u8]) -> IngestDataHeader {
        let year = i16_at(buf, 18);
        let month = i16_at(buf, 20);
        let day = i16_at(buf, 22);
        IngestDataHeader {
            seconds: i32_at(buf, 12),
            date: NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32),
            sweep_number: i16_at(buf, 24),
            expected_rays: i16_at(buf, 30),
            rays_written: i16_at(buf, 32),
            fixed_angle: u16_at(buf, 34),
            data_type: i16_at(buf, 38),
        }
    }
}

/// One sweep's start time and parameter ordering.
#[derive(Debug, Clone)]
pub struct SweepInfo {
    pub sweep_number: i16,
    /// Seconds since midnight of `date` at which the sweep began.
    pub start_secs: i32,
    pub date: NaiveDate,
    /// Data type codes in ingest-data-header order, one per parameter.
    pub data_types: Vec<i16>,
}

/// Every ray in the volume, grouped by parameter and sweep.
#[derive(Debug)]
pub struct VolumeScan {
    pub sweeps: Vec<SweepInfo>,
    /// `groups[param][sweep]`, rays in scan order.
    pub groups: Vec<Vec<Vec<Ray>>>,
    /// Time offset of the last scanned ray, for the coverage-end stamp.
    pub last_ray_time_secs: i32,
}

impl VolumeScan {
    pub fn total_rays(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|per_param| per_param.iter())
            .map(|rays| rays.len())
            .sum()
    }

    /// Rays backing a sweep's coordinate variables: the first parameter
    /// with data for that sweep.
    pub fn coordinate_rays(&self, sweep: usize) -> &[Ray] {
        self.groups
            .iter()
            .filter_map(|per_param| per_param.get(sweep))
            .find(|rays| !rays.is_empty())
            .map(|rays| rays.as_slice())
            .unwrap_or(&[])
    }

    /// Realized gate count of a sweep: its first scanned ray's bin count.
    pub fn realized_bins(&self, sweep: usize) -> Option<i16> {
        self.coordinate_rays(sweep).first().map(|r| r.bin_count)
    }
}

/// A ray being assembled from code words during the scan.
struct RayAccum {
    start: u64,
    decoded_len: usize,
    head: [u8; RAY_HEADER_LEN],
    /// Data words still owed by an open literal run.
    pending_literal: usize,
}

impl RayAccum {
    fn new(start: u64) -> Self {
        RayAccum {
            start,
            decoded_len: 0,
            head: [0u8; RAY_HEADER_LEN],
            pending_literal: 0,
        }
    }

    fn absorb(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if self.decoded_len < RAY_HEADER_LEN {
                self.head[self.decoded_len] = b;
            }
            self.decoded_len += 1;
        }
    }

    fn absorb_zeros(&mut self, nbytes: usize) {
        // the header buffer starts zeroed, so only the length moves
        self.decoded_len += nbytes;
    }

    fn finish(self, payload_end: u64) -> Option<Ray> {
        if self.decoded_len < RAY_HEADER_LEN {
            return None;
        }
        Some(Ray {
            azimuth_start: i16_at(&self.head, 0),
            elevation_start: i16_at(&self.head, 2),
            azimuth_end: i16_at(&self.head, 4),
            elevation_end: i16_at(&self.head, 6),
            bin_count: i16_at(&self.head, 8),
            time_offset_secs: u16_at(&self.head, 10) as i32,
            payload_start: self.start,
            payload_end,
        })
    }
}

/// Walk the data region once, splitting it into rays.
///
/// Rays are assigned to parameters round-robin in scan order, matching the
/// interleaving the format writes. A ray whose payload ends before its
/// 12-byte header is complete is dropped with a warning; everything else is
/// kept, including rays truncated by the end of the file.
pub fn scan_volume(source: &mut RandomSource, header: &VolumeHeader) -> CdmResult<VolumeScan> {
    let num_params = header.num_params;
    let number_sweeps = header.number_sweeps as usize;

    let mut sweeps: Vec<SweepInfo> = Vec::new();
    let mut groups: Vec<Vec<Vec<Ray>>> = vec![vec![Vec::new(); number_sweeps]; num_params];
    let mut last_ray_time_secs = 0i32;
    let mut sweep_ray_seq = 0usize;

    let mut record = vec![0u8; RECORD_LEN as usize];
    let mut record_start = 2 * RECORD_LEN;
    let mut current_sweep: Option<i16> = None;
    let mut accum: Option<RayAccum> = None;

    let mut push_ray = |groups: &mut Vec<Vec<Vec<Ray>>>,
                        sweep_ray_seq: &mut usize,
                        last_time: &mut i32,
                        sweep_idx: usize,
                        ray: Ray| {
        *last_time = ray.time_offset_secs;
        let param = *sweep_ray_seq % num_params;
        groups[param][sweep_idx].push(ray);
        *sweep_ray_seq += 1;
    };

    'records: while record_start + RECORD_LEN <= source.len() {
        source.read_at(record_start, &mut record)?;
        let rec_sweep = i16_at(&record, 2);
        let mut cursor = RECORD_HEADER_LEN;

        if current_sweep != Some(rec_sweep) {
            if let Some(acc) = accum.take() {
                warn!(
                    offset = acc.start,
                    "ray left unterminated at a sweep boundary, dropped"
                );
            }
            if sweeps.len() == number_sweeps {
                warn!(
                    declared = number_sweeps,
                    offset = record_start,
                    "file continues past the declared sweep count, ignoring the rest"
                );
                break 'records;
            }
            if cursor + num_params * INGEST_DATA_HEADER_LEN > record.len() {
                return Err(CdmError::format(
                    FORMAT_NAME,
                    format!(
                        "sweep {} ingest data headers overrun the record",
                        sweeps.len() + 1
                    ),
                ));
            }
            let mut data_types = Vec::with_capacity(num_params);
            let mut start_secs = 0i32;
            let mut date = header.base_date;
            for p in 0..num_params {
                let at = cursor + p * INGEST_DATA_HEADER_LEN;
                let idh = IngestDataHeader::parse(&record[at..at + INGEST_DATA_HEADER_LEN]);
                if p == 0 {
                    start_secs = idh.seconds;
                    match idh.date {
                        Some(d) => date = d,
                        None => warn!(
                            sweep = rec_sweep,
                            "ingest data header carries an invalid date, using the volume date"
                        ),
                    }
                    debug!(
                        sweep = idh.sweep_number,
                        start_secs = idh.seconds,
                        expected_rays = idh.expected_rays,
                        rays_written = idh.rays_written,
                        fixed_angle = idh.fixed_angle,
                        "scanning sweep"
                    );
                }
                if idh.sweep_number != rec_sweep {
                    warn!(
                        record_sweep = rec_sweep,
                        header_sweep = idh.sweep_number,
                        "ingest data header disagrees with the record about the sweep number"
                    );
                }
                data_types.push(idh.data_type);
            }
            cursor += num_params * INGEST_DATA_HEADER_LEN;
            sweeps.push(SweepInfo {
                sweep_number: rec_sweep,
                start_secs,
                date,
                data_types,
            });
            current_sweep = Some(rec_sweep);
            sweep_ray_seq = 0;
        }

        while cursor + 2 <= record.len() {
            if let Some(acc) = accum.as_mut() {
                if acc.pending_literal > 0 {
                    let take = acc.pending_literal.min((record.len() - cursor) / 2);
                    acc.absorb(&record[cursor..cursor + take * 2]);
                    acc.pending_literal -= take;
                    cursor += take * 2;
                    continue;
                }
            }
            let word_off = record_start + cursor as u64;
            let code = CodeWord::parse(u16_at(&record, cursor));
            cursor += 2;

            if accum.is_none() {
                match code {
                    CodeWord::Filler | CodeWord::EndOfRay => continue,
                    _ => accum = Some(RayAccum::new(word_off)),
                }
            }
            match code {
                CodeWord::EndOfRay => {
                    let payload_end = record_start + cursor as u64;
                    if let Some(acc) = accum.take() {
                        let start = acc.start;
                        match acc.finish(payload_end) {
                            Some(ray) => push_ray(
                                &mut groups,
                                &mut sweep_ray_seq,
                                &mut last_ray_time_secs,
                                sweeps.len() - 1,
                                ray,
                            ),
                            None => {
                                warn!(offset = start, "ray shorter than its header, dropped")
                            }
                        }
                    }
                }
                CodeWord::Literal(n) => {
                    if let Some(acc) = accum.as_mut() {
                        acc.pending_literal = n;
                    }
                }
                CodeWord::Zeros(n) => {
                    if let Some(acc) = accum.as_mut() {
                        acc.absorb_zeros(n * 2);
                    }
                }
                CodeWord::Filler => {}
            }
        }

        record_start += RECORD_LEN;
    }

    if record_start < source.len() {
        warn!(
            trailing = source.len() - record_start,
            "trailing partial record ignored"
        );
    }
    if let Some(acc) = accum.take() {
        // file ended inside a ray; keep it if the header arrived, the
        // read path fills the missing tail
        let start = acc.start;
        match acc.finish(record_start.min(source.len())) {
            Some(ray) if !sweeps.is_empty() => push_ray(
                &mut groups,
                &mut sweep_ray_seq,
                &mut last_ray_time_secs,
                sweeps.len() - 1,
                ray,
            ),
            _ => warn!(offset = start, "unterminated trailing ray dropped"),
        }
    }

    Ok(VolumeScan {
        sweeps,
        groups,
        last_ray_time_secs,
    })
}

/// Decode a ray's gate bytes on demand.
///
/// Returns at most `bin_count` sample bytes; fewer means the payload was
/// truncated and the caller fills the tail with the missing sentinel. Only
/// a genuine read failure is an error.
pub fn read_ray_bins(source: &mut RandomSource, ray: &Ray) -> CdmResult<Vec<u8>> {
    let wanted = RAY_HEADER_LEN + ray.bin_count.max(0) as usize;
    let mut decoded: Vec<u8> = Vec::with_capacity(wanted);
    let mut pos = ray.payload_start;
    let mut word = [0u8; 2];

    while pos + 2 <= ray.payload_end && decoded.len() < wanted {
        if pos % RECORD_LEN == 0 {
            pos += RECORD_HEADER_LEN as u64;
            continue;
        }
        source.read_at(pos, &mut word)?;
        pos += 2;
        match CodeWord::parse(u16::from_le_bytes(word)) {
            CodeWord::EndOfRay => break,
            CodeWord::Literal(n) => {
                let mut remaining = n * 2;
                while remaining > 0 && decoded.len() < wanted {
                    if pos % RECORD_LEN == 0 {
                        pos += RECORD_HEADER_LEN as u64;
                    }
                    let to_boundary = (RECORD_LEN - pos % RECORD_LEN) as usize;
                    let in_span = ray.payload_end.saturating_sub(pos) as usize;
                    let take = remaining
                        .min(to_boundary)
                        .min(in_span)
                        .min(wanted - decoded.len());
                    if take == 0 {
                        break;
                    }
                    let at = decoded.len();
                    decoded.resize(at + take, 0);
                    source.read_at(pos, &mut decoded[at..])?;
                    pos += take as u64;
                    remaining -= take;
                }
            }
            CodeWord::Zeros(n) => {
                let add = (n * 2).min(wanted - decoded.len());
                decoded.resize(decoded.len() + add, 0);
            }
            CodeWord::Filler => {}
        }
    }

    if decoded.len() <= RAY_HEADER_LEN {
        return Ok(Vec::new());
    }
    Ok(decoded.split_off(RAY_HEADER_LEN))
}
