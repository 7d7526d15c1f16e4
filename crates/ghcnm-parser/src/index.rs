//! Station index: maps each station id to its inventory line and the start
//! of its observation block.
//!
//! The index is built by scanning the inventory and observation files once
//! each, then persisted as a sidecar so later opens skip the scan. Entries
//! keep insertion order, which makes the persisted bytes deterministic for
//! a given pair of source files.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use bytes::{Buf, BufMut};
use tracing::{debug, warn};
use unsigned_varint::encode;
use unsigned_varint::io as varint_io;

use cdm_core::{CancelToken, CdmError, CdmResult, RandomSource};

/// Leading bytes of a persisted index file.
pub const INDEX_MAGIC: &[u8] = b"GhncmIndex";

/// One station's row in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationIndexEntry {
    pub station_id: i64,
    /// Byte offset of the station's line in the inventory file.
    pub station_offset: i64,
    /// Byte offset of the first observation line for this station, or -1 if
    /// the station never appears in the observation file.
    pub first_observation_offset: i64,
    pub observation_count: i32,
}

impl StationIndexEntry {
    /// Serialized size: three little-endian i64 plus one i32.
    pub const ENCODED_LEN: usize = 28;

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_i64_le(self.station_id);
        buf.put_i64_le(self.station_offset);
        buf.put_i64_le(self.first_observation_offset);
        buf.put_i32_le(self.observation_count);
    }

    pub fn decode(mut buf: &[u8]) -> CdmResult<Self> {
        if buf.len() < Self::ENCODED_LEN {
            return Err(CdmError::format(
                "GHCNM",
                format!(
                    "index record truncated: {} bytes, need {}",
                    buf.len(),
                    Self::ENCODED_LEN
                ),
            ));
        }
        Ok(StationIndexEntry {
            station_id: buf.get_i64_le(),
            station_offset: buf.get_i64_le(),
            first_observation_offset: buf.get_i64_le(),
            observation_count: buf.get_i32_le(),
        })
    }
}

/// Insertion-ordered station index. Iteration follows inventory order, so
/// rebuilding from the same sources reproduces the same persisted bytes.
#[derive(Debug, Default)]
pub struct StationIndexMap {
    entries: Vec<StationIndexEntry>,
    by_id: HashMap<i64, usize>,
}

impl StationIndexMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, station_id: i64) -> Option<&StationIndexEntry> {
        self.by_id.get(&station_id).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &StationIndexEntry> {
        self.entries.iter()
    }

    /// Append an entry; returns false (keeping the existing entry) if the
    /// station id is already present.
    pub fn insert(&mut self, entry: StationIndexEntry) -> bool {
        match self.by_id.entry(entry.station_id) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(self.entries.len());
                self.entries.push(entry);
                true
            }
        }
    }

    fn slot(&self, station_id: i64) -> Option<usize> {
        self.by_id.get(&station_id).copied()
    }

    fn entry_at_mut(&mut self, slot: usize) -> &mut StationIndexEntry {
        &mut self.entries[slot]
    }
}

/// Counters accumulated while building an index. Consistency problems are
/// counted and logged, never raised as errors.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    /// Stations read from the inventory file.
    pub stations: u64,
    /// Observation lines scanned, whether or not their station was known.
    pub observation_lines: u64,
    /// Stations with at least one observation block.
    pub indexed_stations: u64,
    /// Observation blocks whose station id was absent from the inventory.
    pub unknown_station_blocks: u64,
    /// Observation blocks that reappeared after their station's first block
    /// had ended.
    pub out_of_order_blocks: u64,
}

fn parse_station_id(line: &str) -> Option<i64> {
    line.get(0..11)?.trim().parse().ok()
}

fn skip_line(line: &str) -> bool {
    line.trim().is_empty() || line.starts_with('#')
}

/// Scan the inventory and observation files and build the station index.
///
/// Observation blocks are expected contiguous per station; a block that
/// reappears keeps the original `first_observation_offset` and only grows
/// the count. Stations observed but not inventoried are skipped from the
/// index entirely.
pub fn build_index(
    data: &mut RandomSource,
    inventory: &mut RandomSource,
    cancel: Option<&CancelToken>,
) -> CdmResult<(StationIndexMap, IndexStats)> {
    let mut map = StationIndexMap::new();
    let mut stats = IndexStats::default();

    if let Some(token) = cancel {
        token.check()?;
    }
    inventory.seek(0)?;
    let mut line = String::new();
    let mut line_no = 0u64;
    loop {
        let offset = inventory.position()?;
        line.clear();
        if inventory.read_line(&mut line)? == 0 {
            break;
        }
        line_no += 1;
        let text = line.trim_end_matches(|c| c == '\n' || c == '\r');
        if skip_line(text) {
            continue;
        }
        match parse_station_id(text) {
            Some(id) => {
                let inserted = map.insert(StationIndexEntry {
                    station_id: id,
                    station_offset: offset as i64,
                    first_observation_offset: -1,
                    observation_count: 0,
                });
                if !inserted {
                    warn!(
                        station_id = id,
                        line = line_no,
                        "duplicate inventory station, keeping first entry"
                    );
                }
            }
            None => warn!(line = line_no, "inventory line without a station id, skipped"),
        }
    }
    stats.stations = map.len() as u64;

    if let Some(token) = cancel {
        token.check()?;
    }
    data.seek(0)?;
    let mut curr_id: Option<i64> = None;
    let mut curr_slot: Option<usize> = None;
    line_no = 0;
    loop {
        let offset = data.position()?;
        line.clear();
        if data.read_line(&mut line)? == 0 {
            break;
        }
        line_no += 1;
        let text = line.trim_end_matches(|c| c == '\n' || c == '\r');
        if skip_line(text) {
            continue;
        }
        let id = match parse_station_id(text) {
            Some(id) => id,
            None => {
                warn!(line = line_no, "observation line without a station id, skipped");
                continue;
            }
        };
        if curr_id != Some(id) {
            curr_id = Some(id);
            curr_slot = map.slot(id);
            match curr_slot {
                Some(slot) => {
                    let entry = map.entry_at_mut(slot);
                    if entry.first_observation_offset < 0 {
                        entry.first_observation_offset = offset as i64;
                    } else {
                        stats.out_of_order_blocks += 1;
                        warn!(
                            station_id = id,
                            offset,
                            line = line_no,
                            "observation block out of order, keeping first offset"
                        );
                    }
                }
                None => {
                    stats.unknown_station_blocks += 1;
                    warn!(
                        station_id = id,
                        line = line_no,
                        "station not in inventory, block left out of index"
                    );
                }
            }
        }
        stats.observation_lines += 1;
        if let Some(slot) = curr_slot {
            map.entry_at_mut(slot).observation_count += 1;
        }
    }
    stats.indexed_stations = map
        .iter()
        .filter(|e| e.first_observation_offset >= 0)
        .count() as u64;

    debug!(
        stations = stats.stations,
        observation_lines = stats.observation_lines,
        indexed_stations = stats.indexed_stations,
        "built station index"
    );
    Ok((map, stats))
}

/// Persist an index: magic bytes, varint station count, then one
/// varint-length-prefixed fixed record per station in map order.
pub fn write_index(path: &Path, index: &StationIndexMap) -> CdmResult<()> {
    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(INDEX_MAGIC)?;
    let mut vbuf = encode::u64_buffer();
    out.write_all(encode::u64(index.len() as u64, &mut vbuf))?;
    let mut record = Vec::with_capacity(StationIndexEntry::ENCODED_LEN);
    for entry in index.iter() {
        out.write_all(encode::u64(
            StationIndexEntry::ENCODED_LEN as u64,
            &mut vbuf,
        ))?;
        record.clear();
        entry.encode(&mut record);
        out.write_all(&record)?;
    }
    out.flush()?;
    debug!(path = %path.display(), stations = index.len(), "wrote station index");
    Ok(())
}

/// Load a persisted index.
pub fn read_index(path: &Path) -> CdmResult<StationIndexMap> {
    let mut source = RandomSource::open(path)?;
    let mut magic = vec![0u8; INDEX_MAGIC.len()];
    source.read_exact(&mut magic)?;
    if magic != INDEX_MAGIC {
        return Err(CdmError::format(
            "GHCNM",
            format!("not an index file: {}", path.display()),
        ));
    }
    let count = read_varint(&mut source)?;
    let mut map = StationIndexMap::new();
    let mut record = vec![0u8; StationIndexEntry::ENCODED_LEN];
    for _ in 0..count {
        let len = read_varint(&mut source)? as usize;
        if len != StationIndexEntry::ENCODED_LEN {
            return Err(CdmError::format(
                "GHCNM",
                format!(
                    "index record length {} in {}, expected {}",
                    len,
                    path.display(),
                    StationIndexEntry::ENCODED_LEN
                ),
            ));
        }
        source.read_exact(&mut record)?;
        let entry = StationIndexEntry::decode(&record)?;
        if !map.insert(entry) {
            return Err(CdmError::format(
                "GHCNM",
                format!("duplicate station {} in index", entry.station_id),
            ));
        }
    }
    debug!(path = %path.display(), stations = map.len(), "loaded station index");
    Ok(map)
}

fn read_varint(source: &mut RandomSource) -> CdmResult<u64> {
    varint_io::read_u64(source)
        .map_err(|e| CdmError::format("GHCNM", format!("bad index varint: {}", e)))
}

/// True when the file starts with the index magic bytes.
pub fn is_index_file(source: &mut RandomSource) -> bool {
    if source.len() < INDEX_MAGIC.len() as u64 {
        return false;
    }
    let mut magic = vec![0u8; INDEX_MAGIC.len()];
    if source.read_at(0, &mut magic).is_err() {
        return false;
    }
    magic == INDEX_MAGIC
}
