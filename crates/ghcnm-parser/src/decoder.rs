//! GHCN-Monthly surface-temperature decoder.
//!
//! A dataset is a pair of fixed-column text files, `<base>.dat`
//! (observations) and `<base>.inv` (station inventory), plus a binary
//! station-index sidecar `<base>.ncsx` built on first open. Opening either
//! the observation file or a prebuilt index yields the same description:
//! record streams `data` and `station`, and the shared `month` dimension
//! carried by the twelve repeated value/flag groups of each observation
//! line.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use cdm_core::{
    ArrayData, Attribute, CancelToken, CdmDataset, CdmError, CdmResult, DataType, Dimension,
    FormatDecoder, Member, RandomSource, RecordCursor, Section, StructureMembers, Variable,
};

use crate::index::{self, IndexStats, StationIndexMap};
use crate::stream::LineCursor;
use crate::table::{FieldKind, RecordSpec};

/// Name of the observation record stream.
pub const DATA_VAR: &str = "data";
/// Name of the station inventory record stream.
pub const STATION_VAR: &str = "station";

const MONTH_DIM: &str = "month";
const MONTHS: usize = 12;
/// Column distance between consecutive monthly value/flag groups.
const MONTH_COLUMN_STRIDE: usize = 8;

const DATA_SPEC: &str = "11L,15i,19,24i,25,26,27";
const STATION_SPEC: &str = "11L,20d,30d,37d,68,73i,74,79i,81,83,85,87i,88,90i,106,107";

const DATA_EXT: &str = "dat";
const INVENTORY_EXT: &str = "inv";
const INDEX_EXT: &str = "ncsx";

/// Column layout and source path backing one record-stream variable.
struct StreamInfo {
    path: PathBuf,
    spec: Arc<RecordSpec>,
    members: Arc<StructureMembers>,
}

/// Name the next unnamed field of `spec` and declare its member. Field and
/// member share one declaration site so the parse order and the member
/// order can never drift apart.
fn push_member(
    spec: &mut RecordSpec,
    members: &mut Vec<Member>,
    name: &str,
    data_type: DataType,
    long_name: &str,
    units: Option<&str>,
) -> CdmResult<usize> {
    let index = members.len();
    if index >= spec.len() {
        return Err(CdmError::IllegalState(format!(
            "column spec has {} fields, none left for member '{}'",
            spec.len(),
            name
        )));
    }
    let field = spec.field_mut(index);
    field.name = name.to_string();
    if data_type == DataType::Char {
        field.kind = FieldKind::Char;
    }
    let width = field.end - field.start;
    let shape = if data_type == DataType::Char && width > 1 {
        vec![width]
    } else {
        Vec::new()
    };
    let mut member = Member::with_shape(name, data_type, shape);
    member.add_attribute(Attribute::new("long_name", long_name));
    if let Some(units) = units {
        member.add_attribute(Attribute::new("units", units));
    }
    members.push(member);
    Ok(index)
}

/// Observation line: station id, year, element code, then twelve monthly
/// (value, dm, qc, ds) groups eight columns apart.
fn observation_layout() -> CdmResult<(Arc<RecordSpec>, Arc<StructureMembers>)> {
    let mut spec = RecordSpec::from_spec(DATA_SPEC)?;
    let mut members = Vec::with_capacity(spec.len());

    push_member(&mut spec, &mut members, "stnid", DataType::I64, "station id", None)?;
    push_member(
        &mut spec,
        &mut members,
        "year",
        DataType::I32,
        "year of the station record",
        None,
    )?;
    push_member(&mut spec, &mut members, "element", DataType::String, "element type", None)?;

    let i = push_member(
        &mut spec,
        &mut members,
        "value",
        DataType::F64,
        "monthly mean temperature",
        Some("Celsius"),
    )?;
    let field = spec.field_mut(i);
    field.scale = Some(0.01);
    field.missing = Some(-9999);
    field.set_repeat(MONTHS, MONTH_COLUMN_STRIDE);
    members[i].shape = vec![MONTHS];
    members[i].add_attribute(Attribute::new("missing_value", -9999i32));

    for (name, long_name) in [
        ("dm", "data management flag"),
        ("qc", "quality control flag"),
        ("ds", "data source flag"),
    ] {
        let i = push_member(&mut spec, &mut members, name, DataType::Char, long_name, None)?;
        spec.field_mut(i).set_repeat(MONTHS, MONTH_COLUMN_STRIDE);
        members[i].shape = vec![MONTHS];
    }

    Ok((Arc::new(spec), Arc::new(StructureMembers::new(members))))
}

/// Inventory line: station id, geometry, then the station-environment
/// classification columns.
fn station_layout() -> CdmResult<(Arc<RecordSpec>, Arc<StructureMembers>)> {
    let mut spec = RecordSpec::from_spec(STATION_SPEC)?;
    let mut members = Vec::with_capacity(spec.len());

    push_member(&mut spec, &mut members, "stnid", DataType::I64, "station id", None)?;
    push_member(
        &mut spec,
        &mut members,
        "lat",
        DataType::F64,
        "latitude",
        Some("degrees_north"),
    )?;
    push_member(
        &mut spec,
        &mut members,
        "lon",
        DataType::F64,
        "longitude",
        Some("degrees_east"),
    )?;
    push_member(&mut spec, &mut members, "elevation", DataType::F64, "elevation", Some("m"))?;
    push_member(&mut spec, &mut members, "name", DataType::String, "station name", None)?;
    push_member(
        &mut spec,
        &mut members,
        "grelev",
        DataType::I32,
        "elevation estimated from gridded digital terrain data",
        Some("m"),
    )?;
    push_member(&mut spec, &mut members, "popClass", DataType::Char, "population class", None)?;

    let i = push_member(
        &mut spec,
        &mut members,
        "popSize",
        DataType::I32,
        "population of the city or town the station is located in",
        Some("thousands of persons"),
    )?;
    spec.field_mut(i).missing = Some(-9);
    members[i].add_attribute(Attribute::new("missing_value", -9i32));

    push_member(
        &mut spec,
        &mut members,
        "topoType",
        DataType::Char,
        "type of topography in the environment surrounding the station",
        None,
    )?;
    // the two vegetation columns must keep distinct member names
    push_member(
        &mut spec,
        &mut members,
        "stnVeg",
        DataType::Char,
        "type of vegetation in environment of station",
        None,
    )?;
    push_member(
        &mut spec,
        &mut members,
        "ocean",
        DataType::Char,
        "station is near lake or ocean",
        None,
    )?;

    let i = push_member(
        &mut spec,
        &mut members,
        "oceanDist",
        DataType::I32,
        "distance to nearest ocean/lake",
        Some("km"),
    )?;
    spec.field_mut(i).missing = Some(-9);
    members[i].add_attribute(Attribute::new("missing_value", -9i32));

    push_member(
        &mut spec,
        &mut members,
        "airportId",
        DataType::Char,
        "airport station indicator",
        None,
    )?;

    let i = push_member(
        &mut spec,
        &mut members,
        "townDist",
        DataType::I32,
        "distance from airport to center of associated city or town",
        Some("km"),
    )?;
    spec.field_mut(i).missing = Some(-9);
    members[i].add_attribute(Attribute::new("missing_value", -9i32));

    push_member(
        &mut spec,
        &mut members,
        "grVeg",
        DataType::String,
        "vegetation type at nearest 0.5 deg x 0.5 deg gridded data point of vegetation dataset",
        None,
    )?;
    push_member(
        &mut spec,
        &mut members,
        "popClassFromLights",
        DataType::Char,
        "population class as determined by satellite night lights",
        None,
    )?;

    Ok((Arc::new(spec), Arc::new(StructureMembers::new(members))))
}

/// Station id in the first 11 columns and a plausible year after it.
fn looks_like_observation(line: &str) -> bool {
    let id = line.get(0..11).map(str::trim).and_then(|s| s.parse::<i64>().ok());
    let year = line.get(11..15).map(str::trim).and_then(|s| s.parse::<i32>().ok());
    match (id, year) {
        (Some(_), Some(year)) => (1600..=2200).contains(&year),
        _ => false,
    }
}

/// Decoder for a GHCN-Monthly observation/inventory file pair.
pub struct GhcnmDecoder {
    dataset: CdmDataset,
    streams: Vec<StreamInfo>,
    index: StationIndexMap,
    stats: IndexStats,
    source: Option<RandomSource>,
}

impl GhcnmDecoder {
    /// The station index backing this dataset.
    pub fn station_index(&self) -> &StationIndexMap {
        &self.index
    }

    /// Counters from the index build. When the decoder was opened from a
    /// prebuilt index the totals come from the persisted entries and the
    /// consistency counters are zero.
    pub fn index_stats(&self) -> IndexStats {
        self.stats
    }

    fn ensure_open(&self) -> CdmResult<()> {
        if self.source.is_none() {
            return Err(CdmError::IllegalState("decoder is closed".to_string()));
        }
        Ok(())
    }
}

impl FormatDecoder for GhcnmDecoder {
    fn is_valid_file(source: &mut RandomSource) -> bool {
        if index::is_index_file(source) {
            return true;
        }
        if source.path().extension().and_then(|e| e.to_str()) != Some(DATA_EXT) {
            return false;
        }
        if source.seek(0).is_err() {
            return false;
        }
        let mut line = String::new();
        for _ in 0..5 {
            line.clear();
            match source.read_line(&mut line) {
                Ok(0) | Err(_) => return false,
                Ok(_) => {}
            }
            let text = line.trim_end_matches(|c| c == '\n' || c == '\r');
            if text.trim().is_empty() || text.starts_with('#') {
                continue;
            }
            return looks_like_observation(text);
        }
        false
    }

    fn open(mut source: RandomSource, cancel: Option<&CancelToken>) -> CdmResult<Self> {
        let path = source.path().to_path_buf();
        let base = path.with_extension("");
        let inventory_path = base.with_extension(INVENTORY_EXT);
        let index_path = base.with_extension(INDEX_EXT);

        let (data_path, index, stats) = if index::is_index_file(&mut source) {
            let data_path = base.with_extension(DATA_EXT);
            // fail now if the companions the index points at are missing
            RandomSource::open(&data_path)?;
            RandomSource::open(&inventory_path)?;
            let index = index::read_index(&path)?;
            let stats = IndexStats {
                stations: index.len() as u64,
                observation_lines: index.iter().map(|e| e.observation_count as u64).sum(),
                indexed_stations: index
                    .iter()
                    .filter(|e| e.first_observation_offset >= 0)
                    .count() as u64,
                unknown_station_blocks: 0,
                out_of_order_blocks: 0,
            };
            info!(
                index = %path.display(),
                stations = stats.stations,
                "opened prebuilt station index"
            );
            (data_path, index, stats)
        } else {
            let mut inventory = RandomSource::open(&inventory_path)?;
            let (index, stats) = index::build_index(&mut source, &mut inventory, cancel)?;
            index::write_index(&index_path, &index)?;
            info!(
                data = %path.display(),
                stations = stats.stations,
                observation_lines = stats.observation_lines,
                index = %index_path.display(),
                "built station index"
            );
            (path, index, stats)
        };

        let (data_spec, data_members) = observation_layout()?;
        let (station_spec, station_members) = station_layout()?;

        let mut dataset = CdmDataset::new();
        dataset.add_dimension(Dimension::new(MONTH_DIM, MONTHS, true));

        let mut streams = Vec::new();

        let mut data_var = Variable::new(DATA_VAR, DataType::Structure, Vec::new());
        data_var.members = Some(data_members.clone());
        data_var.var_info = Some(streams.len());
        streams.push(StreamInfo {
            path: data_path,
            spec: data_spec,
            members: data_members,
        });
        dataset.add_variable(data_var);

        let mut station_var = Variable::new(STATION_VAR, DataType::Structure, Vec::new());
        station_var.members = Some(station_members.clone());
        station_var.var_info = Some(streams.len());
        streams.push(StreamInfo {
            path: inventory_path,
            spec: station_spec,
            members: station_members,
        });
        dataset.add_variable(station_var);

        dataset.add_attribute(Attribute::new(
            "title",
            "Version 3 of the GHCN-Monthly dataset of land surface mean temperatures",
        ));
        dataset.add_attribute(Attribute::new("Conventions", "CF-1.6"));
        dataset.add_attribute(Attribute::new(
            "see",
            "http://www.ncdc.noaa.gov/ghcnm, ftp://ftp.ncdc.noaa.gov/pub/data/ghcn/v3",
        ));

        Ok(GhcnmDecoder {
            dataset,
            streams,
            index,
            stats,
            source: Some(source),
        })
    }

    fn dataset(&self) -> &CdmDataset {
        &self.dataset
    }

    fn read_section(&mut self, var_name: &str, _section: &Section) -> CdmResult<ArrayData> {
        self.ensure_open()?;
        let var = self
            .dataset
            .find_variable(var_name)
            .ok_or_else(|| CdmError::IllegalState(format!("no such variable '{}'", var_name)))?;
        Err(CdmError::Unsupported(format!(
            "variable '{}' is a record stream, read it through a record cursor",
            var.name
        )))
    }

    fn record_cursor(&self, var_name: &str) -> CdmResult<Box<dyn RecordCursor>> {
        self.ensure_open()?;
        let var = self
            .dataset
            .find_variable(var_name)
            .ok_or_else(|| CdmError::IllegalState(format!("no such variable '{}'", var_name)))?;
        let info_index = var.var_info.ok_or_else(|| {
            CdmError::Unsupported(format!("variable '{}' has no record stream", var.name))
        })?;
        let info = &self.streams[info_index];
        let source = RandomSource::open(&info.path)?;
        debug!(variable = var_name, file = %info.path.display(), "opened record cursor");
        Ok(Box::new(LineCursor::new(
            source,
            info.members.clone(),
            info.spec.clone(),
        )))
    }

    fn close(&mut self) -> CdmResult<()> {
        self.source = None;
        Ok(())
    }
}
