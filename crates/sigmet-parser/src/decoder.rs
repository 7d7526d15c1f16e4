//! SIGMET-IRIS RAW volume decoder.
//!
//! `open` reads the volume header, walks the data region once to find every
//! ray, and describes one data variable per (parameter, sweep) pair over
//! `[radial, gateR]` dimensions. Coordinate variables (`time`, `azimuthR`,
//! `elevationR`, `distanceR`, `numGates`) are synthesized from the ray
//! headers at open time and served from cached arrays; data variables decode
//! their compressed ray payloads on demand per section read.

use tracing::{info, warn};

use cdm_core::{
    ArrayData, Attribute, CancelToken, CdmDataset, CdmError, CdmResult, DataType, Dimension,
    FormatDecoder, RandomSource, Range, RecordCursor, RegularLayout, Section, Variable,
};

use crate::header::{format_instant, gate_step, VolumeHeader, FORMAT_NAME, STRUCT_MARKERS};
use crate::scan::{read_ray_bins, scan_volume, Ray, VolumeScan};
use crate::values::{self, MISSING};

const SCAN_DIM: &str = "scanR";
const RADIAL_DIM: &str = "radial";
const GATE_DIM: &str = "gateR";

const COORDINATE_AXES: &str = "time elevationR azimuthR distanceR";
/// Sentinel for a radial the sweep never recorded, in the time coordinate.
const TIME_MISSING: i32 = -99;

/// How to physically serve one declared variable.
enum VarInfo {
    /// Decode compressed ray payloads of `groups[param][sweep]` on demand.
    RayGroup {
        param: usize,
        sweep: usize,
        data_type: i16,
    },
    /// Serve a coordinate array cached at open time.
    CoordI32(Vec<i32>),
    CoordF32(Vec<f32>),
}

/// Decoder for a SIGMET-IRIS RAW radar volume file.
pub struct SigmetDecoder {
    dataset: CdmDataset,
    header: VolumeHeader,
    scan: VolumeScan,
    infos: Vec<VarInfo>,
    vnyq: f32,
    source: Option<RandomSource>,
}

/// `base` or `base_sweep_N`, matching the single/multi-sweep naming of the
/// format's legacy consumers.
fn sweep_name(base: &str, sweep: usize, number_sweeps: usize) -> String {
    if number_sweeps > 1 {
        format!("{}_sweep_{}", base, sweep + 1)
    } else {
        base.to_string()
    }
}

fn read_cached_f32(values: &[f32], section: &Section) -> CdmResult<ArrayData> {
    let layout = RegularLayout::new(&[values.len()], 4, 0, section)?;
    let mut out = vec![0f32; layout.total_elems() as usize];
    for chunk in layout {
        let src = (chunk.src_offset / 4) as usize;
        let dst = chunk.dest_elem as usize;
        let n = chunk.nelems as usize;
        out[dst..dst + n].copy_from_slice(&values[src..src + n]);
    }
    Ok(ArrayData::from_f32(section.shape(), out))
}

fn read_cached_i32(values: &[i32], section: &Section) -> CdmResult<ArrayData> {
    let layout = RegularLayout::new(&[values.len()], 4, 0, section)?;
    let mut out = vec![0i32; layout.total_elems() as usize];
    for chunk in layout {
        let src = (chunk.src_offset / 4) as usize;
        let dst = chunk.dest_elem as usize;
        let n = chunk.nelems as usize;
        out[dst..dst + n].copy_from_slice(&values[src..src + n]);
    }
    Ok(ArrayData::from_i32(section.shape(), out))
}

/// Decode the selected gates of one sweep into `out`, one row per selected
/// radial. Radials past the sweep's realized ray count become NaN rows;
/// gates past a ray's realized (or truncated) payload become [`MISSING`].
fn read_sweep(
    source: &mut RandomSource,
    rays: &[Ray],
    data_type: i16,
    vnyq: f32,
    multi_prf_mode: i16,
    radial_range: &Range,
    gate_range: &Range,
    out: &mut Vec<f32>,
) -> CdmResult<()> {
    for k in 0..radial_range.length() {
        let radial = radial_range.start() + k * radial_range.stride();
        let ray = match rays.get(radial) {
            Some(ray) => ray,
            None => {
                out.extend(std::iter::repeat(f32::NAN).take(gate_range.length()));
                continue;
            }
        };
        let bins = read_ray_bins(source, ray)?;
        for g in 0..gate_range.length() {
            let gate = gate_range.start() + g * gate_range.stride();
            let value = bins
                .get(gate)
                .map(|&b| values::decode_sample(data_type, b, vnyq, multi_prf_mode))
                .unwrap_or(MISSING);
            out.push(value);
        }
    }
    Ok(())
}

impl FormatDecoder for SigmetDecoder {
    fn is_valid_file(source: &mut RandomSource) -> bool {
        let mut probe = || -> CdmResult<[i16; 3]> {
            source.seek(0)?;
            let mut words = [0i16; 13];
            for word in words.iter_mut() {
                *word = source.read_i16_le()?;
            }
            Ok([words[0], words[6], words[12]])
        };
        match probe() {
            Ok(markers) => markers == STRUCT_MARKERS,
            Err(_) => false,
        }
    }

    // Header parsing is a bounded number of fixed reads, so the
    // cancellation token has no checkpoint to honor here.
    fn open(mut source: RandomSource, _cancel: Option<&CancelToken>) -> CdmResult<Self> {
        let header = VolumeHeader::read(&mut source)?;
        let scan = scan_volume(&mut source, &header)?;
        if scan.sweeps.is_empty() {
            return Err(CdmError::format(FORMAT_NAME, "volume contains no sweeps"));
        }
        if scan.sweeps.len() < header.number_sweeps as usize {
            warn!(
                declared = header.number_sweeps,
                found = scan.sweeps.len(),
                "file ends before the declared sweep count"
            );
        }
        let number_sweeps = scan.sweeps.len();
        let num_rays = header.num_rays as usize;
        let vnyq = header.nyquist_velocity();

        // Gate count per sweep: the nominal header value for a single-sweep
        // volume, the first scanned ray's bin count otherwise.
        let sweep_bins: Vec<usize> = (0..number_sweeps)
            .map(|j| {
                if number_sweeps == 1 {
                    header.nominal_bins as usize
                } else {
                    scan.realized_bins(j).unwrap_or(header.nominal_bins) as usize
                }
            })
            .collect();

        let mut dataset = CdmDataset::new();
        let mut infos: Vec<VarInfo> = Vec::new();

        dataset.add_dimension(Dimension::new(SCAN_DIM, number_sweeps, true));
        dataset.add_dimension(Dimension::new(RADIAL_DIM, num_rays, true));
        let gate_dims: Vec<String> = (0..number_sweeps)
            .map(|j| sweep_name(GATE_DIM, j, number_sweeps))
            .collect();
        for (j, name) in gate_dims.iter().enumerate() {
            dataset.add_dimension(Dimension::new(name, sweep_bins[j], true));
        }

        // Parameter type codes in scan order, from the first sweep's ingest
        // data headers.
        let data_types = scan.sweeps[0].data_types.clone();

        for (param, &dt) in data_types.iter().enumerate() {
            let base = match values::param_name(dt) {
                Some(name) => name.to_string(),
                None => {
                    warn!(data_type = dt, "unknown parameter type code");
                    format!("DataType_{}", dt)
                }
            };
            for sweep in 0..number_sweeps {
                let var_name = sweep_name(&base, sweep, number_sweeps);
                let mut var = Variable::new(
                    &var_name,
                    DataType::F32,
                    vec![RADIAL_DIM.to_string(), gate_dims[sweep].clone()],
                );
                var.add_attribute(Attribute::new("long_name", var_name.as_str()));
                var.add_attribute(Attribute::new("units", values::param_units(dt)));
                var.add_attribute(Attribute::new("_CoordinateAxes", COORDINATE_AXES));
                var.add_attribute(Attribute::new("missing_value", MISSING));
                var.var_info = Some(infos.len());
                infos.push(VarInfo::RayGroup {
                    param,
                    sweep,
                    data_type: dt,
                });
                dataset.add_variable(var);
            }
        }

        let sweep_stamps: Vec<String> = scan
            .sweeps
            .iter()
            .map(|s| format_instant(s.date, s.start_secs as i64))
            .collect();

        for sweep in 0..number_sweeps {
            let rays = scan.coordinate_rays(sweep);
            let units = format!("secs since {}", sweep_stamps[sweep]);

            let time: Vec<i32> = (0..num_rays)
                .map(|r| rays.get(r).map(|ray| ray.time_offset_secs).unwrap_or(TIME_MISSING))
                .collect();
            let mut var = Variable::new(
                sweep_name("time", sweep, number_sweeps),
                DataType::I32,
                vec![RADIAL_DIM.to_string()],
            );
            var.add_attribute(Attribute::new("long_name", "time from start of sweep"));
            var.add_attribute(Attribute::new("units", units.as_str()));
            var.add_attribute(Attribute::new("missing_value", TIME_MISSING));
            var.var_info = Some(infos.len());
            infos.push(VarInfo::CoordI32(time));
            dataset.add_variable(var);
        }

        for sweep in 0..number_sweeps {
            let rays = scan.coordinate_rays(sweep);
            let elevation: Vec<f32> = (0..num_rays)
                .map(|r| rays.get(r).map(|ray| ray.elevation()).unwrap_or(MISSING))
                .collect();
            let mut var = Variable::new(
                sweep_name("elevationR", sweep, number_sweeps),
                DataType::F32,
                vec![RADIAL_DIM.to_string()],
            );
            var.add_attribute(Attribute::new("long_name", "elevation angle"));
            var.add_attribute(Attribute::new("units", "degrees"));
            var.add_attribute(Attribute::new("missing_value", MISSING));
            var.var_info = Some(infos.len());
            infos.push(VarInfo::CoordF32(elevation));
            dataset.add_variable(var);
        }

        for sweep in 0..number_sweeps {
            let rays = scan.coordinate_rays(sweep);
            let azimuth: Vec<f32> = (0..num_rays)
                .map(|r| rays.get(r).map(|ray| ray.azimuth()).unwrap_or(MISSING))
                .collect();
            let mut var = Variable::new(
                sweep_name("azimuthR", sweep, number_sweeps),
                DataType::F32,
                vec![RADIAL_DIM.to_string()],
            );
            var.add_attribute(Attribute::new("long_name", "azimuth angle"));
            var.add_attribute(Attribute::new("units", "degrees"));
            var.add_attribute(Attribute::new("missing_value", MISSING));
            var.var_info = Some(infos.len());
            infos.push(VarInfo::CoordF32(azimuth));
            dataset.add_variable(var);
        }

        let range_first = header.range_first_m();
        let range_last = header.range_last_m();
        for sweep in 0..number_sweeps {
            let ngates = sweep_bins[sweep];
            let step = gate_step(range_first, range_last, ngates as i16);
            let distance: Vec<f32> = (0..ngates)
                .map(|i| range_first + i as f32 * step)
                .collect();
            let mut var = Variable::new(
                sweep_name("distanceR", sweep, number_sweeps),
                DataType::F32,
                vec![gate_dims[sweep].clone()],
            );
            var.add_attribute(Attribute::new("long_name", "radial distance"));
            var.add_attribute(Attribute::new("units", "m"));
            var.var_info = Some(infos.len());
            infos.push(VarInfo::CoordF32(distance));
            dataset.add_variable(var);
        }

        // realized gate count per sweep, which may trail the nominal maximum
        let num_gates: Vec<i32> = (0..number_sweeps)
            .map(|j| scan.realized_bins(j).unwrap_or(header.nominal_bins) as i32)
            .collect();
        let mut var = Variable::new("numGates", DataType::I32, vec![SCAN_DIM.to_string()]);
        var.add_attribute(Attribute::new("long_name", "number of gates in the sweep"));
        var.var_info = Some(infos.len());
        infos.push(VarInfo::CoordI32(num_gates));
        dataset.add_variable(var);

        dataset.add_attribute(Attribute::new("definition", "SIGMET-IRIS RAW"));
        dataset.add_attribute(Attribute::new(
            "description",
            "SIGMET-IRIS RAW radar volume decoded from run-length compressed rays",
        ));
        dataset.add_attribute(Attribute::new("data_format", "arrays of ray data"));
        dataset.add_attribute(Attribute::new("StationName", header.station_name.as_str()));
        dataset.add_attribute(Attribute::new(
            "StationName_SetupUtility",
            header.setup_utility_name.as_str(),
        ));
        dataset.add_attribute(Attribute::new("radar_lat", header.radar_lat));
        dataset.add_attribute(Attribute::new("radar_lon", header.radar_lon));
        dataset.add_attribute(Attribute::new("ground_height", header.ground_height as i32));
        dataset.add_attribute(Attribute::new("radar_height", header.radar_height as i32));
        dataset.add_attribute(Attribute::new("radar_alt", header.radar_alt_m()));
        dataset.add_attribute(Attribute::new("num_data_types", data_types.len() as i32));
        dataset.add_attribute(Attribute::new("number_sweeps", number_sweeps as i32));
        dataset.add_attribute(Attribute::new(
            "multiprf_mode_flag",
            header.multi_prf_mode as i32,
        ));
        dataset.add_attribute(Attribute::new("num_rays", header.num_rays as i32));
        dataset.add_attribute(Attribute::new("max_number_gates", header.nominal_bins as i32));
        dataset.add_attribute(Attribute::new("range_first", range_first));
        dataset.add_attribute(Attribute::new("range_last", range_last));
        for (j, stamp) in sweep_stamps.iter().enumerate() {
            dataset.add_attribute(Attribute::new(
                sweep_name("start_sweep", j, number_sweeps),
                stamp.as_str(),
            ));
        }
        dataset.add_attribute(Attribute::new(
            "time_coverage_start",
            sweep_stamps[0].as_str(),
        ));
        let last = &scan.sweeps[number_sweeps - 1];
        dataset.add_attribute(Attribute::new(
            "time_coverage_end",
            format_instant(
                last.date,
                last.start_secs as i64 + scan.last_ray_time_secs as i64,
            ),
        ));

        info!(
            station = %header.station_name,
            sweeps = number_sweeps,
            params = data_types.len(),
            rays = scan.total_rays(),
            vnyq,
            "opened SIGMET volume"
        );

        Ok(SigmetDecoder {
            dataset,
            header,
            scan,
            infos,
            vnyq,
            source: Some(source),
        })
    }

    fn dataset(&self) -> &CdmDataset {
        &self.dataset
    }

    fn read_section(&mut self, var_name: &str, section: &Section) -> CdmResult<ArrayData> {
        if self.source.is_none() {
            return Err(CdmError::IllegalState("decoder is closed".to_string()));
        }
        let var = self
            .dataset
            .find_variable(var_name)
            .ok_or_else(|| CdmError::IllegalState(format!("no such variable '{}'", var_name)))?;
        let info = var
            .var_info
            .and_then(|i| self.infos.get(i))
            .ok_or_else(|| {
                CdmError::IllegalState(format!("variable '{}' has no descriptor", var.name))
            })?;

        match info {
            VarInfo::CoordF32(values) => {
                section.validate(&[values.len()])?;
                read_cached_f32(values, section)
            }
            VarInfo::CoordI32(values) => {
                section.validate(&[values.len()])?;
                read_cached_i32(values, section)
            }
            VarInfo::RayGroup {
                param,
                sweep,
                data_type,
            } => {
                let full_shape = self.dataset.variable_shape(var)?;
                let source = self
                    .source
                    .as_mut()
                    .ok_or_else(|| CdmError::IllegalState("decoder is closed".to_string()))?;
                let groups = &self.scan.groups[*param];
                let mut out: Vec<f32> = Vec::with_capacity(section.total_elements() as usize);
                match section.rank() {
                    2 => {
                        section.validate(&full_shape)?;
                        read_sweep(
                            source,
                            &groups[*sweep],
                            *data_type,
                            self.vnyq,
                            self.header.multi_prf_mode,
                            section.range(0),
                            section.range(1),
                            &mut out,
                        )?;
                    }
                    // whole-volume form: leading range selects sweeps
                    3 => {
                        section.validate(&[groups.len(), full_shape[0], full_shape[1]])?;
                        let scan_range = section.range(0);
                        for k in 0..scan_range.length() {
                            let s = scan_range.start() + k * scan_range.stride();
                            read_sweep(
                                source,
                                &groups[s],
                                *data_type,
                                self.vnyq,
                                self.header.multi_prf_mode,
                                section.range(1),
                                section.range(2),
                                &mut out,
                            )?;
                        }
                    }
                    rank => {
                        return Err(CdmError::InvalidSection(format!(
                            "ray data wants a 2- or 3-rank section, got rank {}",
                            rank
                        )));
                    }
                }
                Ok(ArrayData::from_f32(section.shape(), out))
            }
        }
    }

    fn record_cursor(&self, var_name: &str) -> CdmResult<Box<dyn RecordCursor>> {
        if self.source.is_none() {
            return Err(CdmError::IllegalState("decoder is closed".to_string()));
        }
        let var = self
            .dataset
            .find_variable(var_name)
            .ok_or_else(|| CdmError::IllegalState(format!("no such variable '{}'", var_name)))?;
        Err(CdmError::Unsupported(format!(
            "variable '{}' is dense, read it through read_section",
            var.name
        )))
    }

    fn close(&mut self) -> CdmResult<()> {
        self.source = None;
        Ok(())
    }
}

impl SigmetDecoder {
    /// The decoded volume header.
    pub fn volume_header(&self) -> &VolumeHeader {
        &self.header
    }

    /// Nyquist velocity precomputed at open time, m/s.
    pub fn nyquist_velocity(&self) -> f32 {
        self.vnyq
    }
}
