//! Synthetic GHCN-Monthly fixture files.
//!
//! Observation lines are 115 columns: an 11-digit station id, a 4-digit
//! year, a 4-character element code, then twelve (value, dm, qc, ds)
//! groups of 8 columns each. Inventory lines are 107 columns following the
//! published v3 layout. The formatting here must stay aligned with the
//! column specifications the decoder declares.

use std::io::Write;
use std::path::PathBuf;

/// One observation line with all twelve flag columns blank.
///
/// `values` are the raw integer temperatures (hundredths of a degree;
/// `-9999` = missing).
pub fn observation_line(id: i64, year: i32, element: &str, values: &[i32; 12]) -> String {
    observation_line_with_flags(
        id,
        year,
        element,
        values,
        "            ",
        "            ",
        "            ",
    )
}

/// One observation line with explicit flag columns.
///
/// `dm`, `qc`, `ds` each hold one character per month, twelve total.
pub fn observation_line_with_flags(
    id: i64,
    year: i32,
    element: &str,
    values: &[i32; 12],
    dm: &str,
    qc: &str,
    ds: &str,
) -> String {
    assert!(element.len() <= 4, "element code wider than 4 columns");
    assert_eq!(dm.chars().count(), 12, "dm needs one flag per month");
    assert_eq!(qc.chars().count(), 12, "qc needs one flag per month");
    assert_eq!(ds.chars().count(), 12, "ds needs one flag per month");

    let mut line = format!("{:011}{:4}{:<4}", id, year, element);
    let dm: Vec<char> = dm.chars().collect();
    let qc: Vec<char> = qc.chars().collect();
    let ds: Vec<char> = ds.chars().collect();
    for month in 0..12 {
        line.push_str(&format!(
            "{:5}{}{}{}",
            values[month], dm[month], qc[month], ds[month]
        ));
    }
    assert_eq!(line.len(), 115);
    line
}

/// One inventory line with neutral environment columns.
pub fn inventory_line(id: i64, lat: f64, lon: f64, elevation: f64, name: &str) -> String {
    assert!(name.len() <= 30, "station name wider than 30 columns");

    let mut line = format!(
        "{:011} {:8.2} {:9.2} {:6.1} {:<30}",
        id, lat, lon, elevation, name
    );
    // grelev, popClass, popSize, topoType, stnVeg, ocean, oceanDist,
    // airportId, townDist, grVeg, popClassFromLights
    line.push_str(&format!("{:5}", 100));
    line.push('R');
    line.push_str(&format!("{:5}", -9));
    line.push_str("FL");
    line.push_str("xx");
    line.push_str("no");
    line.push_str(&format!("{:2}", -9));
    line.push('A');
    line.push_str(&format!("{:2}", 1));
    line.push_str(&format!("{:<16}", "WARM CROPS"));
    line.push('A');
    assert_eq!(line.len(), 107);
    line
}

/// Write a `<base>.dat` / `<base>.inv` pair under a fresh temp directory
/// and return the directory guard plus the observation-file path.
pub fn write_ghcnm_pair(
    data_lines: &[String],
    inventory_lines: &[String],
) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let data_path = dir.path().join("ghcnm.dat");
    let inventory_path = dir.path().join("ghcnm.inv");

    let mut data = std::fs::File::create(&data_path).expect("create .dat");
    for line in data_lines {
        writeln!(data, "{}", line).expect("write .dat line");
    }
    let mut inventory = std::fs::File::create(&inventory_path).expect("create .inv");
    for line in inventory_lines {
        writeln!(inventory, "{}", line).expect("write .inv line");
    }
    (dir, data_path)
}

/// A ready-made three-station pair: station A with `years_a` observation
/// lines, station B with `years_b`, station C inventoried but never
/// observed. Returns `(dir, data_path, [id_a, id_b, id_c])`.
pub fn standard_ghcnm_fixture(
    years_a: usize,
    years_b: usize,
) -> (tempfile::TempDir, PathBuf, [i64; 3]) {
    let ids = [10160355000, 10160360000, 10160390000];
    let values = sample_values(890);

    let mut data_lines = Vec::new();
    for k in 0..years_a {
        data_lines.push(observation_line(ids[0], 1989 + k as i32, "TAVG", &values));
    }
    for k in 0..years_b {
        data_lines.push(observation_line(ids[1], 1989 + k as i32, "TAVG", &values));
    }

    let inventory_lines = vec![
        inventory_line(ids[0], 36.93, 7.95, 161.0, "SKIKDA"),
        inventory_line(ids[1], 35.10, -1.85, 83.0, "BENI-SAF"),
        inventory_line(ids[2], 36.72, 3.25, 24.0, "DAR-EL-BEIDA"),
    ];

    let (dir, data_path) = write_ghcnm_pair(&data_lines, &inventory_lines);
    (dir, data_path, ids)
}

/// Twelve raw monthly values starting at `first` and stepping by 10, with
/// June (index 5) missing.
pub fn sample_values(first: i32) -> [i32; 12] {
    let mut values = [0i32; 12];
    for (month, v) in values.iter_mut().enumerate() {
        *v = first + 10 * month as i32;
    }
    values[5] = -9999;
    values
}
