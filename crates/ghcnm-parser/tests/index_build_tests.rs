//! Station index construction against synthetic observation/inventory pairs.

use cdm_core::{CancelToken, CdmError, RandomSource};
use ghcnm_parser::{build_index, read_index, write_index};
use test_utils::{
    inventory_line, observation_line, sample_values, standard_ghcnm_fixture, write_ghcnm_pair,
};

fn build_for(data_path: &std::path::Path) -> (ghcnm_parser::StationIndexMap, ghcnm_parser::IndexStats) {
    let mut data = RandomSource::open(data_path).unwrap();
    let mut inventory = RandomSource::open(data_path.with_extension("inv")).unwrap();
    build_index(&mut data, &mut inventory, None).unwrap()
}

// ============================================================================
// correctness of counts and offsets
// ============================================================================

#[test]
fn test_counts_and_first_offsets() {
    let (_dir, data_path, ids) = standard_ghcnm_fixture(5, 2);
    let (index, stats) = build_for(&data_path);

    assert_eq!(index.len(), 3);
    assert_eq!(stats.stations, 3);
    assert_eq!(stats.observation_lines, 7);
    assert_eq!(stats.indexed_stations, 2);
    assert_eq!(stats.unknown_station_blocks, 0);
    assert_eq!(stats.out_of_order_blocks, 0);

    // observation lines are 115 columns + newline
    let a = index.get(ids[0]).unwrap();
    assert_eq!(a.observation_count, 5);
    assert_eq!(a.first_observation_offset, 0);

    let b = index.get(ids[1]).unwrap();
    assert_eq!(b.observation_count, 2);
    assert_eq!(b.first_observation_offset, 5 * 116);

    let c = index.get(ids[2]).unwrap();
    assert_eq!(c.observation_count, 0);
    assert_eq!(c.first_observation_offset, -1);

    // inventory lines are 107 columns + newline
    assert_eq!(a.station_offset, 0);
    assert_eq!(b.station_offset, 108);
    assert_eq!(c.station_offset, 216);
}

#[test]
fn test_entries_keep_inventory_order() {
    let (_dir, data_path, ids) = standard_ghcnm_fixture(1, 1);
    let (index, _) = build_for(&data_path);
    let order: Vec<i64> = index.iter().map(|e| e.station_id).collect();
    assert_eq!(order, ids.to_vec());
}

// ============================================================================
// consistency warnings
// ============================================================================

#[test]
fn test_unknown_station_is_skipped() {
    let values = sample_values(500);
    let known = 10160355000;
    let stray = 99999999999;
    let data_lines = vec![
        observation_line(known, 1989, "TAVG", &values),
        observation_line(stray, 1989, "TAVG", &values),
        observation_line(stray, 1990, "TAVG", &values),
    ];
    let inventory_lines = vec![inventory_line(known, 36.93, 7.95, 161.0, "SKIKDA")];
    let (_dir, data_path) = write_ghcnm_pair(&data_lines, &inventory_lines);

    let (index, stats) = build_for(&data_path);
    assert_eq!(index.len(), 1);
    assert!(index.get(stray).is_none());
    assert_eq!(stats.unknown_station_blocks, 1);
    // every line is still scanned and counted
    assert_eq!(stats.observation_lines, 3);
    assert_eq!(index.get(known).unwrap().observation_count, 1);
}

#[test]
fn test_out_of_order_block_keeps_first_offset() {
    let values = sample_values(500);
    let a = 10160355000;
    let b = 10160360000;
    let data_lines = vec![
        observation_line(a, 1989, "TAVG", &values),
        observation_line(a, 1990, "TAVG", &values),
        observation_line(b, 1989, "TAVG", &values),
        observation_line(a, 1991, "TAVG", &values),
    ];
    let inventory_lines = vec![
        inventory_line(a, 36.93, 7.95, 161.0, "SKIKDA"),
        inventory_line(b, 35.10, -1.85, 83.0, "BENI-SAF"),
    ];
    let (_dir, data_path) = write_ghcnm_pair(&data_lines, &inventory_lines);

    let (index, stats) = build_for(&data_path);
    assert_eq!(stats.out_of_order_blocks, 1);

    let entry = index.get(a).unwrap();
    // the stray block still counts, but the offset stays at the first block
    assert_eq!(entry.observation_count, 3);
    assert_eq!(entry.first_observation_offset, 0);
    assert_eq!(index.get(b).unwrap().first_observation_offset, 2 * 116);
}

#[test]
fn test_blank_and_comment_lines_skipped() {
    let values = sample_values(500);
    let id = 10160355000;
    let data_lines = vec![
        "# monthly mean temperatures".to_string(),
        String::new(),
        observation_line(id, 1989, "TAVG", &values),
        "   ".to_string(),
        observation_line(id, 1990, "TAVG", &values),
    ];
    let inventory_lines = vec![
        "# station inventory".to_string(),
        inventory_line(id, 36.93, 7.95, 161.0, "SKIKDA"),
    ];
    let (_dir, data_path) = write_ghcnm_pair(&data_lines, &inventory_lines);

    let (index, stats) = build_for(&data_path);
    assert_eq!(stats.stations, 1);
    assert_eq!(stats.observation_lines, 2);

    let entry = index.get(id).unwrap();
    assert_eq!(entry.observation_count, 2);
    // first data line sits after the comment and the blank line
    assert_eq!(entry.first_observation_offset, 28 + 1);
    // inventory offset is past its comment line
    assert_eq!(entry.station_offset, 20);
}

// ============================================================================
// persistence
// ============================================================================

#[test]
fn test_rebuild_writes_identical_bytes() {
    let (_dir, data_path, _) = standard_ghcnm_fixture(5, 2);

    let (first, _) = build_for(&data_path);
    let (second, _) = build_for(&data_path);

    let path_a = data_path.with_extension("a.ncsx");
    let path_b = data_path.with_extension("b.ncsx");
    write_index(&path_a, &first).unwrap();
    write_index(&path_b, &second).unwrap();

    let bytes_a = std::fs::read(&path_a).unwrap();
    let bytes_b = std::fs::read(&path_b).unwrap();
    assert_eq!(bytes_a, bytes_b);
    assert!(bytes_a.starts_with(b"GhncmIndex"));
}

#[test]
fn test_persisted_index_round_trips() {
    let (_dir, data_path, ids) = standard_ghcnm_fixture(3, 1);
    let (built, _) = build_for(&data_path);

    let index_path = data_path.with_extension("ncsx");
    write_index(&index_path, &built).unwrap();
    let loaded = read_index(&index_path).unwrap();

    assert_eq!(loaded.len(), built.len());
    for id in ids {
        assert_eq!(loaded.get(id), built.get(id));
    }
}

// ============================================================================
// cancellation
// ============================================================================

#[test]
fn test_cancelled_build_stops() {
    let (_dir, data_path, _) = standard_ghcnm_fixture(2, 2);
    let mut data = RandomSource::open(&data_path).unwrap();
    let mut inventory = RandomSource::open(data_path.with_extension("inv")).unwrap();

    let token = CancelToken::new();
    token.cancel();
    let err = build_index(&mut data, &mut inventory, Some(&token)).unwrap_err();
    assert!(matches!(err, CdmError::Cancelled));
}
