use std::path::PathBuf;

use ep_core::{Key, KeyedDataset};
use ep_results::*;

fn unique_temp_dir(name: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("ep_sink_{name}_{nanos}"))
}

fn costs() -> KeyedDataset {
    let mut ds = KeyedDataset::new(&["cost type", "year"], &["2015 USD"]).unwrap();
    ds.insert(vec![Key::text("DEMAND-SIDE"), Key::Int(2020)], vec![3.0])
        .unwrap();
    ds.insert(vec![Key::text("SUPPLY-SIDE"), Key::Int(2020)], vec![f64::NAN])
        .unwrap();
    ds
}

#[test]
fn writes_prefixed_rows_with_upper_cased_header() {
    let dir = unique_temp_dir("write");
    let sink = OutputSink::new(dir.clone(), "Reference", "2026-01-01 00:00");
    let path = sink
        .write_table(OutputCategory::Combined, "c_costs", &costs())
        .unwrap();
    assert_eq!(path, dir.join("combined_outputs").join("c_costs.csv"));

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "SCENARIO,TIMESTAMP,COST TYPE,YEAR,2015 USD");
    assert_eq!(lines[1], "REFERENCE,2026-01-01 00:00,DEMAND-SIDE,2020,3");
    assert_eq!(lines[2], "REFERENCE,2026-01-01 00:00,SUPPLY-SIDE,2020,0");
}

#[test]
fn second_write_appends_without_repeating_header() {
    let dir = unique_temp_dir("append");
    let first = OutputSink::new(dir.clone(), "a", "t1");
    let second = OutputSink::new(dir.clone(), "b", "t2");
    first
        .write_table(OutputCategory::Combined, "c_costs", &costs())
        .unwrap();
    let path = second
        .write_table(OutputCategory::Combined, "c_costs", &costs())
        .unwrap();

    let content = std::fs::read_to_string(path).unwrap();
    assert_eq!(content.lines().count(), 5);
    assert_eq!(content.matches("SCENARIO").count(), 1);
    assert!(content.contains("B,t2,DEMAND-SIDE"));
}

#[test]
fn header_mismatch_is_an_error() {
    let dir = unique_temp_dir("mismatch");
    let sink = OutputSink::new(dir, "a", "t");
    sink.write_table(OutputCategory::Supply, "s_energy", &costs())
        .unwrap();
    let other = KeyedDataset::from_values(&["year"], [(vec![Key::Int(2020)], 1.0)]).unwrap();
    let err = sink
        .write_table(OutputCategory::Supply, "s_energy", &other)
        .unwrap_err();
    assert!(matches!(err, ResultsError::HeaderMismatch { .. }));
}

#[test]
fn dispatch_tables_route_and_purge_clears_everything() {
    let dir = unique_temp_dir("purge");
    let sink = OutputSink::new(dir.clone(), "a", "t");
    let mut set = ResultSet::new();
    set.insert("electricity_reconciliation", costs());
    set.insert("d_energy", costs());
    let paths = sink.export_result_set(OutputCategory::Demand, &set).unwrap();
    assert!(paths.contains(&dir.join("dispatch_outputs").join("electricity_reconciliation.csv")));
    assert!(paths.contains(&dir.join("demand_outputs").join("d_energy.csv")));

    sink.purge().unwrap();
    for category in OutputCategory::ALL {
        assert!(!sink.category_dir(category).exists());
    }
}
