//! Tests of the command-line front end.

use clap::Parser;
use dem_contour::ElevationUnit;
use dem_contour_cli::{build_config, run, Args, CliError};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// 3 arc-second tile rising 1 m per sample row towards the north.
fn write_ramp(dir: &Path, name: &str) -> PathBuf {
    let side = 1201;
    let mut bytes = Vec::with_capacity(side * side * 2);
    for row in 0..side {
        let height = (side - 1 - row) as i16;
        for _ in 0..side {
            bytes.extend_from_slice(&height.to_be_bytes());
        }
    }
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

fn args(list: &[&str]) -> Args {
    Args::try_parse_from(std::iter::once("demcontour").chain(list.iter().copied())).unwrap()
}

#[test]
fn test_flags_override_config_file() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("contour.yaml");
    std::fs::write(&config_path, "step: 10\nmax_nodes_per_tile: 0\nsources: [view3]\n").unwrap();

    let config = build_config(&args(&[
        "--config",
        config_path.to_str().unwrap(),
        "--step",
        "25",
        "--unit",
        "feet",
        "--source",
        "srtm1,view3",
        "--area",
        "-73:-5:-72:-4",
    ]))
    .unwrap();

    assert_eq!(config.step, 25.0);
    assert_eq!(config.max_nodes_per_tile, 0);
    assert_eq!(config.unit, ElevationUnit::Feet);
    let sources: Vec<String> = config.sources.iter().map(|s| s.to_string()).collect();
    assert_eq!(sources, vec!["srtm1", "view3"]);
    assert_eq!(config.area.unwrap().min_lon(), -73.0);
}

#[test]
fn test_rejects_bad_flags() {
    assert!(matches!(
        build_config(&args(&["--area", "3:2:1:4"])),
        Err(CliError::Dem(_))
    ));
    assert!(matches!(
        build_config(&args(&["--source", "srtm2"])),
        Err(CliError::Dem(_))
    ));
    assert!(matches!(
        build_config(&args(&["--step=-5"])),
        Err(CliError::Dem(_))
    ));
}

#[test]
fn test_nothing_to_do() {
    let mut out = Vec::new();
    assert!(matches!(run(&args(&[]), &mut out), Err(CliError::Usage(_))));
    assert!(matches!(
        run(&args(&["--area", "6:43:7:44"]), &mut out),
        Err(CliError::Usage(_))
    ));
}

#[test]
fn test_list_resolved_files() {
    let dir = TempDir::new().unwrap();
    write_ramp(&dir.path().join("SRTM3"), "N43E006.hgt");
    write_ramp(&dir.path().join("VIEW3"), "N43E007.hgt");

    let mut out = Vec::new();
    run(
        &args(&[
            "--area",
            "6.5:43.2:7.5:43.8",
            "--source",
            "srtm3,view3",
            "--hgt-dir",
            dir.path().to_str().unwrap(),
            "--list-files",
        ]),
        &mut out,
    )
    .unwrap();

    let listing = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("N43E006.hgt"));
    assert!(lines[1].ends_with("N43E007.hgt"));
}

#[test]
fn test_contours_as_json() {
    let dir = TempDir::new().unwrap();
    let file = write_ramp(dir.path(), "N43E006.hgt");

    let mut out = Vec::new();
    run(
        &args(&[
            file.to_str().unwrap(),
            "--step",
            "500",
            "--max-nodes-per-tile",
            "0",
            "--rdp-epsilon",
            "0.0001",
        ]),
        &mut out,
    )
    .unwrap();

    let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let tiles = json.as_array().unwrap();
    assert_eq!(tiles.len(), 1);
    assert!(tiles[0]["stats"]
        .as_str()
        .unwrap()
        .starts_with("tile with 1201 x 1201 points"));

    // Levels 0, 500 and 1000 below the 1200 m crest
    let levels = tiles[0]["contours"]["levels"].as_array().unwrap();
    let elevations: Vec<f64> = levels
        .iter()
        .map(|l| l["elevation"].as_f64().unwrap())
        .collect();
    assert_eq!(elevations, vec![0.0, 500.0, 1000.0]);

    // A straight east-west line simplified down to its endpoints
    let line = &levels[1]["lines"][0];
    assert_eq!(line["closed"], serde_json::Value::Bool(false));
    assert_eq!(line["points"].as_array().unwrap().len(), 2);
}
