// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use assert_cmd::Command;
use image::{GrayImage, Luma, RgbImage};
use std::path::Path;
use tempfile::TempDir;

fn stamver() -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("stamver")?;
    for var in [
        "SERVER_ADDRESS",
        "API_TOKEN",
        "TEAM_ID",
        "WORKSPACE_ID",
        "SLY_APP_DATA_DIR",
    ] {
        cmd.env_remove(var);
    }
    Ok(cmd)
}

/// Writes one 40x30 scan with two separate stamps and its sidecar files.
fn write_dataset(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let stamver = root.join("stamver");
    let scans = stamver.join("scans/scans");
    let masks = stamver.join("ground-truth-maps/ground-truth-maps");
    let info = stamver.join("info/info");
    for dir in [&scans, &masks, &info] {
        std::fs::create_dir_all(dir)?;
    }

    RgbImage::new(40, 30).save(scans.join("doc1.png"))?;
    RgbImage::new(40, 30).save(scans.join("doc2.png"))?;

    let mut mask = GrayImage::from_pixel(40, 30, Luma([255]));
    for (left, top) in [(2, 2), (25, 15)] {
        for y in top..top + 5 {
            for x in left..left + 5 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
    }
    mask.save(masks.join("doc1-gt.png"))?;
    std::fs::write(info.join("doc1.txt"), "sig\toverlap\tcount\r\n0\t1\t2\r\n")?;

    Ok(())
}

#[test]
fn test_help() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = stamver()?;
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("download"))
        .stdout(predicates::str::contains("convert"))
        .stdout(predicates::str::contains("annotate"));
    Ok(())
}

#[test]
fn test_version() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = stamver()?;
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicates::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn test_annotate() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    write_dataset(dir.path())?;

    let mut cmd = stamver()?;
    cmd.arg("annotate").arg(dir.path()).arg("doc1.png");
    let output = cmd.ok()?.stdout;
    let annotation: serde_json::Value = serde_json::from_slice(&output)?;

    assert_eq!(annotation["size"]["width"], 40);
    assert_eq!(annotation["size"]["height"], 30);

    let tags = annotation["tags"].as_array().unwrap();
    assert_eq!(tags.len(), 3);
    assert_eq!(tags[0]["value"], "present");
    assert_eq!(tags[1]["value"], "true");
    assert_eq!(tags[2]["value"], 2);

    let objects = annotation["objects"].as_array().unwrap();
    assert_eq!(objects.len(), 2);
    assert_eq!(objects[0]["classTitle"], "stamp");
    assert_eq!(objects[0]["bitmap"]["origin"], serde_json::json!([2, 2]));
    assert_eq!(objects[1]["bitmap"]["origin"], serde_json::json!([25, 15]));
    Ok(())
}

#[test]
fn test_annotate_without_info() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    write_dataset(dir.path())?;

    let mut cmd = stamver()?;
    cmd.arg("annotate").arg(dir.path()).arg("doc2.png");
    let output = cmd.ok()?.stdout;
    let annotation: serde_json::Value = serde_json::from_slice(&output)?;

    assert_eq!(annotation["size"]["width"], 40);
    assert!(annotation["tags"].as_array().unwrap().is_empty());
    assert!(annotation["objects"].as_array().unwrap().is_empty());
    Ok(())
}

#[test]
fn test_annotate_missing_image() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    write_dataset(dir.path())?;

    let mut cmd = stamver()?;
    cmd.arg("annotate").arg(dir.path()).arg("missing.png");
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("Image not found"));
    Ok(())
}

#[test]
fn test_convert_requires_server() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    write_dataset(dir.path())?;

    let mut cmd = stamver()?;
    cmd.arg("convert")
        .arg("StaVer")
        .arg("--dataset-root")
        .arg(dir.path());
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("SERVER_ADDRESS"));
    Ok(())
}

#[test]
fn test_download_requires_source() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = stamver()?;
    cmd.args([
        "--server",
        "https://app.example.com",
        "--token",
        "token",
        "--team-id",
        "8",
        "download",
        "--teamfiles-dir",
        "/stamver",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("--archive"));
    Ok(())
}
