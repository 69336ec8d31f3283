use std::path::PathBuf;
use std::process::Command;

use wxpack::Spec;

fn exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_wxpack")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "wxpack.exe"
            } else {
                "wxpack"
            });
            p
        })
}

#[test]
fn cli_map_pack_extract_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let svg_path = dir.path().join("clear_day.svg");
    std::fs::write(&svg_path, include_str!("data/clear_day.svg")).unwrap();

    let spec_path = dir.path().join("clear_day.spec.json");
    let status = Command::new(exe())
        .args(["map", "--in"])
        .arg(&svg_path)
        .arg("--out")
        .arg(&spec_path)
        .status()
        .unwrap();
    assert!(status.success());

    let spec = Spec::from_canonical_json(&std::fs::read_to_string(&spec_path).unwrap()).unwrap();
    assert_eq!(spec.name, "clear_day");

    for layer in &spec.layers {
        let payload = dir.path().join(format!("{}_96.bin", layer.asset));
        std::fs::write(payload, [0x5A; 12]).unwrap();
    }

    let pack_path = dir.path().join("icons.wxpk");
    let status = Command::new(exe())
        .args(["pack", "--spec"])
        .arg(&spec_path)
        .arg("--assets-root")
        .arg(dir.path())
        .args(["--size", "96", "--out"])
        .arg(&pack_path)
        .status()
        .unwrap();
    assert!(status.success());

    let out_path = dir.path().join("extracted.json");
    let status = Command::new(exe())
        .args(["extract", "--verify", "--in"])
        .arg(&pack_path)
        .args(["--id", "clear-day", "--out"])
        .arg(&out_path)
        .status()
        .unwrap();
    assert!(status.success());

    let extracted =
        Spec::from_canonical_json(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(extracted, spec);
}

#[test]
fn cli_map_rejects_svg_without_a_name() {
    let dir = tempfile::tempdir().unwrap();
    // The file stem is the fallback name; an invalid one is fatal.
    let svg_path = dir.path().join("no näme.svg");
    std::fs::write(&svg_path, r#"<svg width="64" height="64"><circle r="4"/></svg>"#).unwrap();

    let status = Command::new(exe())
        .args(["map", "--in"])
        .arg(&svg_path)
        .arg("--out")
        .arg(dir.path().join("out.json"))
        .status()
        .unwrap();
    assert!(!status.success());
}
