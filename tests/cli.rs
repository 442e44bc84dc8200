use std::{
    path::{Path, PathBuf},
    process::{Command, Output},
};

use depthbench::PacketWriter;

fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("depthbench-cli-{}-{name}", std::process::id()))
}

/// Write a log of 2x2 frames with the given payload sizes.
fn fixture(name: &str, sizes: &[usize]) -> PathBuf {
    let path = scratch(name);
    let mut w = PacketWriter::create(&path, &[]).unwrap();
    for (i, &n) in sizes.iter().enumerate() {
        // I = 1000, Q = 1000: a valid pixel at 45 degrees
        let payload: Vec<u8> = [0xe8, 0x03, 0xe8, 0x03].into_iter().cycle().take(n).collect();
        w.write_packet(33 * i as u32, i as u32, &payload).unwrap();
    }
    w.finish().unwrap();
    path
}

fn depthbench(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_depthbench"))
        .args(args)
        .output()
        .unwrap()
}

fn frames(log: &Path, extra: &[&str]) -> Output {
    let mut args = vec![log.to_str().unwrap(), "--width", "2", "--height", "2"];
    args.extend(extra);
    depthbench(&args)
}

#[test]
fn completes() {
    let log = fixture("complete.kct2", &[16, 16, 16]);
    let out = frames(&log, &["--reference", "table", "--candidate", "exact"]);
    std::fs::remove_file(&log).unwrap();
    assert_eq!(out.status.code(), Some(0), "{out:?}");
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Frame 2"), "{stdout}");
    assert!(stdout.contains("Summary over 3 frames"), "{stdout}");
}

#[test]
fn empty_log() {
    let log = fixture("empty.kct2", &[]);
    let out = frames(&log, &[]);
    std::fs::remove_file(&log).unwrap();
    assert_eq!(out.status.code(), Some(0), "{out:?}");
    assert!(String::from_utf8_lossy(&out.stdout).contains("Summary over 0 frames"));
}

#[test]
fn usage() {
    assert_eq!(depthbench(&[]).status.code(), Some(1));
    assert_eq!(depthbench(&["--help"]).status.code(), Some(0));
    assert_eq!(
        depthbench(&["x.kct2", "--candidate", "fast"]).status.code(),
        Some(1)
    );
}

#[test]
fn unreadable_log() {
    let out = depthbench(&[scratch("missing.kct2").to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("could not open"));

    let path = scratch("magic.kct2");
    std::fs::write(&path, b"kct1\x01\x00\x00\x00\x00\x00").unwrap();
    let out = depthbench(&[path.to_str().unwrap()]);
    std::fs::remove_file(&path).unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("unknown file type"));
}

#[test]
fn bad_resolution() {
    let log = fixture("resolution.kct2", &[16]);
    let out = frames(&log, &["--resolution", "1"]);
    std::fs::remove_file(&log).unwrap();
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn fails_mid_stream() {
    // Second frame has the wrong payload size
    let log = fixture("short.kct2", &[16, 12, 16]);
    let out = frames(&log, &[]);
    std::fs::remove_file(&log).unwrap();
    assert_eq!(out.status.code(), Some(1), "{out:?}");
    assert!(String::from_utf8_lossy(&out.stdout).contains("Frame 0"));
    assert!(!String::from_utf8_lossy(&out.stdout).contains("Summary"));

    // Truncated payload
    let log = fixture("truncated.kct2", &[16, 16]);
    let mut data = std::fs::read(&log).unwrap();
    data.truncate(data.len() - 5);
    std::fs::write(&log, data).unwrap();
    let out = frames(&log, &[]);
    std::fs::remove_file(&log).unwrap();
    assert_eq!(out.status.code(), Some(1), "{out:?}");
    assert!(String::from_utf8_lossy(&out.stderr).contains("truncated"));
}
