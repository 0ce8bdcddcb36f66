//! Capture device and training capture against a stand-in utility.
//!
//! A small shell script plays the camera: it writes its `-o` argument and
//! prints to stdout/stderr the way the real utility does.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_lite::future;

use sorter::app::ports::CapturePort;
use sorter::capture::{CaptureDevice, TrainingCapture};
use sorter::config::CaptureConfig;

/// Writes a fake camera script into `dir` and returns its path.
fn fake_camera(dir: &Path) -> PathBuf {
    let script = dir.join("fake-still");
    fs::write(
        &script,
        "#!/bin/sh\n\
         while [ $# -gt 0 ]; do\n\
           if [ \"$1\" = \"-o\" ]; then out=\"$2\"; fi\n\
           shift\n\
         done\n\
         echo \"captured $out\"\n\
         echo 'mmal: sensor warm' >&2\n\
         printf 'JPEG' > \"$out\"\n",
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    script
}

fn config(program: &Path, output: &Path) -> CaptureConfig {
    CaptureConfig {
        program: program.display().to_string(),
        output_path: output.display().to_string(),
        poll_interval_ms: 2,
        ..CaptureConfig::default()
    }
}

#[test]
fn capture_writes_frame_and_reports_public_reference() {
    let dir = tempfile::tempdir().unwrap();
    let camera = fake_camera(dir.path());
    let out = dir.path().join("public").join("currentBlock.jpg");

    let mut dev = CaptureDevice::new(config(&camera, &out));
    let frame = future::block_on(dev.capture()).expect("frame");

    assert_eq!(frame.path, out);
    assert_eq!(frame.reference, "/currentBlock.jpg");
    assert_eq!(fs::read(&out).unwrap(), b"JPEG");
    assert_eq!(dev.capture_count(), 1);

    // A second capture replaces the first.
    assert!(future::block_on(dev.capture()).is_some());
    assert_eq!(dev.capture_count(), 2);
}

#[test]
fn training_capture_numbers_frames_from_zero() {
    let dir = tempfile::tempdir().unwrap();
    let camera = fake_camera(dir.path());
    let root = dir.path().join("data");

    let mut tc = TrainingCapture::new(&config(&camera, Path::new("unused.jpg")), &root, "gears")
        .unwrap();
    let paths: Vec<PathBuf> = (0..3)
        .map(|_| future::block_on(tc.capture_next()).unwrap())
        .collect();

    assert_eq!(
        paths,
        vec![
            root.join("gears/0.jpg"),
            root.join("gears/1.jpg"),
            root.join("gears/2.jpg")
        ]
    );
    assert_eq!(tc.captured(), 3);
    assert!(paths.iter().all(|p| p.exists()));
}

#[test]
fn training_capture_rejects_path_like_categories() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = CaptureConfig::default();
    assert!(TrainingCapture::new(&cfg, dir.path(), "../escape").is_err());
    assert!(TrainingCapture::new(&cfg, dir.path(), "").is_err());
}

#[test]
fn failed_training_capture_does_not_advance_index() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = CaptureConfig {
        program: "false".into(),
        poll_interval_ms: 2,
        ..CaptureConfig::default()
    };
    let mut tc = TrainingCapture::new(&cfg, dir.path(), "axel").unwrap();
    assert!(future::block_on(tc.capture_next()).is_none());
    assert_eq!(tc.captured(), 0);
}

#[test]
fn chatty_utility_cannot_stall_capture() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("chatty-still");
    fs::write(
        &script,
        "#!/bin/sh\n\
         while [ $# -gt 0 ]; do\n\
           if [ \"$1\" = \"-o\" ]; then out=\"$2\"; fi\n\
           shift\n\
         done\n\
         head -c 200000 /dev/zero | tr '\\0' 'x' >&2\n\
         head -c 100000 /dev/zero | tr '\\0' 'y'\n\
         printf 'JPEG' > \"$out\"\n",
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    let out = dir.path().join("currentBlock.jpg");

    let mut dev = CaptureDevice::new(config(&script, &out));
    let frame = future::block_on(future::or(
        async { Some(dev.capture().await) },
        async {
            async_io_mini::Timer::after(Duration::from_secs(10)).await;
            None
        },
    ));

    let frame = frame.expect("capture did not finish");
    assert_eq!(frame.map(|f| f.path), Some(out.clone()));
    assert_eq!(fs::read(&out).unwrap(), b"JPEG");
}
