use log::{Level, LevelFilter, Log, Metadata, Record};
use nalgebra::Matrix4;
use ndarray::{arr2, Array3};
use surfmap::{map_volume_to_coords, MappingOptions, Volume, VolumeRef};

use std::cell::RefCell;
use std::sync::Once;

/// Collects the records logged on the current thread. Tests run on separate threads, so they do not see each other's records.
struct CapturingLogger;

thread_local! {
    static RECORDS: RefCell<Vec<(Level, String)>> = RefCell::new(Vec::new());
}

impl Log for CapturingLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        RECORDS.with(|r| r.borrow_mut().push((record.level(), record.args().to_string())));
    }

    fn flush(&self) {}
}

static LOGGER: CapturingLogger = CapturingLogger;
static INIT: Once = Once::new();

/// Run `f` and return the warnings it logged on this thread.
fn warnings_of<F: FnOnce()>(f: F) -> Vec<String> {
    INIT.call_once(|| {
        log::set_logger(&LOGGER).unwrap();
        log::set_max_level(LevelFilter::Trace);
    });
    RECORDS.with(|r| r.borrow_mut().clear());
    f();
    RECORDS.with(|r| {
        r.borrow().iter().filter(|(level, _)| *level == Level::Warn).map(|(_, msg)| msg.clone()).collect()
    })
}

fn constant_volume(value: f64) -> VolumeRef {
    VolumeRef::from(Volume::new(Array3::from_elem((4, 4, 4), value), Matrix4::identity()))
}

fn map(volumes: &[VolumeRef], options: &MappingOptions) {
    let white = arr2(&[[1.0, 1.0, 0.0], [2.0, 3.0, 0.0]]);
    let pial = arr2(&[[1.0, 1.0, 2.0], [2.0, 3.0, 2.0]]);
    map_volume_to_coords(volumes, white.view(), pial.view(), options).unwrap();
}

#[test]
fn a_nonzero_exclude_threshold_is_warned_about_once() {
    let options = MappingOptions::default().exclude_threshold(0.9);
    let warnings = warnings_of(|| map(&[constant_volume(5.0)], &options));
    assert_eq!(1, warnings.len());
    assert!(warnings[0].contains("exclude_threshold"));
    assert!(warnings[0].contains("0.9"));
}

#[test]
fn each_failed_volume_is_warned_about() {
    let dir = tempfile::tempdir().unwrap();
    let volumes = vec![
        VolumeRef::Failed(String::from("corrupt header")),
        constant_volume(5.0),
        VolumeRef::Path(dir.path().join("missing.mgz")),
    ];
    let warnings = warnings_of(|| map(&volumes, &MappingOptions::default()));
    assert_eq!(2, warnings.len());
    assert!(warnings[0].starts_with("Volume 0"));
    assert!(warnings[0].contains("corrupt header"));
    assert!(warnings[1].starts_with("Volume 2"));
    assert!(warnings[1].contains("missing.mgz"));
}

#[test]
fn a_clean_mapping_logs_no_warnings() {
    let options = MappingOptions::default().exclude_threshold(0.0);
    let warnings = warnings_of(|| map(&[constant_volume(5.0), constant_volume(2.0)], &options));
    assert!(warnings.is_empty());
}
