use std::sync::{Arc, Mutex};

use super::*;

fn recording() -> (ProgressTracker, Arc<Mutex<Vec<ProgressSnapshot>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let tracker = ProgressTracker::new(Some(Box::new(move |s: &ProgressSnapshot| {
        sink.lock().unwrap().push(s.clone());
    })));
    (tracker, seen)
}

#[test]
fn percentages_never_decrease() {
    let (mut t, seen) = recording();
    t.stage(10.0, "a");
    t.stage(5.0, "b");
    t.stage(f32::NAN, "c");
    t.stage(150.0, "d");
    let seen = seen.lock().unwrap();
    let pcts: Vec<f32> = seen.iter().map(|s| s.percent).collect();
    assert_eq!(pcts, vec![10.0, 10.0, 10.0, 100.0]);
    assert_eq!(seen[1].status, "b");
}

#[test]
fn frame_updates_are_throttled() {
    let (t, seen) = recording();
    let mut t = t.with_min_interval(Duration::from_secs(3600));
    t.frame(1.0, || "f1".to_string());
    t.frame(2.0, || unreachable!("throttled"));
    t.frame(3.0, || unreachable!("throttled"));
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(t.percent(), 3.0);

    t.stage(4.0, "boundary");
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[test]
fn unthrottled_tracker_emits_every_frame() {
    let (t, seen) = recording();
    let mut t = t.with_min_interval(Duration::ZERO);
    for i in 0..5 {
        t.frame(i as f32, || format!("frame {i}"));
    }
    assert_eq!(seen.lock().unwrap().len(), 5);
    assert_eq!(t.history().len(), 5);
}

#[test]
fn eta_appears_after_threshold() {
    let (mut t, seen) = recording();
    t.stage(1.0, "early");
    t.stage(50.0, "half");
    t.stage(100.0, "done");
    let seen = seen.lock().unwrap();
    assert!(seen[0].eta_secs.is_none());
    assert!(seen[1].eta_secs.is_some());
    assert!(seen[2].eta_secs.is_none());
}

#[test]
fn bands_map_fractions() {
    assert_eq!(in_band(bands::VIDEO, 0.0), 5.0);
    assert_eq!(in_band(bands::VIDEO, 1.0), 75.0);
    assert_eq!(in_band(bands::MUX, 2.0), 100.0);
}
