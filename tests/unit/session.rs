use super::*;
use crate::assets::media::FrameSource;
use crate::encode::sink::FrameSink;
use crate::foundation::core::{Canvas, Fps};
use crate::job::liveness::{NoKeepAlive, NoYield};
use crate::model::SourceClip;
use chrono::TimeZone;

struct NoMedia;

impl MediaIo for NoMedia {
    fn probe(&mut self, path: &Path) -> ReelResult<SourceClip> {
        Err(ReelError::validation(format!("no such clip {}", path.display())))
    }

    fn open_source(
        &mut self,
        _clip: &SourceClip,
        _fps: Fps,
        _speed: f64,
    ) -> ReelResult<Box<dyn FrameSource>> {
        Err(ReelError::capability("no decoder"))
    }

    fn open_sink(&mut self, _out: &Path) -> ReelResult<Box<dyn FrameSink>> {
        Err(ReelError::capability("no encoder"))
    }

    fn probe_encoder(&mut self, _canvas: Canvas, _fps: Fps) -> Option<String> {
        None
    }
}

struct Refusing;

impl Transcoder for Refusing {
    fn run(&mut self, cmd: &crate::transcode::TranscodeCommand) -> ReelResult<()> {
        Err(ReelError::process(cmd.stage(), "refused"))
    }
}

fn request(dir: &Path) -> JobRequest {
    JobRequest {
        inputs: JobInputs {
            intro: dir.join("intro.mp4"),
            main: dir.join("main.mp4"),
            background: None,
        },
        config: JobConfig::default(),
        output_dir: dir.to_path_buf(),
        file_name: Some("out.mp4".to_string()),
    }
}

#[test]
fn output_name_is_timestamped() {
    let at = chrono::Utc.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();
    assert_eq!(default_output_name(at), "reel_20260307_090501.mp4");
}

#[test]
fn summary_renders_megabytes_and_seconds() {
    let s = format_summary(12_897_485, Duration::from_millis(45_230));
    assert_eq!(s, "12.3 MB · 45.2 s");
}

#[test]
fn abort_without_active_job_is_a_noop() {
    let session = Session::new();
    assert!(!session.abort());
    assert!(!session.abort());
    assert!(!session.is_busy());
}

#[test]
fn concurrent_generate_is_rejected() {
    let session = Session::new();
    let (token, active) = session.begin().unwrap();
    assert!(session.is_busy());

    let dir = tempfile::tempdir().unwrap();
    let mut media = NoMedia;
    let mut keep = NoKeepAlive;
    let mut yielder = NoYield;
    let mut tx = Refusing;
    let env = JobEnv {
        media: &mut media,
        transcoder: Some(&mut tx),
        keep_alive: &mut keep,
        yielder: &mut yielder,
        progress: None,
        staging_parent: Some(dir.path().to_path_buf()),
    };
    let err = session.generate(&request(dir.path()), env).unwrap_err();
    assert!(matches!(err, ReelError::Busy));

    // the running job is untouched and still abortable
    assert!(session.abort_handle().abort());
    assert!(token.is_cancelled());
    drop(active);
    assert!(!session.is_busy());
}

#[test]
fn probe_failure_ends_failed_with_clean_staging() {
    let session = Session::new();
    let dir = tempfile::tempdir().unwrap();
    let staging_parent = dir.path().join("staging");
    let mut media = NoMedia;
    let mut keep = NoKeepAlive;
    let mut yielder = NoYield;
    let mut tx = Refusing;
    let env = JobEnv {
        media: &mut media,
        transcoder: Some(&mut tx),
        keep_alive: &mut keep,
        yielder: &mut yielder,
        progress: None,
        staging_parent: Some(staging_parent.clone()),
    };
    let outcome = session.generate(&request(dir.path()), env).unwrap();
    assert_eq!(outcome.state, JobState::Failed);
    assert_eq!(
        outcome.history,
        vec![JobState::Idle, JobState::Loading, JobState::Failed]
    );
    assert!(outcome.report.is_none());
    assert!(outcome.status_line().starts_with("invalid input"));
    assert_eq!(std::fs::read_dir(&staging_parent).unwrap().count(), 0);
    assert!(!session.is_busy());
}
