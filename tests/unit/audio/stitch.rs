use super::*;
use crate::foundation::error::ReelError;
use crate::job::CancelToken;
use crate::transcode::Transcoder;

/// Records commands and creates their outputs so releases are observable.
#[derive(Default)]
struct Touching {
    commands: Vec<TranscodeCommand>,
}

impl Transcoder for Touching {
    fn run(&mut self, cmd: &TranscodeCommand) -> ReelResult<()> {
        std::fs::write(cmd.output(), b"x").unwrap();
        self.commands.push(cmd.clone());
        Ok(())
    }
}

fn segment(role: AudioRole, secs: f64, tempo: f64) -> AudioSegment {
    AudioSegment {
        role,
        source: PathBuf::from(format!("/media/{role:?}.mp4")),
        has_audio: true,
        source_secs: secs,
        tempo,
        gain: 1.0,
        looped: false,
    }
}

fn background(gain: f64) -> AudioSegment {
    AudioSegment {
        role: AudioRole::Background,
        source: PathBuf::from("/media/bed.mp3"),
        has_audio: true,
        source_secs: 180.0,
        tempo: 1.0,
        gain,
        looped: true,
    }
}

fn plan(segments: Vec<AudioSegment>) -> AudioMixPlan {
    AudioMixPlan {
        segments,
        target_duration_secs: 180.0,
        normalize_loudness: false,
    }
}

fn stages(t: &Touching) -> Vec<&str> {
    t.commands.iter().map(|c| c.stage()).collect()
}

fn run_stitch(plan: &AudioMixPlan) -> (Touching, StitchedAudio, Vec<PathBuf>) {
    let staging = Staging::new(None).unwrap();
    let cancel = CancelToken::new();
    let mut t = Touching::default();
    let stitched = {
        let mut runner = StageRunner::new(&mut t, &cancel);
        let mut progress = ProgressTracker::new(None);
        stitch_audio(&mut runner, &staging, plan, &mut progress).unwrap()
    };
    let live = staging.live_files().unwrap();
    (t, stitched, live)
}

#[test]
fn background_is_looped_and_mixed() {
    let p = plan(vec![
        segment(AudioRole::Intro, 10.0, 1.0),
        segment(AudioRole::Main, 170.0, 1.0),
        background(0.1),
    ]);
    let (t, stitched, live) = run_stitch(&p);
    assert_eq!(
        stages(&t),
        vec![
            "audio-extract-intro",
            "audio-extract-main",
            "audio-concat",
            "audio-mix"
        ]
    );
    assert!(stitched.mixed);
    let mix = &t.commands[3];
    assert_eq!(mix.inputs()[1].args, vec!["-stream_loop", "-1"]);
    assert_eq!(mix.output_value("-t"), Some("180.000000"));
    let graph = mix.output_value("-filter_complex").unwrap();
    assert!(graph.contains("volume=0.100"));
    assert!(graph.contains("duration=shortest"));
    // only the final track survives
    assert_eq!(live, vec![stitched.track.clone()]);
}

#[test]
fn zero_gain_background_skips_mix() {
    let p = plan(vec![
        segment(AudioRole::Intro, 10.0, 1.0),
        segment(AudioRole::Main, 170.0, 1.0),
        background(0.0),
    ]);
    let (t, stitched, _) = run_stitch(&p);
    assert!(!stages(&t).contains(&"audio-mix"));
    assert!(!stitched.mixed);
    assert_eq!(stitched.track.file_name().unwrap(), "voice.wav");
}

#[test]
fn double_speed_main_chains_two_tempo_stages() {
    let p = plan(vec![
        segment(AudioRole::Intro, 5.0, 1.0),
        segment(AudioRole::Main, 350.0, 2.0),
    ]);
    let (t, _, _) = run_stitch(&p);
    let tempo: Vec<_> = t
        .commands
        .iter()
        .filter(|c| c.stage() == "audio-tempo")
        .collect();
    assert_eq!(tempo.len(), 1);
    assert_eq!(
        tempo[0].output_value("-af"),
        Some("atempo=2.000000,atempo=1.000000")
    );
}

#[test]
fn silent_clip_synthesizes_silence() {
    let mut intro = segment(AudioRole::Intro, 4.0, 1.0);
    intro.has_audio = false;
    let p = plan(vec![intro, segment(AudioRole::Main, 20.0, 1.0)]);
    let (t, _, _) = run_stitch(&p);
    let first = &t.commands[0];
    assert_eq!(first.inputs()[0].args, vec!["-f", "lavfi"]);
    assert!(first.inputs()[0].source.starts_with("anullsrc"));
    assert_eq!(first.output_value("-t"), Some("4.000000"));
}

#[test]
fn loudness_normalization_precedes_padding() {
    let cmd = extract_command(
        &segment(AudioRole::Main, 3.0, 1.0),
        true,
        Path::new("/tmp/m.wav"),
    );
    assert_eq!(
        cmd.output_value("-af"),
        Some("loudnorm=I=-16:TP=-1.5:LRA=11,apad")
    );
    assert!(cmd.has_output_arg("pcm_s16le"));
}

#[test]
fn mux_copies_video_and_encodes_aac() {
    let cmd = mux_command(
        Path::new("/s/video.mp4"),
        Path::new("/s/voice.wav"),
        180.0,
        Path::new("/s/muxed.mp4"),
    );
    assert_eq!(cmd.output_value("-c:v"), Some("copy"));
    assert_eq!(cmd.output_value("-c:a"), Some("aac"));
    assert_eq!(cmd.output_value("-b:a"), Some("192k"));
    assert_eq!(cmd.output_value("-t"), Some("180.000000"));
}

#[test]
fn abort_stops_before_next_stage() {
    let staging = Staging::new(None).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let mut t = Touching::default();
    let mut runner = StageRunner::new(&mut t, &cancel);
    let mut progress = ProgressTracker::new(None);
    let p = plan(vec![segment(AudioRole::Intro, 1.0, 1.0)]);
    let err = stitch_audio(&mut runner, &staging, &p, &mut progress).unwrap_err();
    assert!(matches!(err, ReelError::Cancelled));
    assert!(runner.completed().is_empty());
}
