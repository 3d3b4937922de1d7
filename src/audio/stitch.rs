use std::path::{Path, PathBuf};

use crate::audio::tempo::{atempo_filter, tempo_chain};
use crate::foundation::error::ReelResult;
use crate::job::progress::{ProgressTracker, bands, in_band};
use crate::job::staging::Staging;
use crate::plan::{AudioMixPlan, AudioRole, AudioSegment};
use crate::transcode::{StageRunner, TranscodeCommand};

pub const SAMPLE_RATE: u32 = 44_100;
pub const CHANNELS: u32 = 2;
/// Bitrate of the muxed AAC track.
pub const AAC_BITRATE: &str = "192k";
pub const LOUDNORM_FILTER: &str = "loudnorm=I=-16:TP=-1.5:LRA=11";

/// Voice track plus whether the background bed was mixed in.
#[derive(Clone, Debug, PartialEq)]
pub struct StitchedAudio {
    pub track: PathBuf,
    pub mixed: bool,
}

fn pcm_args() -> [String; 6] {
    [
        "-ac".to_string(),
        CHANNELS.to_string(),
        "-ar".to_string(),
        SAMPLE_RATE.to_string(),
        "-c:a".to_string(),
        "pcm_s16le".to_string(),
    ]
}

fn role_name(role: AudioRole) -> &'static str {
    match role {
        AudioRole::Intro => "intro",
        AudioRole::Main => "main",
        AudioRole::Background => "background",
    }
}

/// Lossless intermediate of exactly `segment.source_secs`. Sources without an audio stream
/// yield silence of that length; short streams are padded.
pub fn extract_command(segment: &AudioSegment, normalize: bool, out: &Path) -> TranscodeCommand {
    let stage = format!("audio-extract-{}", role_name(segment.role));
    let cmd = if segment.has_audio {
        let filter = if normalize {
            format!("{LOUDNORM_FILTER},apad")
        } else {
            "apad".to_string()
        };
        TranscodeCommand::new(stage, out)
            .input(&segment.source)
            .output_arg("-vn")
            .audio_filter(filter)
    } else {
        TranscodeCommand::new(stage, out).lavfi(format!(
            "anullsrc=r={SAMPLE_RATE}:cl=stereo"
        ))
    };
    cmd.output_args(pcm_args()).duration(segment.source_secs)
}

pub fn tempo_command(input: &Path, filter: &str, out: &Path) -> TranscodeCommand {
    TranscodeCommand::new("audio-tempo", out)
        .input(input)
        .audio_filter(filter)
        .output_args(pcm_args())
}

/// Hard-cut concatenation, `first` then `second`.
pub fn concat_command(first: &Path, second: &Path, out: &Path) -> TranscodeCommand {
    TranscodeCommand::new("audio-concat", out)
        .input(first)
        .input(second)
        .filter_complex("[0:a][1:a]concat=n=2:v=0:a=1[a]")
        .output_args(["-map", "[a]"])
        .output_args(pcm_args())
}

/// Voice at unity gain over the looped background bed, cut at `target_secs`.
pub fn mix_command(
    voice: &Path,
    background: &AudioSegment,
    target_secs: f64,
    out: &Path,
) -> TranscodeCommand {
    let graph = format!(
        "[0:a]volume=1.0[a1];[1:a]volume={:.3}[a2];\
         [a1][a2]amix=inputs=2:duration=shortest:dropout_transition=0:normalize=0[a]",
        background.gain
    );
    let bg_args: Vec<&str> = if background.looped {
        vec!["-stream_loop", "-1"]
    } else {
        Vec::new()
    };
    TranscodeCommand::new("audio-mix", out)
        .input(voice)
        .input_with(bg_args, &background.source)
        .filter_complex(graph)
        .output_args(["-map", "[a]"])
        .output_args(pcm_args())
        .duration(target_secs)
}

/// Video stream copied, audio re-encoded to AAC and padded/trimmed to `target_secs`.
pub fn mux_command(video: &Path, audio: &Path, target_secs: f64, out: &Path) -> TranscodeCommand {
    TranscodeCommand::new("mux", out)
        .input(video)
        .input(audio)
        .output_args(["-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy"])
        .output_args(["-c:a", "aac", "-b:a", AAC_BITRATE])
        .audio_filter("apad")
        .duration(target_secs)
        .output_args(["-movflags", "+faststart"])
}

/// Build the job's final audio track: extract, retime, concatenate and optionally mix.
/// Intermediates are released as soon as the consuming stage finished.
#[tracing::instrument(skip_all, fields(segments = plan.segments.len()))]
pub fn stitch_audio(
    runner: &mut StageRunner<'_>,
    staging: &Staging,
    plan: &AudioMixPlan,
    progress: &mut ProgressTracker,
) -> ReelResult<StitchedAudio> {
    let voice_parts: Vec<&AudioSegment> = [AudioRole::Intro, AudioRole::Main]
        .into_iter()
        .filter_map(|r| plan.segment(r))
        .filter(|s| s.source_secs > 0.0)
        .collect();
    let background = plan.background();
    let steps = voice_parts.len() as f64 + 2.0;
    let mut step = 0.0;
    let mut advance = |progress: &mut ProgressTracker, status: &str| {
        step += 1.0;
        progress.stage(in_band(bands::AUDIO, step / steps), status);
    };

    let mut parts = Vec::with_capacity(voice_parts.len());
    for segment in &voice_parts {
        let name = role_name(segment.role);
        let raw = staging.file(&format!("{name}.wav"));
        runner.run(&extract_command(segment, plan.normalize_loudness, &raw))?;

        let chain = tempo_chain(segment.tempo)?;
        let track = match atempo_filter(&chain) {
            Some(filter) => {
                tracing::debug!(tempo = segment.tempo, stages = chain.len(), "retiming audio");
                let timed = staging.file(&format!("{name}_tempo.wav"));
                runner.run(&tempo_command(&raw, &filter, &timed))?;
                staging.release(&raw);
                timed
            }
            None => raw,
        };
        advance(progress, &format!("{name} audio ready"));
        parts.push(track);
    }

    let mut voice = match parts.as_slice() {
        [] => {
            let silent = AudioSegment {
                role: AudioRole::Main,
                source: PathBuf::new(),
                has_audio: false,
                source_secs: plan.target_duration_secs,
                tempo: 1.0,
                gain: 1.0,
                looped: false,
            };
            let out = staging.file("voice.wav");
            runner.run(&extract_command(&silent, false, &out))?;
            out
        }
        [only] => only.clone(),
        [first, second, ..] => {
            let out = staging.file("voice.wav");
            runner.run(&concat_command(first, second, &out))?;
            staging.release(first);
            staging.release(second);
            out
        }
    };
    advance(progress, "voice track stitched");

    let mut mixed = false;
    if let Some(bg) = background
        && bg.gain > 0.0
    {
        let out = staging.file("mix.wav");
        runner.run(&mix_command(&voice, bg, plan.target_duration_secs, &out))?;
        staging.release(&voice);
        voice = out;
        mixed = true;
    }
    advance(progress, if mixed { "background mixed" } else { "audio ready" });

    Ok(StitchedAudio {
        track: voice,
        mixed,
    })
}

/// Mux `audio` against the video-only `video` into the staging namespace. Both inputs are
/// released afterwards.
pub fn mux(
    runner: &mut StageRunner<'_>,
    staging: &Staging,
    video: &Path,
    audio: &Path,
    target_secs: f64,
) -> ReelResult<PathBuf> {
    let out = staging.file("muxed.mp4");
    runner.run(&mux_command(video, audio, target_secs, &out))?;
    staging.release(video);
    staging.release(audio);
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/unit/audio/stitch.rs"]
mod tests;
