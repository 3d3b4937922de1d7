use std::io::Read;
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::foundation::core::Fps;
use crate::foundation::error::{ReelError, ReelResult};
use crate::model::SourceClip;
use crate::render::surface::Surface;

/// Decoded frames of one source clip, sampled by source time.
pub trait FrameSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn duration(&self) -> f64;
    /// Frame displayed at `source_time` seconds, or `None` once the stream is exhausted.
    fn frame_at(&mut self, source_time: f64) -> ReelResult<Option<&Surface>>;
}

#[derive(serde::Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    #[serde(default)]
    tags: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(serde::Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(serde::Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

impl ProbeStream {
    /// Display rotation in degrees, normalized to `0..360`. The display matrix wins over the
    /// legacy `rotate` tag.
    fn rotation(&self) -> i64 {
        let degrees = self
            .side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| self.tags.get("rotate").and_then(|r| r.trim().parse::<f64>().ok()))
            .unwrap_or(0.0);
        (degrees.round() as i64).rem_euclid(360)
    }
}

/// Probe duration, dimensions and audio presence with `ffprobe`.
#[tracing::instrument]
pub fn probe_clip(path: &Path) -> ReelResult<SourceClip> {
    if !path.is_file() {
        return Err(ReelError::validation(format!(
            "'{}' does not exist or is not a file",
            path.display()
        )));
    }

    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| ReelError::capability(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(ReelError::validation(format!(
            "'{}' is not decodable media: {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    parse_probe(path, &out.stdout)
}

/// Build a [`SourceClip`] from `ffprobe -print_format json` output. Dimensions are the
/// displayed ones: ffmpeg applies the rotation on decode, so quarter turns swap them.
fn parse_probe(path: &Path, json: &[u8]) -> ReelResult<SourceClip> {
    let parsed: ProbeOut = serde_json::from_slice(json)
        .map_err(|e| ReelError::internal(format!("ffprobe json parse failed: {e}")))?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let parse_secs = |s: &Option<String>| s.as_deref().and_then(|v| v.parse::<f64>().ok());
    let duration = parsed
        .format
        .as_ref()
        .and_then(|f| parse_secs(&f.duration))
        .or_else(|| video.and_then(|v| parse_secs(&v.duration)))
        .unwrap_or(0.0);

    let coded_w = video.and_then(|v| v.width).unwrap_or(0);
    let coded_h = video.and_then(|v| v.height).unwrap_or(0);
    let rotation = video.map_or(0, ProbeStream::rotation);
    let (width, height) = if rotation % 180 == 90 {
        tracing::debug!(rotation, "rotated stream; swapping dimensions");
        (coded_h, coded_w)
    } else {
        (coded_w, coded_h)
    };

    Ok(SourceClip {
        path: path.to_path_buf(),
        duration,
        width,
        height,
        has_audio,
    })
}

/// Sequential decode cursor over one clip, backed by a streaming `ffmpeg` child.
///
/// The child emits frames resampled at `fps / speed` in source time, which is exactly the
/// sampling grid of the compositor. A non-sequential request respawns the child at the new time.
pub struct FfmpegFrameSource {
    clip: SourceClip,
    sample_rate: f64,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    frame: Surface,
    /// Source time of the next frame the child will emit.
    next_time: f64,
    has_frame: bool,
    frames_read: u64,
}

/// Requests this many frames ahead of the cursor are served by reading forward.
const MAX_SKIP_FRAMES: u32 = 8;

impl FfmpegFrameSource {
    pub fn open(clip: &SourceClip, fps: Fps, speed: f64) -> ReelResult<Self> {
        if clip.width == 0 || clip.height == 0 {
            return Err(ReelError::validation(format!(
                "'{}' has no video stream",
                clip.path.display()
            )));
        }
        if !speed.is_finite() || speed <= 0.0 {
            return Err(ReelError::validation("decode speed must be positive"));
        }
        let frame = Surface::from_rgba(
            clip.width,
            clip.height,
            vec![0u8; clip.width as usize * clip.height as usize * 4],
        )?;
        Ok(Self {
            clip: clip.clone(),
            sample_rate: fps.as_f64() / speed,
            child: None,
            stdout: None,
            frame,
            next_time: 0.0,
            has_frame: false,
            frames_read: 0,
        })
    }

    fn step(&self) -> f64 {
        1.0 / self.sample_rate
    }

    fn spawn_at(&mut self, start: f64) -> ReelResult<()> {
        self.kill();
        tracing::debug!(source = %self.clip.path.display(), start, "seeking decode cursor");
        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-ss", &format!("{start:.6}")])
            .arg("-i")
            .arg(&self.clip.path)
            .args([
                "-an",
                "-vf",
                &format!("fps={:.9}", self.sample_rate),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ReelError::capability(format!("failed to spawn ffmpeg decoder: {e}")))?;
        self.stdout = child.stdout.take();
        self.child = Some(child);
        self.next_time = start;
        Ok(())
    }

    /// Read the next frame from the child. `false` on end of stream.
    fn read_next(&mut self) -> ReelResult<bool> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(false);
        };
        match stdout.read_exact(self.frame.data_mut()) {
            Ok(()) => {
                self.has_frame = true;
                self.frames_read += 1;
                self.next_time += self.step();
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.finish_child()?;
                Ok(false)
            }
            Err(e) => Err(ReelError::process(
                "video-decode",
                format!("reading frames of '{}': {e}", self.clip.path.display()),
            )),
        }
    }

    fn finish_child(&mut self) -> ReelResult<()> {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let status = child
                .wait()
                .map_err(|e| ReelError::process("video-decode", e.to_string()))?;
            if !status.success() && self.frames_read == 0 {
                return Err(ReelError::process(
                    "video-decode",
                    format!("ffmpeg could not decode '{}' ({status})", self.clip.path.display()),
                ));
            }
        }
        Ok(())
    }

    fn kill(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl FrameSource for FfmpegFrameSource {
    fn width(&self) -> u32 {
        self.clip.width
    }

    fn height(&self) -> u32 {
        self.clip.height
    }

    fn duration(&self) -> f64 {
        self.clip.duration
    }

    fn frame_at(&mut self, source_time: f64) -> ReelResult<Option<&Surface>> {
        if source_time >= self.clip.duration {
            return Ok(None);
        }
        let step = self.step();
        let ahead = (source_time - self.next_time) / step;
        let sequential = self.stdout.is_some() && ahead > -0.5;
        if !sequential || ahead > f64::from(MAX_SKIP_FRAMES) {
            self.spawn_at(source_time.max(0.0))?;
        }
        while self.next_time + step * 0.5 <= source_time {
            if !self.read_next()? {
                return Ok(None);
            }
        }
        if !self.read_next()? {
            return Ok(None);
        }
        Ok(self.has_frame.then_some(&self.frame))
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/media.rs"]
mod tests;
