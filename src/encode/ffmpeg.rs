use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::encode::sink::{FrameMeta, FrameSink, OrderGuard, SinkConfig, KEYFRAME_INTERVAL};
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::surface::Surface;

const STAGE: &str = "video-encode";

/// H.264 encoders tried by the capability probe, in order of preference.
pub const ENCODER_CANDIDATES: [&str; 2] = ["libx264", "libopenh264"];

/// Options for [`FfmpegSink`].
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// Video-only MP4 output path.
    pub out_path: PathBuf,
    pub overwrite: bool,
}

impl FfmpegSinkOpts {
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
        }
    }
}

/// Sink that spawns the system `ffmpeg` and streams raw RGBA frames to stdin.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    cfg: Option<SinkConfig>,
    order: OrderGuard,
}

impl FfmpegSink {
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
            cfg: None,
            order: OrderGuard::default(),
        }
    }

    fn encode_args(cfg: &SinkConfig) -> Vec<String> {
        let mut args = vec![
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgba".to_string(),
            "-s".to_string(),
            format!("{}x{}", cfg.canvas.width, cfg.canvas.height),
            // For rawvideo input, `-r` before `-i` sets the input frame rate.
            "-r".to_string(),
            cfg.fps.ffmpeg_rate(),
            "-i".to_string(),
            "pipe:0".to_string(),
            "-an".to_string(),
            "-c:v".to_string(),
            cfg.encoder.clone(),
            "-b:v".to_string(),
            cfg.quality.bitrate.to_string(),
            "-g".to_string(),
            KEYFRAME_INTERVAL.to_string(),
        ];
        if cfg.encoder == "libx264" {
            args.extend(["-preset".to_string(), cfg.quality.encoder_preset.to_string()]);
        }
        args.extend([
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-frames:v".to_string(),
            cfg.total_frames.to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]);
        args
    }

    fn join_stderr(&mut self) -> Vec<u8> {
        match self.stderr_drain.take() {
            Some(handle) => match handle.join() {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(e)) => format!("ffmpeg stderr read failed: {e}").into_bytes(),
                Err(_) => b"ffmpeg stderr drain thread panicked".to_vec(),
            },
            None => Vec::new(),
        }
    }
}

impl FrameSink for FfmpegSink {
    #[tracing::instrument(skip(self, cfg), fields(encoder = %cfg.encoder, frames = cfg.total_frames))]
    fn begin(&mut self, cfg: SinkConfig) -> ReelResult<()> {
        validate_canvas(cfg.canvas)?;
        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(ReelError::validation(format!(
                "refusing to overwrite '{}'",
                self.opts.out_path.display()
            )));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .arg(if self.opts.overwrite { "-y" } else { "-n" })
            .args(Self::encode_args(&cfg))
            .arg(&self.opts.out_path);
        tracing::debug!(out = %self.opts.out_path.display(), "spawning streaming encoder");

        let mut child = cmd.spawn().map_err(|e| {
            ReelError::capability(format!(
                "cannot start ffmpeg encoder: {e}"
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReelError::process(STAGE, "failed to open ffmpeg stdin"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReelError::process(STAGE, "failed to open ffmpeg stderr"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.cfg = Some(cfg);
        self.order.reset();
        Ok(())
    }

    fn push_frame(&mut self, meta: FrameMeta, frame: &Surface) -> ReelResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| ReelError::internal("ffmpeg sink not started"))?;
        self.order.check(meta)?;
        if frame.canvas() != cfg.canvas {
            return Err(ReelError::validation(format!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width(),
                frame.height(),
                cfg.canvas.width,
                cfg.canvas.height
            )));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ReelError::internal("ffmpeg sink is already finalized"));
        };
        use std::io::Write as _;
        if let Err(e) = stdin.write_all(frame.data()) {
            // A broken pipe means the encoder died; its stderr is the useful part.
            drop(self.stdin.take());
            if let Some(mut child) = self.child.take() {
                let _ = child.wait();
            }
            let stderr = self.join_stderr();
            let msg = String::from_utf8_lossy(&stderr);
            return Err(ReelError::process(
                STAGE,
                format!("failed to write frame to ffmpeg stdin: {e}: {}", msg.trim()),
            ));
        }
        Ok(())
    }

    fn end(&mut self) -> ReelResult<u64> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| ReelError::internal("ffmpeg sink not started"))?;
        let status = child
            .wait()
            .map_err(|e| ReelError::process(STAGE, format!("failed to wait for ffmpeg: {e}")))?;
        let stderr_bytes = self.join_stderr();
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(ReelError::process(
                STAGE,
                format!("ffmpeg exited with status {status}: {}", stderr.trim()),
            ));
        }
        self.cfg = None;

        use anyhow::Context as _;
        let bytes = std::fs::metadata(&self.opts.out_path)
            .with_context(|| format!("stat encoded '{}'", self.opts.out_path.display()))?
            .len();
        Ok(bytes)
    }

    fn abort(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        let _ = self.join_stderr();
        self.cfg = None;
        if self.opts.out_path.exists()
            && let Err(e) = std::fs::remove_file(&self.opts.out_path)
        {
            tracing::warn!(error = %e, "could not remove partial encode output");
        }
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.abort();
        }
    }
}

fn validate_canvas(canvas: Canvas) -> ReelResult<()> {
    if canvas.width == 0 || canvas.height == 0 {
        return Err(ReelError::validation(
            "encoder canvas is empty",
        ));
    }
    if !canvas.width.is_multiple_of(2) || !canvas.height.is_multiple_of(2) {
        return Err(ReelError::validation(
            "encoder canvas dimensions must be even for yuv420p",
        ));
    }
    Ok(())
}

/// Encode one black raw frame with `encoder`; success means the encoder accepts the target
/// profile.
pub fn trial_encode(encoder: &str, canvas: Canvas, fps: Fps) -> bool {
    if validate_canvas(canvas).is_err() {
        return false;
    }
    let status = Command::new("ffmpeg")
        .args(["-v", "error", "-f", "lavfi", "-i"])
        .arg(format!(
            "color=c=black:s={}x{}:r={}",
            canvas.width,
            canvas.height,
            fps.ffmpeg_rate()
        ))
        .args(["-frames:v", "1", "-c:v", encoder, "-pix_fmt", "yuv420p", "-f", "null", "-"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    matches!(status, Ok(s) if s.success())
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> ReelResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when both `ffmpeg` and `ffprobe` can be invoked from `PATH`.
pub fn ffmpeg_tools_available() -> bool {
    tool_on_path("ffmpeg") && tool_on_path("ffprobe")
}

fn tool_on_path(tool: &str) -> bool {
    Command::new(tool)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
