use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::foundation::error::{ReelError, ReelResult};
use crate::job::CancelToken;

/// One input of a [`TranscodeCommand`].
#[derive(Clone, Debug, PartialEq)]
pub struct TranscodeInput {
    /// Arguments placed before `-i`.
    pub args: Vec<String>,
    /// File path or lavfi graph.
    pub source: String,
}

/// Typed description of one whole-file external transcoding invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct TranscodeCommand {
    stage: String,
    inputs: Vec<TranscodeInput>,
    output_args: Vec<String>,
    output: PathBuf,
}

impl TranscodeCommand {
    pub fn new(stage: impl Into<String>, output: impl AsRef<Path>) -> Self {
        Self {
            stage: stage.into(),
            inputs: Vec::new(),
            output_args: Vec::new(),
            output: output.as_ref().to_path_buf(),
        }
    }

    /// Add a file input.
    pub fn input(self, path: impl AsRef<Path>) -> Self {
        self.input_with(Vec::<String>::new(), path)
    }

    /// Add a file input with arguments placed before its `-i`.
    pub fn input_with<I, S>(mut self, args: I, path: impl AsRef<Path>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(TranscodeInput {
            args: args.into_iter().map(Into::into).collect(),
            source: path.as_ref().to_string_lossy().into_owned(),
        });
        self
    }

    /// Add a lavfi-generated input (e.g. `anullsrc=...`).
    pub fn lavfi(mut self, graph: impl Into<String>) -> Self {
        self.inputs.push(TranscodeInput {
            args: vec!["-f".to_string(), "lavfi".to_string()],
            source: graph.into(),
        });
        self
    }

    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn filter_complex(self, graph: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(graph)
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    pub fn audio_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-af").output_arg(filter)
    }

    /// Output duration limit.
    pub fn duration(self, secs: f64) -> Self {
        self.output_arg("-t").output_arg(format_secs(secs))
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn inputs(&self) -> &[TranscodeInput] {
        &self.inputs
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Whether `needle` appears as one output argument.
    pub fn has_output_arg(&self, needle: &str) -> bool {
        self.output_args.iter().any(|a| a == needle)
    }

    /// Value following `flag` in the output arguments.
    pub fn output_value(&self, flag: &str) -> Option<&str> {
        self.output_args
            .windows(2)
            .find(|w| w[0] == flag)
            .map(|w| w[1].as_str())
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec!["-y".to_string(), "-v".to_string(), "error".to_string()];
        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }
        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}

/// Seconds with microsecond precision, as ffmpeg time options expect.
pub fn format_secs(secs: f64) -> String {
    format!("{:.6}", secs.max(0.0))
}

/// Narrow "run one transcode" capability isolating the transcoding engine.
pub trait Transcoder {
    fn run(&mut self, cmd: &TranscodeCommand) -> ReelResult<()>;
}

/// A transcoder bound to one job's abort flag. Every invocation is preceded by a checkpoint.
pub struct StageRunner<'a> {
    transcoder: &'a mut dyn Transcoder,
    cancel: &'a CancelToken,
    completed: Vec<String>,
}

impl<'a> StageRunner<'a> {
    pub fn new(transcoder: &'a mut dyn Transcoder, cancel: &'a CancelToken) -> Self {
        Self {
            transcoder,
            cancel,
            completed: Vec::new(),
        }
    }

    pub fn run(&mut self, cmd: &TranscodeCommand) -> ReelResult<()> {
        self.cancel.check()?;
        tracing::info!(stage = cmd.stage(), "running stage");
        self.transcoder.run(cmd)?;
        self.completed.push(cmd.stage().to_string());
        Ok(())
    }

    /// Stage names run so far, in order.
    pub fn completed(&self) -> &[String] {
        &self.completed
    }

    pub fn cancel(&self) -> &CancelToken {
        self.cancel
    }
}

/// Runs commands through the system `ffmpeg`.
#[derive(Clone, Debug, Default)]
pub struct FfmpegTranscoder {
    cancel: Option<CancelToken>,
}

const POLL_INTERVAL: Duration = Duration::from_millis(25);

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the running child when `cancel` fires instead of waiting for it to exit.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

impl Transcoder for FfmpegTranscoder {
    #[tracing::instrument(skip_all, fields(stage = cmd.stage()))]
    fn run(&mut self, cmd: &TranscodeCommand) -> ReelResult<()> {
        let args = cmd.build_args();
        tracing::debug!(args = %args.join(" "), "ffmpeg");

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ReelError::capability(format!(
                    "cannot start ffmpeg for this stage: {e}"
                ))
            })?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReelError::process(cmd.stage(), "failed to open ffmpeg stderr"))?;
        let drain = std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf);
            buf
        });

        let status = loop {
            if let Some(cancel) = self.cancel.as_ref()
                && cancel.is_cancelled()
            {
                let _ = child.kill();
                let _ = child.wait();
                let _ = drain.join();
                let _ = std::fs::remove_file(cmd.output());
                return Err(ReelError::Cancelled);
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(ReelError::process(cmd.stage(), e.to_string())),
            }
        };
        let stderr = drain.join().unwrap_or_default();
        if !status.success() {
            let msg = String::from_utf8_lossy(&stderr);
            return Err(ReelError::process(
                cmd.stage(),
                format!("ffmpeg exited with status {status}: {}", msg.trim()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/unit/transcode.rs"]
mod tests;
