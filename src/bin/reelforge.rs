use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

use reelforge::backend::MediaIo as _;
use reelforge::job::liveness::{ProcessKeepAlive, ThreadYield};
use reelforge::job::progress::{ProgressCallback, ProgressSnapshot};
use reelforge::plan::RetimingPlan;
use reelforge::render::compositor::render_segment_frame;
use reelforge::{
    BackendChoice, CropPreset, EffectKind, FfmpegMedia, FrameRate, JobConfig, JobEnv, JobInputs,
    JobRequest, QualityPreset, Resolution, Session,
};

#[derive(Parser, Debug)]
#[command(name = "reelforge", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compose intro + main (+ background audio) into one vertical MP4.
    Compose(ComposeArgs),
    /// Render one composited frame as a PNG.
    Preview(PreviewArgs),
    /// Print what the prober sees in a media file, as JSON.
    Probe {
        /// Media file.
        path: PathBuf,
    },
}

#[derive(Parser, Debug)]
struct SourceArgs {
    /// Intro clip.
    #[arg(long)]
    intro: PathBuf,

    /// Main clip, retimed to fit the target duration.
    #[arg(long)]
    main: PathBuf,
}

/// Overrides applied on top of the JSON config (or the defaults).
#[derive(Parser, Debug)]
struct ConfigArgs {
    /// Job config JSON. Flags given on the command line win over its values.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    resolution: Option<Resolution>,

    #[arg(long, value_enum)]
    fps: Option<FrameRate>,

    #[arg(long, value_enum)]
    quality: Option<QualityPreset>,

    /// Target duration in seconds.
    #[arg(long)]
    duration: Option<f64>,

    /// Background gain in percent (0-100).
    #[arg(long)]
    bgm_gain: Option<u8>,

    #[arg(long, value_enum)]
    crop: Option<CropArg>,

    /// Transition between intro and main.
    #[arg(long, value_enum)]
    transition: Option<EffectKind>,

    /// Effect at the very end.
    #[arg(long, value_enum)]
    ending: Option<EffectKind>,

    /// Effect duration in seconds (0.5-2).
    #[arg(long)]
    effect_secs: Option<f64>,

    #[arg(long, value_enum)]
    backend: Option<BackendChoice>,

    /// Match intro and main loudness.
    #[arg(long)]
    normalize: bool,

    /// Do not hold a wake lock while encoding.
    #[arg(long)]
    no_keep_alive: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CropArg {
    None,
    TabS9,
    S25Ultra,
}

impl From<CropArg> for CropPreset {
    fn from(arg: CropArg) -> Self {
        match arg {
            CropArg::None => CropPreset::None,
            CropArg::TabS9 => CropPreset::TabS9,
            CropArg::S25Ultra => CropPreset::S25Ultra,
        }
    }
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    #[command(flatten)]
    sources: SourceArgs,

    /// Background audio, looped under the voice.
    #[arg(long)]
    bgm: Option<PathBuf>,

    /// Output directory.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Output file name (defaults to a timestamped name).
    #[arg(long)]
    name: Option<String>,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    #[command(flatten)]
    sources: SourceArgs,

    /// Output frame index (0-based).
    #[arg(long)]
    frame: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Compose(args) => cmd_compose(args),
        Command::Preview(args) => cmd_preview(args),
        Command::Probe { path } => cmd_probe(&path),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("REELFORGE_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &ConfigArgs) -> anyhow::Result<JobConfig> {
    let mut cfg = match args.config.as_deref() {
        Some(path) => JobConfig::from_json_file(path)?,
        None => JobConfig::default(),
    };
    if let Some(v) = args.resolution {
        cfg.resolution = v;
    }
    if let Some(v) = args.fps {
        cfg.fps = v;
    }
    if let Some(v) = args.quality {
        cfg.quality = v;
    }
    if let Some(v) = args.duration {
        cfg.target_duration_secs = v;
    }
    if let Some(v) = args.bgm_gain {
        cfg.background_gain_pct = v;
    }
    if let Some(v) = args.crop {
        cfg.crop = v.into();
    }
    if let Some(v) = args.transition {
        cfg.effects.transition = v;
    }
    if let Some(v) = args.ending {
        cfg.effects.ending = v;
    }
    if let Some(v) = args.effect_secs {
        cfg.effects.duration_secs = Some(v);
    }
    if let Some(v) = args.backend {
        cfg.backend = v;
    }
    if args.normalize {
        cfg.normalize_loudness = true;
    }
    if args.no_keep_alive {
        cfg.keep_alive = false;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn print_progress(s: &ProgressSnapshot) {
    match s.eta_secs {
        Some(eta) => eprintln!("[{:5.1}%] {} (eta {eta:.0} s)", s.percent, s.status),
        None => eprintln!("[{:5.1}%] {}", s.percent, s.status),
    }
}

fn cmd_compose(args: ComposeArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let request = JobRequest {
        inputs: JobInputs {
            intro: args.sources.intro,
            main: args.sources.main,
            background: args.bgm,
        },
        config,
        output_dir: args.out_dir,
        file_name: args.name,
    };

    let mut media = FfmpegMedia;
    let mut keep_alive = ProcessKeepAlive::new();
    let mut yielder = ThreadYield;
    let env = JobEnv {
        media: &mut media,
        transcoder: None,
        keep_alive: &mut keep_alive,
        yielder: &mut yielder,
        progress: Some(Box::new(print_progress) as ProgressCallback),
        staging_parent: None,
    };

    let session = Session::new();
    let outcome = session.generate(&request, env)?;
    if outcome.is_done() {
        if let Some(report) = &outcome.report {
            tracing::info!(
                backend = report.backend,
                speed = report.speed_factor,
                frames = report.frame_count,
                "composition finished"
            );
        }
        eprintln!("{}", outcome.status_line());
        Ok(())
    } else {
        anyhow::bail!("{}", outcome.status_line())
    }
}

fn cmd_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let cfg = load_config(&args.config)?;
    let mut media = FfmpegMedia;
    let intro = media.probe(&args.sources.intro)?;
    let main = media.probe(&args.sources.main)?;
    let target = cfg.target_spec();
    let plan = RetimingPlan::new(
        target.fps,
        intro.duration,
        main.duration,
        target.target_duration_secs,
    )?;
    if args.frame >= plan.output_frame_count {
        anyhow::bail!(
            "frame {} is past the last frame ({})",
            args.frame,
            plan.output_frame_count - 1
        );
    }

    let [intro_seg, main_seg] = plan.segments(cfg.intro_effects(), cfg.main_effects());
    let (segment, clip) = if args.frame < plan.intro_frames {
        (&intro_seg, &intro)
    } else {
        (&main_seg, &main)
    };
    let local = args.frame - segment.first_frame.0;
    let mut source = media.open_source(clip, target.fps, segment.speed)?;
    let frame = render_segment_frame(
        segment,
        target.fps,
        target.canvas,
        target.crop.cut(),
        source.as_mut(),
        local,
    )?;

    ensure_parent(&args.out)?;
    frame.save_png(&args.out)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_probe(path: &Path) -> anyhow::Result<()> {
    let clip = FfmpegMedia.probe(path)?;
    let json = serde_json::to_string_pretty(&clip).context("serialize probe result")?;
    println!("{json}");
    Ok(())
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}
