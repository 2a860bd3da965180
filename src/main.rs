use std::path::PathBuf;

use clap::{ArgAction, Args, CommandFactory, ErrorKind, Parser, Subcommand};

use cutfinder::cuts::{self, DetectionReport, Detector, Signals, Tunables};
use cutfinder::video::HistogramComparator;

#[derive(Args, Debug)]
struct DetectionArgs {
    #[clap(
        required = true,
        value_parser = clap::value_parser!(PathBuf),
        help = "JSON file with the scene change, black frame and audio signals of the video."
    )]
    signals: PathBuf,

    #[clap(
        long,
        default_value_t = cuts::DEFAULT_MIN_CONFIDENCE,
        value_parser = clap::value_parser!(u32),
        help = "Minimum confidence score (0-105) for a candidate to be considered. Scene changes contribute up to 40 points, black frames up to 35 and audio changes up to 30."
    )]
    min_confidence: u32,

    #[clap(
        long,
        default_value_t = cuts::DEFAULT_MIN_GAP,
        value_parser = clap::value_parser!(f64),
        help = "Minimum time between two cuts, in seconds. Stronger candidates claim their neighbourhood first."
    )]
    min_gap: f64,

    #[clap(
        long,
        value_parser = clap::value_parser!(PathBuf),
        help = "JSON file overriding any of the calibration constants. Constants missing from the file keep their default values."
    )]
    tunables: Option<PathBuf>,

    #[clap(
        long,
        default_value = "false",
        action(ArgAction::SetTrue),
        help = "Print the report as JSON instead of text."
    )]
    json: bool,
}

impl DetectionArgs {
    fn detector(&self) -> cutfinder::Result<Detector> {
        let tunables = match &self.tunables {
            Some(path) => Tunables::from_path(path)?,
            None => Tunables::default(),
        };
        Ok(Detector::new()
            .with_min_confidence(self.min_confidence)
            .with_min_gap(self.min_gap)
            .with_tunables(tunables))
    }

    fn display(&self, report: &DetectionReport) -> cutfinder::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(report)?);
        } else {
            print!("{}", report);
        }
        Ok(())
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[clap(after_help = "Displays info about cutfinder and its dependencies.")]
    Info,

    #[clap(
        arg_required_else_help = true,
        after_help = "Score and select cut candidates from a signals file without looking at the video. Useful for tuning the confidence and gap parameters."
    )]
    Candidates {
        #[clap(flatten)]
        args: DetectionArgs,
    },

    #[clap(
        arg_required_else_help = true,
        after_help = "Find recording boundaries in a video. Candidates are built from the signals file and then verified against the video frames. The result is written to disk alongside the video and reused by later runs with the same video, signals and parameters."
    )]
    Detect {
        #[clap(
            required = true,
            value_parser = clap::value_parser!(PathBuf),
            help = "Video file the signals were extracted from."
        )]
        video: PathBuf,

        #[clap(flatten)]
        args: DetectionArgs,

        #[clap(
            long,
            default_value = "false",
            action(ArgAction::SetTrue),
            help = "Verify candidates in parallel, one worker per CPU."
        )]
        threading: bool,

        #[clap(
            long,
            default_value = "false",
            action(ArgAction::SetTrue),
            help = "Enable multi-threaded decoding in FFmpeg."
        )]
        threaded_decoding: bool,

        #[clap(
            long,
            value_parser = clap::value_parser!(PathBuf),
            help = "Directory to write every compared frame to, as PNG."
        )]
        dump_frames: Option<PathBuf>,

        #[clap(
            long,
            default_value = "false",
            action(ArgAction::SetTrue),
            help = "Ignore any existing result file and run detection again."
        )]
        force: bool,
    },
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(
        long,
        global = true,
        default_value = "false",
        action(ArgAction::SetTrue),
        help = "By default, video files are validated using FFmpeg, which is extremely accurate. Setting this flag will switch to just checking file headers."
    )]
    file_headers_only: bool,

    #[clap(
        short,
        long,
        global = true,
        default_value = "false",
        action(ArgAction::SetTrue),
        help = "Log every verification decision."
    )]
    verbose: bool,
}

impl Cli {
    fn validate(&self) {
        let mut cmd = Cli::command();
        let args = match &self.command {
            Commands::Info => return,
            Commands::Candidates { args } => args,
            Commands::Detect {
                video,
                args,
                dump_frames,
                ..
            } => {
                if !cutfinder::util::is_valid_video_file(video, !self.file_headers_only) {
                    cmd.error(
                        ErrorKind::InvalidValue,
                        format!("not a valid video file: {}", video.display()),
                    )
                    .exit();
                }
                if let Some(dir) = dump_frames {
                    if dir.is_file() {
                        cmd.error(
                            ErrorKind::InvalidValue,
                            "dump_frames must be a directory",
                        )
                        .exit();
                    }
                }
                args
            }
        };

        if !args.min_gap.is_finite() {
            cmd.error(ErrorKind::InvalidValue, "min_gap must be a finite number")
                .exit();
        }
        if !args.signals.is_file() {
            cmd.error(
                ErrorKind::InvalidValue,
                format!("signals file not found: {}", args.signals.display()),
            )
            .exit();
        }
    }
}

fn main() -> cutfinder::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    ffmpeg_next::init()?;

    cli.validate();

    match cli.command {
        Commands::Info => {
            println!("FFmpeg version: {}", cutfinder::util::ffmpeg_version_string());
        }
        Commands::Candidates { ref args } => {
            let signals = Signals::from_path(&args.signals)?;
            let detection = args.detector()?.candidates(&signals);
            args.display(&detection.report())?;
        }
        Commands::Detect {
            ref video,
            ref args,
            threading,
            threaded_decoding,
            ref dump_frames,
            force,
        } => {
            let detector = args.detector()?.with_threading(threading);
            let md5 = cutfinder::util::compute_header_md5sum(video)?;
            let signals_md5 = cutfinder::util::compute_file_md5sum(&args.signals)?;
            let result_path = DetectionReport::path_for(video);

            if !force && result_path.exists() {
                match DetectionReport::from_path(&result_path) {
                    Ok(report)
                        if report.matches(
                            &md5,
                            &signals_md5,
                            detector.min_confidence(),
                            detector.min_gap(),
                            detector.tunables(),
                        ) =>
                    {
                        tracing::info!(path = %result_path.display(), "reusing existing result");
                        return args.display(&report);
                    }
                    Ok(_) => tracing::debug!("existing result is stale"),
                    Err(e) => tracing::warn!(error = %e, "ignoring unreadable result file"),
                }
            }

            if let Some(dir) = dump_frames {
                std::fs::create_dir_all(dir)?;
            }

            let signals = Signals::from_path(&args.signals)?;
            let comparator = HistogramComparator::new(video)?
                .with_threaded_decoding(threaded_decoding)
                .with_frame_dump_dir(dump_frames.clone());

            let mut report = detector.run(&signals, &comparator).report();
            report.video = Some(video.clone());
            report.md5 = Some(md5);
            report.signals_md5 = Some(signals_md5);
            report.write_to(&result_path)?;
            tracing::info!(path = %result_path.display(), "wrote result");

            args.display(&report)?;
        }
    }

    Ok(())
}
