use crate::cli::{Cli, Commands};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use trackmux::config::Config;
use trackmux::engine::{
    self, EncodePreset, EncodeStats, LineSource, ProgressLine, ProgressSink, SelectionRequest,
    StreamInventory, StreamKind, TerminalStatus, TranscodeJob, TranscodeRunner, Tools,
};

/// Exit status used when the encode was interrupted
const EXIT_CANCELLED: i32 = 130;

pub fn run(cli: Cli) {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: {:#}", e);
            eprintln!("Using built-in defaults.");
            Config::default()
        }
    };

    let result = match cli.command {
        Commands::CheckFfmpeg => handle_check_ffmpeg(&config.tools),
        Commands::Probe { file, json } => handle_probe(&config, &file, json),
        Commands::Convert {
            file,
            audio,
            subtitle,
            preset,
            overwrite,
            dry_run,
        } => handle_convert(
            &config,
            ConvertArgs {
                file,
                audio,
                subtitle,
                preset,
                overwrite,
                dry_run,
                verbose: cli.verbose,
            },
        ),
        Commands::Presets => handle_presets(&config),
        Commands::InitConfig => handle_init_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn handle_check_ffmpeg(tools: &Tools) -> Result<()> {
    let version = tools.ffmpeg_version()?;
    println!("ffmpeg found: {}", version);
    if let Some(path) = engine::tools::locate(&tools.ffmpeg) {
        println!("  at {}", path.display());
    }

    let probe_version = tools.ffprobe_version()?;
    println!("ffprobe found: {}", probe_version);
    if let Some(path) = engine::tools::locate(&tools.ffprobe) {
        println!("  at {}", path.display());
    }
    Ok(())
}

fn handle_probe(config: &Config, file: &Path, json: bool) -> Result<()> {
    let inventory = engine::inspect(&config.tools, file)?;

    if json {
        let out = serde_json::to_string_pretty(&inventory).context("Failed to serialize inventory")?;
        println!("{}", out);
    } else {
        println!("{}", file.display());
        print_inventory(&inventory);
    }
    Ok(())
}

fn print_inventory(inventory: &StreamInventory) {
    let sections = [
        ("Video (first is always kept)", StreamKind::Video),
        ("Audio tracks", StreamKind::Audio),
        ("Subtitle tracks", StreamKind::Subtitle),
    ];

    for (title, kind) in sections {
        println!("{}:", title);
        let mut any = false;
        for stream in inventory.of_kind(kind) {
            println!("  {}", stream);
            any = true;
        }
        if !any {
            println!("  (none)");
        }
    }

    let others = inventory.of_kind(StreamKind::Other).count();
    if others > 0 {
        println!("Other streams: {} (ignored)", others);
    }
    for warning in inventory.warnings() {
        eprintln!("Warning: {}", warning);
    }
}

struct ConvertArgs {
    file: PathBuf,
    audio: u32,
    subtitle: u32,
    preset: Option<String>,
    overwrite: bool,
    dry_run: bool,
    verbose: bool,
}

fn handle_convert(config: &Config, args: ConvertArgs) -> Result<()> {
    let inventory = engine::inspect(&config.tools, &args.file)?;

    let preset = args
        .preset
        .unwrap_or_else(|| config.defaults.preset.to_string());
    let request = SelectionRequest::new(args.audio, args.subtitle, preset);
    let selection = match engine::validate(&inventory, &request) {
        Ok(selection) => selection,
        Err(e) => {
            eprintln!("{}", args.file.display());
            print_inventory(&inventory);
            return Err(e.into());
        }
    };

    let job = TranscodeJob::new(&args.file, selection, &config.output)?
        .with_overwrite(args.overwrite || config.defaults.overwrite);

    if args.dry_run {
        println!("{}", engine::format_command(&job.command(&config.tools)));
        return Ok(());
    }

    println!(
        "Converting {} -> {}",
        job.source.display(),
        job.destination.display()
    );

    let runner = TranscodeRunner::new(config.runner.options());
    let sink = ConsoleSink::new(args.verbose, inventory.duration());
    let handle = runner.start_job(&job, &config.tools, sink)?;

    // Ctrl-C stops ffmpeg through the runner instead of killing us first
    let cancel = handle.cancel_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        cancel.cancel();
    }) {
        tracing::warn!("Could not install Ctrl-C handler: {}", e);
    }

    let outcome = handle.wait()?;

    // The terminal delivers SIGINT to ffmpeg too, so it may exit on its own
    // before the runner's cancel reaches it
    if outcome.status == TerminalStatus::Cancelled || outcome.interrupted {
        eprintln!(
            "Cancelled. Partial output (if any) left at {}",
            job.destination.display()
        );
        process::exit(EXIT_CANCELLED);
    }

    outcome.into_result()?;
    println!("Wrote {}", job.destination.display());
    Ok(())
}

fn handle_presets(config: &Config) -> Result<()> {
    for preset in EncodePreset::ALL {
        if preset == config.defaults.preset {
            println!("{} (default)", preset);
        } else {
            println!("{}", preset);
        }
    }
    Ok(())
}

fn handle_init_config() -> Result<()> {
    let config_path = Config::config_path()?;

    if Config::exists() {
        println!("Config file exists at: {}", config_path.display());
    } else {
        Config::ensure_default()?;
        println!("Created default config at: {}", config_path.display());
    }
    Ok(())
}

/// Prints a single self-updating status line from ffmpeg's stats output.
/// Other encoder output is only shown with `--verbose`.
struct ConsoleSink {
    verbose: bool,
    duration_s: Option<f64>,
    status_visible: bool,
}

impl ConsoleSink {
    fn new(verbose: bool, duration_s: Option<f64>) -> Self {
        Self {
            verbose,
            duration_s,
            status_visible: false,
        }
    }

    fn end_status_line(&mut self) {
        if self.status_visible {
            println!();
            self.status_visible = false;
        }
    }
}

impl ProgressSink for ConsoleSink {
    fn progress_started(&mut self) {
        println!("Encoding...");
    }

    fn line(&mut self, line: &ProgressLine) {
        if line.source == LineSource::Summary {
            self.end_status_line();
            println!("{}", line.text);
            return;
        }

        if let Some(stats) = EncodeStats::parse(&line.text) {
            let mut status = match stats.progress_pct(self.duration_s) {
                Some(pct) => format!("\rProgress: {:.1}%", pct),
                None => format!("\rProgress: {:.1}s", stats.out_time_s),
            };
            if let Some(speed) = stats.speed {
                status.push_str(&format!(" | Speed: {:.2}x", speed));
            }
            print!("{}", status);
            std::io::stdout().flush().ok();
            self.status_visible = true;
        } else if self.verbose {
            self.end_status_line();
            eprintln!("{}", line.text);
        }
    }

    fn progress_stopped(&mut self) {
        self.end_status_line();
    }
}
