//! CLI tool for normalizing presentation typography, extracting document
//! images and packaging scripts into executables.

mod extract;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use extract::ImageExtractionJob;
use ppt_core::{
    collect_inputs, run_batch, BatchJob, BatchReport, DocumentFormat, InputSelection, MarkupMode,
    OfficeConverter, OutputLocation, Settings,
};
use ppt_packager::{BuildDescriptor, FreezeRequest, FreezeRun};
use ppt_pptx::{MarkupNormalizer, NormalizeJob, TreeNormalizer};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Normalize presentations, extract document images and package scripts.
#[derive(Parser, Debug)]
#[command(name = "ppt-tools")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print the batch report as JSON instead of status lines
    #[arg(long, global = true)]
    json: bool,

    /// Open the output folder when done
    #[arg(long, global = true)]
    open: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rescale fonts and unify spacing by editing the document tree
    Normalize {
        /// Presentation file or folder of presentations
        input: PathBuf,

        /// Output folder (default: subfolder next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Font size multiplier
        #[arg(long)]
        font_scale: Option<f64>,

        /// Line spacing multiple
        #[arg(long)]
        line_spacing: Option<f64>,

        /// Character spacing in hundredths of a point
        #[arg(long, allow_negative_numbers = true)]
        char_spacing: Option<i32>,

        /// Rewrite character, line and paragraph spacing
        #[arg(long)]
        apply_spacing: bool,
    },

    /// Rewrite line breaks and spacing directly in the slide markup
    Markup {
        /// Presentation file or folder of presentations
        input: PathBuf,

        /// hard-break-unify, hard-break or space
        #[arg(short, long)]
        mode: Option<MarkupMode>,

        /// Output folder (default: subfolder next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract embedded images from documents
    ExtractImages {
        /// Document or folder of documents (scanned recursively)
        input: PathBuf,

        /// Output root (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Document types to pick up, comma separated
        #[arg(long, value_delimiter = ',')]
        types: Option<Vec<DocumentFormat>>,

        /// Office suite used to convert legacy documents
        #[arg(long)]
        converter: Option<PathBuf>,
    },

    /// Bundle a script into a standalone executable
    Package {
        /// Main script
        script: PathBuf,

        /// Folder receiving the executable
        #[arg(short, long)]
        output: PathBuf,

        /// Folder bundled alongside the script
        #[arg(long)]
        data: Option<PathBuf>,

        /// Executable icon
        #[arg(long)]
        icon: Option<PathBuf>,

        /// Build without a console window
        #[arg(long)]
        hide_console: bool,

        /// Freezer command line, e.g. "python -m PyInstaller"
        #[arg(long)]
        freezer: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let mut settings = Settings::load_or_default(args.config.as_deref())
        .context("Failed to load settings")?;

    match args.command {
        Commands::Normalize {
            ref input,
            ref output,
            font_scale,
            line_spacing,
            char_spacing,
            apply_spacing,
        } => {
            let typography = &mut settings.typography;
            if let Some(scale) = font_scale {
                typography.font_scale = scale;
            }
            if let Some(spacing) = line_spacing {
                typography.line_spacing = spacing;
            }
            if let Some(spacing) = char_spacing {
                typography.character_spacing = spacing;
            }
            typography.apply_spacing |= apply_spacing;

            let normalizer = TreeNormalizer::new(settings.typography)?;
            let location = output_location(output, &settings.normalize_folder);
            let selection = InputSelection::new([DocumentFormat::Pptx]);
            run_command(&args, input, &selection, &location, &NormalizeJob::new(normalizer))
        }
        Commands::Markup {
            ref input,
            mode,
            ref output,
        } => {
            let normalizer = MarkupNormalizer::new(mode.unwrap_or(settings.markup_mode));
            let location = output_location(output, &settings.markup_folder);
            let selection = InputSelection::new([DocumentFormat::Pptx]);
            run_command(&args, input, &selection, &location, &NormalizeJob::new(normalizer))
        }
        Commands::ExtractImages {
            ref input,
            ref output,
            ref types,
            ref converter,
        } => {
            let formats = types.clone().unwrap_or(settings.image_formats.clone());
            let converter = converter.clone().unwrap_or(settings.converter.clone());
            let root = match output.clone().or(settings.image_output_root.clone()) {
                Some(root) => root,
                None => std::env::current_dir().context("Failed to read current directory")?,
            };

            let selection = InputSelection::new(formats).with_recursive(true);
            let job = ImageExtractionJob::new(OfficeConverter::new(converter));
            run_command(&args, input, &selection, &OutputLocation::Root(root), &job)
        }
        Commands::Package {
            ref script,
            ref output,
            ref data,
            ref icon,
            hide_console,
            ref freezer,
        } => {
            let descriptor = BuildDescriptor::discover(script, data.as_deref())
                .with_context(|| format!("Failed to prepare {}", script.display()))?
                .with_icon(icon.clone())
                .with_hide_console(hide_console);
            let freezer = freezer
                .clone()
                .unwrap_or_else(|| settings.freezer.to_string_lossy().into_owned());

            let request = FreezeRequest::from_command_line(&freezer, descriptor, output)?;
            for line in FreezeRun::start(&request)? {
                let line = line.with_context(|| format!("Failed to package {}", script.display()))?;
                println!("{}", line);
            }
            println!("ok: {} -> {}", script.display(), output.display());

            if args.open {
                open_folder(output);
            }
            Ok(())
        }
    }
}

fn output_location(output: &Option<PathBuf>, folder: &str) -> OutputLocation {
    match output {
        Some(root) => OutputLocation::Root(root.clone()),
        None => OutputLocation::Subfolder(folder.to_string()),
    }
}

/// Run a batch over `input`, printing each status line as it is recorded.
fn run_command<J: BatchJob>(
    args: &Args,
    input: &Path,
    selection: &InputSelection,
    location: &OutputLocation,
    job: &J,
) -> Result<()> {
    let inputs = collect_inputs(input, selection)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    if inputs.is_empty() {
        bail!("No matching documents in {}", input.display());
    }

    let output_root = location.resolve(input);
    let report = run_batch(&inputs, &output_root, job, |entry| {
        if !args.json {
            println!("{}", entry.status_line());
        }
    })
    .with_context(|| format!("Failed to write to {}", output_root.display()))?;

    finish(args, report)
}

fn finish(args: &Args, report: BatchReport) -> Result<()> {
    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", json);
    } else if args.verbose {
        eprintln!(
            "{} succeeded, {} failed, {} item(s) written",
            report.succeeded().count(),
            report.failed().count(),
            report.total_count()
        );
    }

    if args.open {
        open_folder(&report.output_root);
    }

    report.into_result()?;
    Ok(())
}

/// Show a folder in the platform file manager.
fn open_folder(path: &Path) {
    let program = if cfg!(target_os = "windows") {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };

    if let Err(e) = Command::new(program).arg(path).spawn() {
        log::warn!("Failed to open {}: {}", path.display(), e);
    }
}
