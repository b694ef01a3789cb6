//! Command-line interface for scenebridge.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scenebridge_core::native::api::NativeApi;
use scenebridge_core::{Importer, LogStream, NativeLibrary, PostProcess};

/// Convert and inspect 3D scene files through the native import library.
#[derive(Parser, Debug)]
#[command(name = "scenebridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Explicit path to the native library; defaults to the platform name
    /// next to the executable.
    #[arg(long, global = true)]
    library: Option<PathBuf>,

    /// Verbose output: native log messages and debug tracing.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Show version and build information of the native library.
    Info,
    /// Convert a scene file to another format.
    Convert {
        /// Input scene file.
        input: PathBuf,
        /// Output file.
        output: PathBuf,
        /// Export format id; defaults to a format matching the output
        /// extension.
        #[arg(short, long)]
        format: Option<String>,
        /// Triangulate and clean up the scene while importing.
        #[arg(long)]
        realtime_preset: bool,
    },
    /// List export formats supported by the native library.
    Formats {
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// List importable file extensions.
    Extensions,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Some(path) = &args.library {
        NativeLibrary::instance()
            .load(path)
            .with_context(|| format!("loading native library from {}", path.display()))?;
    }

    // In verbose mode the native log traffic of this thread goes to the
    // console for the whole run.
    let console = args.verbose.then(|| {
        let stream = LogStream::console_with("native");
        stream.attach();
        stream
    });

    let result = run(&args);

    if let Some(stream) = console {
        stream.detach();
    }
    result
}

fn run(args: &Args) -> Result<()> {
    match &args.command {
        Command::Info => info(),
        Command::Convert {
            input,
            output,
            format,
            realtime_preset,
        } => convert(input, output, format.as_deref(), *realtime_preset),
        Command::Formats { json } => formats(*json),
        Command::Extensions => extensions(),
    }
}

fn info() -> Result<()> {
    let api = NativeApi::instance();
    let version = api.version()?;
    println!("version:  {version}");
    println!("branch:   {}", api.branch_name()?);
    println!("flags:    {:?}", api.compile_flags()?);
    println!(
        "threads:  {}",
        if api.is_multithreading_supported()? {
            "multithreading supported"
        } else {
            "single-threaded build"
        }
    );
    println!("library:  {}", loaded_path());
    Ok(())
}

fn convert(
    input: &Path,
    output: &Path,
    format: Option<&str>,
    realtime_preset: bool,
) -> Result<()> {
    let mut importer = Importer::new();
    if realtime_preset {
        importer.set_post_process(PostProcess::target_realtime_quality());
    } else {
        importer.set_post_process(PostProcess::TRIANGULATE | PostProcess::VALIDATE_DATA_STRUCTURE);
    }

    let format_id = resolve_format(&importer, output, format)?;
    tracing::debug!(format = %format_id, "converting scene");

    importer
        .convert_file_to_file(input, &format_id, output)
        .with_context(|| format!("converting {}", input.display()))?;
    println!("{} -> {} ({format_id})", input.display(), output.display());
    Ok(())
}

fn formats(json: bool) -> Result<()> {
    let formats = Importer::new().export_formats()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&formats)?);
        return Ok(());
    }
    for format in formats {
        println!(
            "{:<12} .{:<6} {}",
            format.id, format.file_extension, format.description
        );
    }
    Ok(())
}

fn extensions() -> Result<()> {
    let extensions = Importer::new().supported_extensions()?;
    println!("{}", extensions.join(", "));
    Ok(())
}

fn resolve_format(importer: &Importer, output: &Path, format: Option<&str>) -> Result<String> {
    if let Some(id) = format {
        return Ok(id.to_string());
    }
    let extension = output
        .extension()
        .and_then(|e| e.to_str())
        .context("output path has no extension; pass --format")?;
    let formats = importer.export_formats()?;
    formats
        .iter()
        .find(|candidate| candidate.file_extension.eq_ignore_ascii_case(extension))
        .map(|candidate| candidate.id.clone())
        .with_context(|| {
            format!("no export format writes `.{extension}`; see `scenebridge formats`")
        })
}

fn loaded_path() -> String {
    NativeLibrary::instance()
        .library_path()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<not loaded>".to_string())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}
