use blog_banner::imaging::{OutputFormat, RustBackend, SourceInput, identify};
use blog_banner::request::{ProcessOptions, TextOverlayOptions, WatermarkOptions, data_url};
use blog_banner::{config, output, process};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "blog-banner")]
#[command(about = "Turn photographs into sized, cropped blog header images")]
#[command(long_about = "\
Turn photographs into sized, cropped blog header images

Each image goes through the same pipeline:

  decode → cover-fit (resize + crop) → text/watermark overlay → encode

Options can be given as flags or as a JSON object (--options), the same shape
an HTTP caller would send:

  {\"width\": 1200, \"height\": 630, \"format\": \"webp\", \"quality\": 80,
   \"crop\": \"smart\",
   \"textOverlay\": {\"title\": \"Hello\", \"position\": \"bottom\"},
   \"watermark\": {\"text\": \"example.com\", \"position\": \"bottom-right\"}}

Flags override the JSON object. Anything left unset falls back to
blog-banner.toml in the working directory (or --config), then to the stock
defaults: 1200x630 jpeg at quality 90, smart crop.

Run 'blog-banner gen-config' to generate a documented blog-banner.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./blog-banner.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log pipeline stages to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Per-image flags that override the JSON options.
#[derive(clap::Args, Clone, Default)]
struct TransformArgs {
    /// JSON options object
    #[arg(long)]
    options: Option<String>,
    /// Canvas width in pixels
    #[arg(long)]
    width: Option<f64>,
    /// Canvas height in pixels
    #[arg(long)]
    height: Option<f64>,
    /// Output format: jpeg, png or webp
    #[arg(long)]
    format: Option<String>,
    /// Encoder quality, 1-100
    #[arg(long)]
    quality: Option<f64>,
    /// Crop policy: smart, center, top, bottom, left or right
    #[arg(long)]
    crop: Option<String>,
    /// Title text
    #[arg(long)]
    title: Option<String>,
    /// Subtitle text
    #[arg(long)]
    subtitle: Option<String>,
    /// Text block position: top, center or bottom
    #[arg(long)]
    text_position: Option<String>,
    /// Band behind the text block ("transparent" for none)
    #[arg(long)]
    background_color: Option<String>,
    /// Watermark text
    #[arg(long)]
    watermark: Option<String>,
    /// Watermark corner: top-left, top-right, bottom-left or bottom-right
    #[arg(long)]
    watermark_position: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Transform one image
    Process {
        /// Source image (JPEG, PNG, TIFF or WebP)
        input: PathBuf,
        #[command(flatten)]
        args: TransformArgs,
        /// Output file (default: banners/<input stem>.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the result as JSON instead of writing a file
        #[arg(long, conflicts_with = "data_url")]
        json: bool,
        /// Print the result as a data: URL instead of writing a file
        #[arg(long)]
        data_url: bool,
    },
    /// Transform every job of a JSON manifest in parallel
    Batch {
        /// JSON array of {"input": ..., "options": {...}}
        manifest: PathBuf,
        /// Directory for jobs without an outputPath
        #[arg(long, default_value = "banners")]
        out_dir: PathBuf,
    },
    /// Print format, size and color metadata of an image
    Identify {
        input: PathBuf,
    },
    /// Print a stock blog-banner.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Process {
            input,
            args,
            output,
            json,
            data_url: as_data_url,
        } => {
            let config = config::discover_config(cli.config.as_deref(), &std::env::current_dir()?)?;
            let backend = RustBackend::from_fonts(config.fonts.system, &config.fonts.dirs);
            let mut options = merge_options(&args)?;

            if output.is_some() {
                options.output_path = output;
            } else if options.output_path.is_none() && !json && !as_data_url {
                let format = requested_format(&options, &config);
                let out_dir = Path::new("banners");
                std::fs::create_dir_all(out_dir)?;
                options.output_path = Some(process::default_output_path(out_dir, &input, format));
            }

            let source = SourceInput::Path(input.clone());
            let result = process::process(&backend, source, &options, &config);

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if let (true, Some(format), Some(buffer)) =
                (as_data_url, result.format(), result.buffer())
            {
                println!("{}", data_url(format, buffer));
            } else {
                output::print_process_result(&input.display().to_string(), &result);
            }

            if !result.is_success() {
                std::process::exit(1);
            }
        }
        Command::Batch { manifest, out_dir } => {
            let config = config::discover_config(cli.config.as_deref(), &std::env::current_dir()?)?;
            init_thread_pool(&config.processing);
            let backend = RustBackend::from_fonts(config.fonts.system, &config.fonts.dirs);

            // Relative inputs are resolved against the manifest's directory
            let base = manifest.parent().unwrap_or(Path::new("")).to_path_buf();
            let mut jobs = process::load_batch(&manifest)?;
            for job in &mut jobs {
                job.input = base.join(&job.input);
            }

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_batch_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let outcomes = process::process_batch(&backend, &jobs, &out_dir, &config, Some(tx))?;
            printer.join().unwrap();
            output::print_batch_summary(&outcomes);

            if outcomes.iter().any(|o| !o.result.is_success()) {
                std::process::exit(1);
            }
        }
        Command::Identify { input } => {
            let backend = RustBackend::from_fonts(false, &[]);
            let metadata = identify(&backend, &SourceInput::Path(input.clone()))?;
            output::print_identify(&input, &metadata);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; config can only lower it.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// JSON options with flag overrides applied on top.
fn merge_options(args: &TransformArgs) -> Result<ProcessOptions, Box<dyn std::error::Error>> {
    let mut options = match &args.options {
        Some(json) => ProcessOptions::from_json(json)?,
        None => ProcessOptions::default(),
    };

    options.width = args.width.or(options.width);
    options.height = args.height.or(options.height);
    options.quality = args.quality.or(options.quality);
    options.format = args.format.clone().or(options.format);
    options.crop = args.crop.clone().or(options.crop);

    if args.title.is_some()
        || args.subtitle.is_some()
        || args.text_position.is_some()
        || args.background_color.is_some()
    {
        let text = options.text_overlay.get_or_insert_with(TextOverlayOptions::default);
        text.title = args.title.clone().or(text.title.take());
        text.subtitle = args.subtitle.clone().or(text.subtitle.take());
        text.position = args.text_position.clone().or(text.position.take());
        text.background_color = args.background_color.clone().or(text.background_color.take());
    }

    if args.watermark.is_some() || args.watermark_position.is_some() {
        let mark = options.watermark.get_or_insert_with(WatermarkOptions::default);
        mark.text = args.watermark.clone().or(mark.text.take());
        mark.position = args.watermark_position.clone().or(mark.position.take());
    }

    Ok(options)
}

/// Format the request will encode to, used only to name the default output.
/// An invalid token falls back to the config; the transform reports it.
fn requested_format(options: &ProcessOptions, config: &config::EngineConfig) -> OutputFormat {
    options
        .format
        .as_deref()
        .and_then(|token| token.parse().ok())
        .unwrap_or(config.output.format)
}
