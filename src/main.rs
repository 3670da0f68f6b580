use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use order_ocr::config::Config;
use order_ocr::display::{print_batch_summary, print_final_result, show};
use order_ocr::export::save_result_to_file;
use order_ocr::ocr::{OcrBridge, OcrError, OrderOcr};
use order_ocr::pipeline::{check_environment, Pipeline, PipelineConfig, FINAL_RESULT_FILE};

#[derive(Parser, Debug)]
#[command(name = "order-ocr")]
#[command(version, about = "Order data extraction from scanned order images via OCR and an LLM step", long_about = None)]
struct Cli {
    /// Configuration file (default: ./order-ocr.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose diagnostics
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run OCR on one image and save <name>.json and <name>.txt
    Extract {
        /// Input image path
        input: PathBuf,

        /// Output JSON path (default: <output dir>/<input_name>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Full pipeline for one image: OCR, field extraction, result display
    Run {
        /// Input image path
        input: PathBuf,

        /// Output directory (default: configured output dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the external extraction step and keep keyword matches
        #[arg(long)]
        no_llm: bool,
    },

    /// Full pipeline for every image in a folder
    Batch {
        /// Folder containing png/jpg/jpeg/bmp/tiff images
        input: PathBuf,

        /// Output directory for all results (default: <output dir>/batch)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the external extraction step and keep keyword matches
        #[arg(long)]
        no_llm: bool,
    },

    /// Display a saved final result or batch summary
    Show {
        /// final_result.json, batch_summary.json or a batch output folder
        path: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Extract { input, output } => extract_single(input, output, settings),
        Commands::Run {
            input,
            output,
            no_llm,
        } => run_single(input, output, no_llm, settings),
        Commands::Batch {
            input,
            output,
            no_llm,
        } => run_batch(input, output, no_llm, settings),
        Commands::Show { path } => {
            let path = path.unwrap_or_else(|| settings.output.dir.join(FINAL_RESULT_FILE));
            show(&path)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "order_ocr=debug"
    } else {
        "order_ocr=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn extract_single(input: PathBuf, output: Option<PathBuf>, settings: Config) -> Result<()> {
    let output = output.unwrap_or_else(|| {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ocr_result".to_string());
        settings.output.dir.join(format!("{stem}.json"))
    });

    println!("[*] Processing: {}", input.display());

    let ocr = OrderOcr::new(OcrBridge::from_settings(&settings.ocr));
    let result = match ocr.extract_text_from_image(&input) {
        Ok(result) => result,
        Err(OcrError::FileNotFound(path)) => {
            anyhow::bail!("Input file does not exist: {}", path.display())
        }
        Err(err) => return Err(err).context("OCR extraction failed"),
    };

    match &result.error {
        Some(message) => println!("[!] {message}"),
        None => println!("[+] Recognized {} line(s)", result.total_lines),
    }
    if !result.formatted_text.is_empty() {
        println!("{}", "-".repeat(50));
        println!("{}", result.formatted_text);
        println!("{}", "-".repeat(50));
    }

    save_result_to_file(&result, &output)
        .with_context(|| format!("Failed to save result to: {}", output.display()))?;

    println!("[✓] Saved: {}", output.display());
    println!("[✓] Saved: {}", output.with_extension("txt").display());
    Ok(())
}

fn pipeline_config(
    input: PathBuf,
    output: PathBuf,
    no_llm: bool,
    settings: Config,
) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::new(input, output, settings);
    if no_llm {
        config = config.without_llm();
    }
    check_environment(&config).context("Environment check failed")?;
    Ok(config)
}

fn run_single(input: PathBuf, output: Option<PathBuf>, no_llm: bool, settings: Config) -> Result<()> {
    if !input.is_file() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }
    let output = output.unwrap_or_else(|| settings.output.dir.clone());
    let config = pipeline_config(input, output, no_llm, settings)?;

    println!("[*] Processing: {}", config.input.display());
    println!("[*] Output: {}", config.output.display());

    let pipeline = Pipeline::from_config(&config);
    let result = pipeline
        .process_image(&config.input, &config.output)
        .with_context(|| format!("Failed to process image: {}", config.input.display()))?;

    println!();
    print_final_result(&result);
    println!("\n[✓] Done! Results saved to: {}", config.output.display());
    Ok(())
}

fn run_batch(input: PathBuf, output: Option<PathBuf>, no_llm: bool, settings: Config) -> Result<()> {
    let output = output.unwrap_or_else(|| settings.output.dir.join("batch"));
    let config = pipeline_config(input, output, no_llm, settings)?;

    println!("[*] Batch processing: {}", config.input.display());
    println!("[*] Base output: {}\n", config.output.display());

    let pipeline = Pipeline::from_config(&config);
    let summary = pipeline.run_batch(&config.input, &config.output)?;

    println!();
    print_batch_summary(&summary);

    if summary.failed_images > 0 {
        anyhow::bail!("{} image(s) failed to process", summary.failed_images);
    }
    Ok(())
}
