//! pdf-audio - Convert PDF documents to speech audio

mod audio;
mod config;
mod extract;
mod job;
mod text;
mod tts;

use anyhow::{Context, Result};
use audio::MAX_SILENCE_SECS;
use clap::{Parser, Subcommand};
use config::PdfAudioConfig;
use extract::{ExtractionChain, LocalPdfExtractor, MineruExtractor, MineruOptions, PdfSource};
use indicatif::{ProgressBar, ProgressStyle};
use job::{JobConfig, JobStatus};
use speech_client::{AudioFormat, SpeechProvider, VOICES, find_voice};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "pdf-audio")]
#[command(about = "Convert PDF documents to speech audio using a text-to-speech service", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the PDF file
    pdf_file: Option<PathBuf>,

    /// Output file path (default: <pdf-name>.wav)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Voice to use (see `pdf-audio voices`)
    #[arg(long)]
    voice: Option<String>,

    /// Audio format requested from the service (mp3, wav, flac)
    #[arg(long)]
    format: Option<String>,

    /// Speech model override
    #[arg(long)]
    model: Option<String>,

    /// Maximum characters per chunk
    #[arg(long)]
    max_chunk_length: Option<usize>,

    /// Concurrent synthesis requests
    #[arg(long)]
    workers: Option<usize>,

    /// Give up on unfinished chunks after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Pause between chunks in seconds
    #[arg(long)]
    silence: Option<f64>,

    /// Extra attempts per chunk on transient errors
    #[arg(long)]
    retries: Option<u32>,

    /// MinerU server URL, tried before local extraction
    #[arg(long, conflicts_with = "no_mineru")]
    mineru_url: Option<String>,

    /// Skip MinerU even if configured
    #[arg(long, default_value_t = false)]
    no_mineru: bool,

    /// Also write the extracted text to this file
    #[arg(long)]
    text_out: Option<PathBuf>,

    /// Skip the credential check before processing
    #[arg(long, default_value_t = false)]
    skip_verify: bool,

    /// Enable debug output
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available voices
    Voices,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set default voice
    SetVoice {
        /// Voice identifier
        voice: String,
    },
    /// Set default number of concurrent requests
    SetWorkers {
        /// Value (at least 1)
        value: usize,
    },
    /// Set the MinerU server URL ("none" to clear)
    SetMineruUrl {
        /// URL, e.g. http://localhost:8000
        url: String,
    },
    /// Set default maximum chunk length
    SetMaxChunkLength {
        /// Characters per chunk
        value: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    // Handle subcommands
    match &args.command {
        Some(Commands::Voices) => {
            print_voices();
            return Ok(());
        }
        Some(Commands::Config { action }) => {
            return handle_config_command(action);
        }
        None => {}
    }

    let pdf_path = args
        .pdf_file
        .clone()
        .ok_or_else(|| anyhow::anyhow!("PDF file path is required. Run 'pdf-audio --help' for usage."))?;

    if !pdf_path.exists() {
        anyhow::bail!("PDF file not found: {}", pdf_path.display());
    }

    let file_config = PdfAudioConfig::load().context("Failed to load configuration")?;
    let job_config = build_job_config(&args, &file_config)?;

    let output_path = args.output.clone().unwrap_or_else(|| {
        let stem = pdf_path.file_stem().unwrap_or_default();
        pdf_path.with_file_name(format!("{}.wav", stem.to_string_lossy()))
    });

    if find_voice(&job_config.voice).is_none() {
        log::warn!("Voice '{}' is not in the known voice list", job_config.voice);
    }

    let provider = speech_client::Config::load()
        .map_err(|e| JobStatus::ConfigurationFailed(format!("Failed to load speech config: {}", e)))
        .and_then(|speech_config| {
            create_provider(&file_config, &speech_config, job_config.model.as_deref())
        });
    let provider = match provider {
        Ok(provider) => provider,
        Err(status) => anyhow::bail!("{}", status),
    };

    if args.debug {
        eprintln!("PDF: {}", pdf_path.display());
        eprintln!("Output: {}", output_path.display());
        eprintln!("Provider: {}", provider.name());
        eprintln!("Voice: {}", job_config.voice);
        eprintln!("Format: {}", job_config.format);
        eprintln!("Max chunk length: {}", job_config.max_chunk_length);
        eprintln!("Workers: {}", job_config.workers);
    }

    if !args.skip_verify {
        eprintln!("Verifying {} credentials...", provider.name());
        provider
            .check_credentials(&job_config.voice)
            .await
            .context("Credential check failed")?;
    }

    let chain = build_extraction_chain(&args, &file_config)?;
    eprintln!("Extracting text from: {}", pdf_path.display());
    let pdf = PdfSource::read(&pdf_path)?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let outcome = job::run_job(
        &pdf,
        &job_config,
        provider,
        &chain,
        &output_path,
        |progress| {
            pb.set_length(progress.total as u64);
            pb.set_position(progress.completed as u64);
            if progress.failed > 0 {
                pb.set_message(format!("{} failed", progress.failed));
            }
        },
    )
    .await;
    pb.finish_and_clear();

    if let Some(text_out) = &args.text_out {
        if !outcome.extracted_text.is_empty() {
            std::fs::write(text_out, &outcome.extracted_text)
                .with_context(|| format!("Failed to write text to {}", text_out.display()))?;
            eprintln!("Text: {}", text_out.display());
        }
    }

    if !outcome.status.is_success() {
        anyhow::bail!("{}", outcome.status);
    }

    eprintln!("{}", outcome.status);
    if let Some(path) = &outcome.audio_path {
        let metadata = std::fs::metadata(path)?;
        let size_mb = metadata.len() as f64 / (1024.0 * 1024.0);
        eprintln!("Output: {} ({:.1} MB)", path.display(), size_mb);
    }
    Ok(())
}

/// Merge CLI flags over file defaults.
fn build_job_config(args: &Args, file: &PdfAudioConfig) -> Result<JobConfig> {
    let mut config = JobConfig::from(file);

    if let Some(voice) = &args.voice {
        config.voice = voice.clone();
    }
    if let Some(format) = &args.format {
        config.format = AudioFormat::from_str(format)?;
    }
    if let Some(model) = &args.model {
        config.model = Some(model.clone());
    }
    if let Some(max) = args.max_chunk_length {
        config.max_chunk_length = max;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(secs) = args.timeout {
        config.timeout = Some(Duration::from_secs(secs));
    }
    if let Some(silence) = args.silence {
        config.silence_secs = silence;
    }
    if let Some(retries) = args.retries {
        config.max_retries = retries;
    }

    if config.max_chunk_length == 0 {
        anyhow::bail!("--max-chunk-length must be at least 1");
    }
    if config.workers == 0 {
        anyhow::bail!("--workers must be at least 1");
    }
    if !(0.0..=MAX_SILENCE_SECS).contains(&config.silence_secs) {
        anyhow::bail!("--silence must be between 0 and {} seconds", MAX_SILENCE_SECS);
    }

    Ok(config)
}

/// Build the provider named in pdf-audio.toml with credentials from speech.toml.
fn create_provider(
    config: &PdfAudioConfig,
    speech_config: &speech_client::Config,
    model: Option<&str>,
) -> std::result::Result<Arc<dyn SpeechProvider>, JobStatus> {
    speech_client::get_provider(
        &config.provider,
        speech_config.get_provider_config(&config.provider),
        model,
    )
    .map(Arc::<dyn SpeechProvider>::from)
    .map_err(|e| JobStatus::ConfigurationFailed(e.to_string()))
}

fn build_extraction_chain(args: &Args, config: &PdfAudioConfig) -> Result<ExtractionChain> {
    let mut chain = ExtractionChain::new();

    let mineru_url = if args.no_mineru {
        None
    } else {
        args.mineru_url.as_ref().or(config.mineru_url.as_ref())
    };

    if let Some(url) = mineru_url {
        let options = MineruOptions {
            backend: config.mineru_backend.clone(),
            lang: config.mineru_lang.clone(),
            ..Default::default()
        };
        chain = chain.with(Box::new(MineruExtractor::new(url, options)?));
    }

    chain = chain.with(Box::new(LocalPdfExtractor::new()));
    log::debug!("Extraction order: {}", chain.names().join(" -> "));
    Ok(chain)
}

fn print_voices() {
    for voice in VOICES {
        println!("{:<8} {:<8} {}", voice.id, voice.label, voice.description);
    }
}

fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = PdfAudioConfig::load()?;
            println!("Configuration file: {:?}", PdfAudioConfig::config_path()?);
            println!("Provider credentials: {:?}", speech_client::Config::config_path()?);
            println!();
            println!("provider = \"{}\"", config.provider);
            println!("voice = \"{}\"", config.voice);
            println!("format = \"{}\"", config.format);
            match &config.model {
                Some(model) => println!("model = \"{}\"", model),
                None => println!("model = (provider default)"),
            }
            println!("max_chunk_length = {}", config.max_chunk_length);
            println!("silence_secs = {}", config.silence_secs);
            println!("workers = {}", config.workers);
            println!("max_retries = {}", config.max_retries);
            match config.job_timeout_secs {
                Some(secs) => println!("job_timeout_secs = {}", secs),
                None => println!("job_timeout_secs = (none)"),
            }
            match &config.mineru_url {
                Some(url) => println!("mineru_url = \"{}\"", url),
                None => println!("mineru_url = (none, local extraction only)"),
            }
        }
        ConfigAction::SetVoice { voice } => {
            let mut config = PdfAudioConfig::load()?;
            if find_voice(voice).is_none() {
                eprintln!("Warning: '{}' is not a known voice", voice);
            }
            config.voice = voice.clone();
            config.save()?;
            println!("Default voice set to: {}", voice);
        }
        ConfigAction::SetWorkers { value } => {
            let mut config = PdfAudioConfig::load()?;
            config.workers = (*value).max(1);
            config.save()?;
            println!("Default workers set to: {}", config.workers);
        }
        ConfigAction::SetMineruUrl { url } => {
            let mut config = PdfAudioConfig::load()?;
            config.mineru_url = match url.as_str() {
                "none" | "" => None,
                other => Some(other.to_string()),
            };
            config.save()?;
            match &config.mineru_url {
                Some(url) => println!("MinerU URL set to: {}", url),
                None => println!("MinerU URL cleared"),
            }
        }
        ConfigAction::SetMaxChunkLength { value } => {
            let mut config = PdfAudioConfig::load()?;
            config.max_chunk_length = (*value).max(1);
            config.save()?;
            println!("Default max chunk length set to: {}", config.max_chunk_length);
        }
    }
    Ok(())
}
