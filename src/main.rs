// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use bookwai::app_config::{Config, LogLevel, TranslationProvider};
use bookwai::app_controller::{Controller, RunOutcome};
use bookwai::file_utils::FileManager;
use bookwai::providers::known_models;

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliTranslationProvider {
    Ollama,
    #[value(name = "openai")]
    OpenAI,
    Anthropic,
    #[value(name = "lmstudio")]
    LMStudio,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
            CliTranslationProvider::LMStudio => TranslationProvider::LMStudio,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a book (default command)
    Translate {
        /// Input book: a JSON chapter list, .txt or .md file
        #[arg(value_name = "INPUT_PATH")]
        input_path: PathBuf,

        #[command(flatten)]
        options: TranslateOptions,
    },

    /// List known models per provider
    Models {
        /// Only list models of this provider
        #[arg(short, long, value_enum)]
        provider: Option<CliTranslationProvider>,
    },

    /// Generate shell completions for bookwai
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Flags shared by the default command and `translate`
#[derive(Args, Debug, Clone)]
struct TranslateOptions {
    /// Output Markdown file (default: <input stem>.<language>.md next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Target language code (e.g., 'fr', 'pt-BR')
    #[arg(short, long)]
    target_language: Option<String>,

    /// API key for hosted providers
    #[arg(long, env = "BOOKWAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Context about the book given to the model (genre, tone, names)
    #[arg(long, conflicts_with = "context_file")]
    context: Option<String>,

    /// Read the book context from a file
    #[arg(long)]
    context_file: Option<PathBuf>,

    /// Fragment size in characters; disables sizing from the model context window
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Characters shared by adjacent fragments
    #[arg(long)]
    overlap_size: Option<usize>,

    /// Number of parallel workers
    #[arg(short = 'w', long)]
    max_workers: Option<usize>,

    /// Requests per second across all workers (0 disables throttling)
    #[arg(long)]
    rate_limit: Option<f64>,

    /// Ignore an existing progress file and start over
    #[arg(long)]
    no_resume: bool,

    /// Input format instead of detecting it from the extension (json, txt, md)
    #[arg(long)]
    format: Option<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Also write the log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Only show warnings and errors in the terminal
    #[arg(long)]
    clean_terminal: bool,

    /// Also write one Markdown file per chapter
    #[arg(long)]
    save_chapters_separately: bool,

    /// Directory for chapter files, relative to the output file
    #[arg(long)]
    chapters_dir: Option<String>,

    /// Keep chapter files after the combined book is written
    #[arg(long, value_name = "BOOL")]
    keep_chapter_files: Option<bool>,

    /// Only check that the provider answers, then exit
    #[arg(long)]
    test_connection: bool,
}

/// bookwai - book translation with AI
///
/// Splits a book into chapters and fragments and translates them in
/// parallel through Ollama, OpenAI, Anthropic or LM Studio. Progress is
/// saved next to the output so an interrupted run picks up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "bookwai")]
#[command(version)]
#[command(about = "AI-powered book translation tool")]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = "bookwai translates books chapter by chapter using AI providers.

EXAMPLES:
    bookwai book.json -t fr                        # Translate to French with conf.json
    bookwai novel.md -p openai -m gpt-4o -t de     # Use a specific provider and model
    bookwai novel.md -w 8 --rate-limit 4           # More workers, higher request rate
    bookwai novel.md --no-resume                   # Discard saved progress
    bookwai novel.md --test-connection             # Check the provider only
    bookwai models -p anthropic                    # List known Anthropic models
    bookwai completions bash > bookwai.bash        # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't
    exist, a default one is created automatically. Command line flags
    override the file.

RESUMING:
    Progress is kept in <output>.progress.json. Running the same command
    again continues with the chapters that are not finished yet.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input book: a JSON chapter list, .txt or .md file
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    #[command(flatten)]
    options: TranslateOptions,
}

static LOGGER: Lazy<CustomLogger> = Lazy::new(|| CustomLogger::new(LevelFilter::Info));

// @struct: Custom logger implementation
struct CustomLogger {
    level: RwLock<LevelFilter>,
    // @field: Terminal shows warnings and errors only
    clean_terminal: AtomicBool,
    file: Mutex<Option<File>>,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger {
            level: RwLock::new(level),
            clean_terminal: AtomicBool::new(false),
            file: Mutex::new(None),
        }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_logger(&*LOGGER)?;
        LOGGER.set_level(level);
        Ok(())
    }

    fn set_level(&self, level: LevelFilter) {
        *self.level.write() = level;
        log::set_max_level(level);
    }

    fn set_clean_terminal(&self, clean: bool) {
        self.clean_terminal.store(clean, Ordering::Relaxed);
    }

    /// Append log lines to `path`, creating parent directories
    fn attach_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                FileManager::ensure_dir(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {:?}", path))?;
        *self.file.lock() = Some(file);
        Ok(())
    }

    // @returns: ANSI colour code for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "31",
            Level::Warn => "33",
            Level::Info => "32",
            Level::Debug => "36",
            Level::Trace => "35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= *self.level.read()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let show_on_terminal = !self.clean_terminal.load(Ordering::Relaxed) || record.level() <= Level::Warn;
        if show_on_terminal {
            let now = chrono::Local::now().format("%H:%M:%S%.3f");
            let _ = writeln!(
                std::io::stderr(),
                "\x1B[1;{}m{} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.args()
            );
        }

        if let Some(file) = self.file.lock().as_mut() {
            let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            let _ = writeln!(file, "{} {:<5} [{}] {}", now, record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
        if let Some(file) = self.file.lock().as_mut() {
            let _ = file.flush();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the config and flags say otherwise
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    let result = match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "bookwai", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Models { provider }) => {
            list_models(provider.map(Into::into));
            Ok(())
        }
        Some(Commands::Translate { input_path, options }) => run_translate(input_path, options).await,
        None => {
            let input_path = cli
                .input_path
                .ok_or_else(|| anyhow!("INPUT_PATH is required when no subcommand is specified"))?;
            run_translate(input_path, cli.options).await
        }
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    log::logger().flush();
    result
}

fn list_models(provider: Option<TranslationProvider>) {
    let mut stdout = std::io::stdout();
    for model in known_models()
        .iter()
        .filter(|m| provider.is_none_or(|p| p == m.provider))
    {
        let _ = writeln!(
            stdout,
            "{:<10} {:<30} {}",
            model.provider.to_lowercase_string(),
            model.id,
            model.description
        );
    }
}

async fn run_translate(input_path: PathBuf, options: TranslateOptions) -> Result<()> {
    // Apply the command line level before the config is read
    if let Some(level) = options.log_level {
        LOGGER.set_level(LogLevel::from(level).into());
    }

    let mut config = Config::load_or_create(&options.config_path)?;
    apply_overrides(&mut config, &options)?;
    LOGGER.set_level(config.log_level.into());
    LOGGER.set_clean_terminal(options.clean_terminal);
    setup_log_file(&config, options.log_file.as_deref())?;

    config.validate()?;

    let output_path = match &options.output {
        Some(path) => path.clone(),
        None => default_output_path(&input_path, &config.target_language),
    };

    let controller = Controller::with_config(config)?
        .with_resume(!options.no_resume)
        .with_input_format(options.format.clone());

    if options.test_connection {
        return controller.test_connection().await;
    }

    info!("Translating {:?} -> {:?}", input_path, output_path);
    let report = controller.run(&input_path, &output_path).await?;

    match report.outcome {
        RunOutcome::Completed => info!(
            "Done: {} chapters written to {:?}",
            report.chapters_written, report.output_path
        ),
        RunOutcome::Incomplete => warn!(
            "{} chapters failed, {} written to {:?}",
            report.stats.chapters_failed, report.chapters_written, report.output_path
        ),
        RunOutcome::Paused => info!("Progress saved, run the same command to resume"),
    }
    Ok(())
}

/// Fold command line flags into the loaded configuration
fn apply_overrides(config: &mut Config, options: &TranslateOptions) -> Result<()> {
    if let Some(provider) = options.provider {
        config.translation.provider = provider.into();
    }
    if let Some(model) = &options.model {
        config.translation.active_provider_config_mut().model = model.clone();
    }
    if let Some(api_key) = &options.api_key {
        config.translation.active_provider_config_mut().api_key = api_key.clone();
    }
    if let Some(target_language) = &options.target_language {
        config.target_language = target_language.clone();
    }
    if let Some(context) = &options.context {
        config.translation.common.context = Some(context.clone());
    }
    if let Some(path) = &options.context_file {
        let context = FileManager::read_to_string(path)?;
        config.translation.common.context = Some(context.trim().to_string());
    }
    if let Some(chunk_size) = options.chunk_size {
        config.chunking.chunk_size = chunk_size;
        config.chunking.plan_for_model = false;
    }
    if let Some(overlap_size) = options.overlap_size {
        config.chunking.overlap_size = overlap_size;
    }
    if let Some(max_workers) = options.max_workers {
        config.parallel.max_workers = max_workers;
    }
    if let Some(rate_limit) = options.rate_limit {
        config.parallel.rate_limit = rate_limit;
    }
    if options.save_chapters_separately {
        config.output.save_chapters_separately = true;
    }
    if let Some(dir) = &options.chapters_dir {
        config.output.chapters_dir = dir.clone();
    }
    if let Some(keep) = options.keep_chapter_files {
        config.output.keep_chapter_files = keep;
    }
    if let Some(level) = options.log_level {
        config.log_level = level.into();
    }
    Ok(())
}

/// Attach the log file from `--log-file` or `output.log_to_file`
fn setup_log_file(config: &Config, explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None if config.output.log_to_file => {
            let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
            FileManager::default_log_dir()?.join(format!("bookwai-{}.log", stamp))
        }
        None => return Ok(()),
    };

    LOGGER.attach_file(&path)?;
    info!("Logging to {:?}", path);
    Ok(())
}

/// `<dir>/<stem>.<language>.md` next to the input
fn default_output_path(input: &Path, target_language: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "book".to_string());
    input.with_file_name(format!("{}.{}.md", stem, target_language))
}
