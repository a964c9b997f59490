//! PLATiNA::ARCHiVE screenshot analyzer
//!
//! Reads PLATiNA::LAB result and song-select screenshots, recognizes the song
//! and the play record, verifies it against the game's scoring rules and
//! keeps the player's archive of best records up to date.

mod analysis;
mod api;
mod archive;
mod calibration;
mod capture;
mod catalog;
mod config;
mod ocr;
mod paths;
mod phash;
mod recognition;
mod runner;
mod scoring;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use analysis::ScreenshotAnalyzer;
use api::{ArchiveClient, ClientVersion};
use archive::{ArchiveReconciler, ArchiveStore, ArchiveSync};
use calibration::preview::render_preview;
use calibration::{CalibrationRegistry, Region, RegionExtractor, ScreenType};
use capture::ImageInput;
use catalog::SongCatalog;
use config::{AnalyzerConfig, Locale};
use phash::PHash;
use recognition::fields::{strategy_for, Preprocess};
use recognition::ScreenClassifier;
use runner::{AnalysisService, ServiceOutcome};

const LOG_FILE: &str = "platina_archive.log";

#[derive(Parser)]
#[command(name = "platina-archive")]
#[command(about = "Analyze PLATiNA::LAB screenshots and track best records")]
#[command(version)]
struct Cli {
    /// Configuration file (default: config.json next to the executable)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write the log to logs/platina_archive.log
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze screenshots (the clipboard image when no file is given).
    Analyze {
        images: Vec<PathBuf>,

        /// Offline catalog file ({"songs": [...], "patterns": [...]})
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Archive API key; without one results are only compared locally
        #[arg(long, env = "PLATINA_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Analyze the clipboard image each time Enter is pressed.
    ///
    /// Type "r" to reload the song catalog and "q" to quit.
    Watch {
        /// Offline catalog file, re-read on reload
        #[arg(long)]
        catalog: Option<PathBuf>,

        #[arg(long, env = "PLATINA_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Dump every calibrated region of a screenshot for checking the layout.
    Regions {
        image: PathBuf,

        /// Output directory
        #[arg(long)]
        out: PathBuf,

        /// Screen layout to use (default: detect)
        #[arg(long, value_enum)]
        screen: Option<ScreenArg>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScreenArg {
    Select,
    Result,
}

impl From<ScreenArg> for ScreenType {
    fn from(arg: ScreenArg) -> Self {
        match arg {
            ScreenArg::Select => ScreenType::Select,
            ScreenArg::Result => ScreenType::Result,
        }
    }
}

/// Writes log output to stderr and a file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

fn init_logging(to_file: bool) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{}] {:<5} {}",
            Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.args()
        )
    });

    if to_file {
        let path = paths::get_logs_dir().join(LOG_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
    }

    builder.init();
    Ok(())
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = panic_info
            .location()
            .map(|loc| format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();

        let log_msg = format!(
            "[{}] [PANIC]{} {}\n",
            Local::now().format("%H:%M:%S%.3f"),
            location,
            msg
        );
        eprint!("{}", log_msg);
        let log_path = paths::get_logs_dir().join(LOG_FILE);
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(log_path) {
            let _ = file.write_all(log_msg.as_bytes());
        }
    }));
}

fn main() -> Result<()> {
    install_panic_hook();
    let cli = Cli::parse();

    paths::ensure_directories()?;
    init_logging(cli.log_file)?;

    let config_path = cli.config.clone().unwrap_or_else(paths::get_config_path);
    let config = AnalyzerConfig::load(&config_path);

    match cli.command {
        Commands::Analyze {
            images,
            catalog,
            api_key,
        } => run_analyze(config, images, catalog, api_key),
        Commands::Watch { catalog, api_key } => run_watch(config, catalog, api_key),
        Commands::Regions { image, out, screen } => {
            run_regions(&config, &image, &out, screen.map(ScreenType::from))
        }
    }
}

fn check_client_version(client: &ArchiveClient) {
    let current = ClientVersion::current();
    match client.fetch_latest_client_version() {
        Ok(latest) if latest > current => log::warn!(
            "A newer client version is available, updating is recommended. ({} -> {})",
            current,
            latest
        ),
        Ok(_) => log::info!("Client is up to date ({})", current),
        Err(e) => log::warn!("Could not check for client updates: {:#}", e),
    }
}

/// Where song data comes from, kept so the catalog can be reloaded.
enum CatalogSource {
    File(PathBuf),
    Remote(Arc<ArchiveClient>),
}

impl CatalogSource {
    fn load(&self) -> Result<SongCatalog> {
        let catalog = match self {
            CatalogSource::File(path) => SongCatalog::load_file(path)?,
            CatalogSource::Remote(client) => client.fetch_catalog()?,
        };
        if catalog.is_empty() {
            log::warn!("Song data is empty");
        } else {
            log::info!("Song data loaded: {} songs", catalog.len());
        }
        Ok(catalog)
    }
}

/// A ready analysis service and what it needs between triggers.
struct Session {
    service: Arc<AnalysisService>,
    source: CatalogSource,
    locale: Locale,
}

fn start_session(
    config: AnalyzerConfig,
    catalog_file: Option<PathBuf>,
    api_key: Option<String>,
) -> Result<Session> {
    let ocr = ocr::tesseract_engine(&config.ocr).context("Tesseract is required for analysis")?;
    let client = Arc::new(ArchiveClient::new(&config.api, api_key)?);
    check_client_version(&client);

    let source = match catalog_file {
        Some(path) => CatalogSource::File(path),
        None => CatalogSource::Remote(client.clone()),
    };
    let catalog = source.load()?;

    let (store, sync) = match client.decoder_name() {
        Some(name) => {
            log::info!("Welcome, {}.", name);
            let store = client.fetch_archive().unwrap_or_else(|e| {
                log::warn!("Failed to load archive, comparing against an empty one: {:#}", e);
                ArchiveStore::new()
            });
            let sync: Arc<dyn ArchiveSync> = client.clone();
            (store, Some(sync))
        }
        None => {
            log::info!("No API key given, results will not be synced");
            (ArchiveStore::new(), None)
        }
    };

    let reconciler = ArchiveReconciler::new(store, sync, config.thresholds.max_rating_ratio);
    let locale = config.locale;
    let analyzer = ScreenshotAnalyzer::new(config, catalog, Arc::new(ocr))?;
    Ok(Session {
        service: Arc::new(AnalysisService::new(analyzer, reconciler)),
        source,
        locale,
    })
}

/// Waits for a spawned analysis and prints its report. True if a best
/// record improved.
fn print_outcome(handle: JoinHandle<ServiceOutcome>, locale: Locale) -> bool {
    match handle.join() {
        Ok(outcome) => {
            println!("{}\n", outcome.report(locale));
            matches!(
                &outcome,
                ServiceOutcome::Completed { reconciliation, .. } if reconciliation.is_improved()
            )
        }
        // The panic hook has already logged the cause
        Err(_) => {
            log::error!("Analysis thread panicked");
            false
        }
    }
}

fn run_analyze(
    config: AnalyzerConfig,
    images: Vec<PathBuf>,
    catalog_file: Option<PathBuf>,
    api_key: Option<String>,
) -> Result<()> {
    let session = start_session(config, catalog_file, api_key)?;

    let inputs: Vec<ImageInput> = if images.is_empty() {
        vec![ImageInput::Clipboard]
    } else {
        images.into_iter().map(ImageInput::File).collect()
    };

    let total = inputs.len();
    let mut improved = 0;
    for input in inputs {
        if print_outcome(session.service.spawn(input), session.locale) {
            improved += 1;
        }
    }
    if total > 1 {
        log::info!("{} of {} screenshots improved a record", improved, total);
    }
    Ok(())
}

fn run_watch(
    config: AnalyzerConfig,
    catalog_file: Option<PathBuf>,
    api_key: Option<String>,
) -> Result<()> {
    let session = start_session(config, catalog_file, api_key)?;
    println!("Press Enter to analyze the clipboard image, \"r\" to reload songs, \"q\" to quit.");

    let mut reports = Vec::new();
    for line in io::stdin().lines() {
        let line = line.context("Failed to read stdin")?;
        match line.trim() {
            "q" => break,
            "r" => match session.source.load() {
                Ok(catalog) => {
                    if let Err(e) = session.service.replace_catalog(catalog) {
                        log::error!("Failed to rebuild the analyzer: {:#}", e);
                    }
                }
                Err(e) => log::error!("Failed to reload songs, keeping the current ones: {:#}", e),
            },
            _ if session.service.is_busy() => {
                println!("{}", ServiceOutcome::Busy.report(session.locale));
            }
            _ => {
                let handle = session.service.spawn(ImageInput::Clipboard);
                let locale = session.locale;
                reports.retain(|r: &JoinHandle<bool>| !r.is_finished());
                reports.push(thread::spawn(move || print_outcome(handle, locale)));
            }
        }
    }

    for report in reports {
        let _ = report.join();
    }
    Ok(())
}

fn run_regions(
    config: &AnalyzerConfig,
    image_path: &Path,
    out_dir: &Path,
    screen: Option<ScreenType>,
) -> Result<()> {
    let img = image::open(image_path)
        .with_context(|| format!("Failed to open {}", image_path.display()))?
        .to_rgba8();
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let registry = CalibrationRegistry::new();
    let extractor = RegionExtractor::new(&registry);
    let screen = match screen {
        Some(screen) => screen,
        None => ScreenClassifier::new(&config.hashes, &config.thresholds)?
            .classify(&img, &extractor),
    };
    let prefix = screen.to_string().to_lowercase();
    println!(
        "{} ({}x{}) as {} screen",
        image_path.display(),
        img.width(),
        img.height(),
        screen
    );

    let preview_path = out_dir.join(format!("{}_preview.png", prefix));
    render_preview(&img, screen, &registry).save(&preview_path)?;

    for key in registry.keys(screen) {
        match registry.lookup(screen, key) {
            Some(Region::Rect(_)) => {
                let Some(crop) = extractor.crop(&img, screen, key) else {
                    println!("{:<18} (empty at this resolution)", key.name());
                    continue;
                };
                crop.save(out_dir.join(format!("{}_{}.png", prefix, key.name())))?;
                println!("{:<18} {}", key.name(), PHash::of_rgba(&crop));

                let preprocess = strategy_for(screen, key).map(|s| s.preprocess);
                if let Some(invert @ (Preprocess::Binarize | Preprocess::BinarizeInverted)) =
                    preprocess
                {
                    let invert = invert == Preprocess::BinarizeInverted;
                    ocr::prepare_for_ocr(&crop, &config.ocr, invert)
                        .save(out_dir.join(format!("{}_{}_prepared.png", prefix, key.name())))?;
                }
            }
            Some(Region::Point(_)) => {
                if let Some(sample) = extractor.sample(&img, screen, key) {
                    println!(
                        "{:<18} ({}, {}) rgb{:?}",
                        key.name(),
                        sample.x,
                        sample.y,
                        sample.rgb
                    );
                }
            }
            None => {}
        }
    }

    println!("Preview written to {}", preview_path.display());
    Ok(())
}
