use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use doc_model::EditorPreferences;
use pdf_engine::{default_engine, LopdfEncoder, OpenSource, PdfDecoder, RenderRequest};
use serde::Serialize;
use session_core::SessionController;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use storage::Storage;
use tracing_subscriber::EnvFilter;

mod script;

pub use script::{Action, Script};

#[derive(Debug, Parser)]
#[command(name = "pagemark-cli")]
#[command(about = "Annotate and flatten PDFs from the command line")]
pub struct Cli {
    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    /// Directory holding editor preferences instead of the platform default.
    #[arg(long, global = true, value_name = "DIR")]
    prefs_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Replay an edit script and write the flattened PDF.
    Apply {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "SCRIPT")]
        script: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Render scale the script's viewport coordinates refer to.
        #[arg(long)]
        scale: Option<f32>,
    },
    /// Render one page to PNG.
    RenderPage {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 1.0)]
        scale: f32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show or change editor preferences.
    Prefs {
        #[command(subcommand)]
        command: PrefsCommand,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Subcommand)]
enum PrefsCommand {
    /// Print the current preferences as JSON.
    Show,
    /// Update one preference.
    Set { key: String, value: String },
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    pages: Vec<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_tracing(cli.verbose);
    let storage = cli.prefs_dir.clone().map(Storage::with_root);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Apply { file, script, output, scale } => {
            run_apply(&file, &script, &output, scale, storage)
        }
        Commands::RenderPage { file, page, scale, output } => {
            run_render_page(&file, page, scale, output.as_deref())
        }
        Commands::Prefs { command } => run_prefs(command, storage),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A second call in the same process (tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn open_storage(storage: Option<Storage>) -> Result<Storage> {
    match storage {
        Some(storage) => Ok(storage),
        None => Storage::from_default_project().context("failed to locate preferences directory"),
    }
}

fn load_preferences(storage: Option<Storage>) -> Result<EditorPreferences> {
    let storage = open_storage(storage)?;
    storage
        .load_preferences()
        .with_context(|| format!("failed to load preferences from {}", storage.root().display()))
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let page_count = engine.page_count(handle)?;
    let mut pages = Vec::with_capacity(page_count as usize);
    for page_index in 0..page_count {
        let size = engine.page_size(handle, page_index)?;
        pages.push(PageSizeOutput { width: size.width_pt, height: size.height_pt });
    }

    let payload = InfoOutput { path: file.display().to_string(), page_count, pages };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    engine.close(handle)?;

    Ok(())
}

fn run_apply(
    file: &Path,
    script_path: &Path,
    output: &Path,
    scale: Option<f32>,
    storage: Option<Storage>,
) -> Result<()> {
    ensure_pdf_exists(file)?;
    let script = Script::from_path(script_path)?;

    let mut prefs = load_preferences(storage)?;
    if let Some(scale) = scale {
        prefs.initial_scale = scale;
    }
    let mut controller = SessionController::new(&prefs);
    let mut engine = default_engine();

    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    controller.load_document(&mut engine, bytes).context("failed to load PDF")?;

    let base_dir = script_path.parent().unwrap_or_else(|| Path::new("."));
    script::replay(&script, &mut controller, &engine, base_dir)?;

    let flattened = controller.export(&LopdfEncoder).context("failed to export PDF")?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, flattened)
        .with_context(|| format!("failed to write PDF to {}", output.display()))?;

    println!("{}", output.display());

    Ok(())
}

fn run_render_page(file: &Path, page: u32, scale: f32, output: Option<&Path>) -> Result<()> {
    ensure_pdf_exists(file)?;

    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }
    if !(scale.is_finite() && scale > 0.0) {
        anyhow::bail!("--scale must be a positive number");
    }

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let request = RenderRequest { page_index: page - 1, scale };
    let image = engine.render_page(handle, request).context("failed to render page")?;

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_page_output(file, page));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    engine.close(handle)?;

    Ok(())
}

fn run_prefs(command: PrefsCommand, storage: Option<Storage>) -> Result<()> {
    let storage = open_storage(storage)?;
    let mut prefs = storage.load_preferences().context("failed to load preferences")?;

    match command {
        PrefsCommand::Show => {}
        PrefsCommand::Set { key, value } => {
            prefs.set(&key, &value).with_context(|| format!("cannot set {key}"))?;
            storage.save_preferences(&prefs).context("failed to save preferences")?;
        }
    }

    println!("{}", serde_json::to_string_pretty(&prefs)?);
    Ok(())
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_page_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}
