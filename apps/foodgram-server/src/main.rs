use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use modkit::runtime::{run, DbOptions, RunOptions, ShutdownOptions};
use modkit_db::{ConnectOpts, DbHandle};
use runtime::{AppConfig, AppConfigProvider, CliArgs};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

// Adapter to make AppConfigProvider implement modkit::ConfigProvider
struct ModkitConfigAdapter(Arc<AppConfigProvider>);

impl modkit::ConfigProvider for ModkitConfigAdapter {
    fn get_module_config(&self, module_name: &str) -> Option<&Value> {
        self.0.get_module_config(module_name)
    }
}

/// Expand a sqlite DSN into an absolute-path DSN using a base directory.
/// - Keeps "sqlite::memory:" as-is.
/// - Normalizes backslashes into forward slashes (important on Windows).
fn absolutize_sqlite_dsn(dsn: &str, base_dir: &Path) -> Result<String> {
    if dsn.eq_ignore_ascii_case("sqlite::memory:") || dsn.eq_ignore_ascii_case("sqlite://:memory:")
    {
        return Ok("sqlite::memory:".to_string());
    }
    let db_path = dsn
        .strip_prefix("sqlite://")
        .ok_or_else(|| anyhow!("DSN must start with sqlite:// (got: {})", dsn))?;

    let (path_str, query) = match db_path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (db_path, None),
    };
    if path_str.is_empty() {
        bail!("Empty SQLite path in DSN");
    }
    let p = runtime::paths::resolve_under(base_dir, path_str);

    let mut out = String::from("sqlite://");
    out.push_str(&p.to_string_lossy().replace('\\', "/"));
    if let Some(q) = query {
        out.push('?');
        out.push_str(q);
    }
    Ok(out)
}

/// Foodgram server: recipe sharing REST API
#[derive(Parser)]
#[command(name = "foodgram-server")]
#[command(about = "Foodgram server - recipe sharing REST API")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use an in-memory SQLite database
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Check configuration
    Check,
    /// Load ingredients.csv and tags.csv into the database
    ImportData {
        /// Directory with the CSV files (defaults to modules.foodgram.data_dir)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: cli.port,
        print_config: cli.print_config,
        verbose: cli.verbose,
        mock: cli.mock,
    };

    // Load configuration (normalized home_dir is applied inside)
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);
    prepare_module_configs(&mut config, &args)?;

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    let logging_config = config.logging.clone().unwrap_or_default();
    runtime::logging::init_logging_from_config(&logging_config, &config.home_dir());
    tracing::info!(home_dir = %config.server.home_dir, "Foodgram server starting");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => check_config(config),
        Commands::ImportData { dir } => import_data(config, dir).await,
    }
}

fn module_section<'a>(config: &'a mut AppConfig, name: &str) -> Result<&'a mut serde_json::Map<String, Value>> {
    config
        .modules
        .entry(name.to_string())
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(|| anyhow!("modules.{name} must be a mapping"))
}

/// Fill module sections from the server section and resolve their paths under `home_dir`.
fn prepare_module_configs(config: &mut AppConfig, args: &CliArgs) -> Result<()> {
    let home = config.home_dir();
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let timeout_sec = config.server.timeout_sec;

    let ingress = module_section(config, api_ingress::MODULE_NAME)?;
    if args.port.is_some() || !ingress.contains_key("bind_addr") {
        ingress.insert("bind_addr".into(), json!(bind_addr));
    }
    if timeout_sec > 0 && !ingress.contains_key("request_timeout_sec") {
        ingress.insert("request_timeout_sec".into(), json!(timeout_sec));
    }

    let defaults = foodgram::FoodgramConfig::default();
    let section = module_section(config, foodgram::MODULE_NAME)?;
    for (key, default) in [
        ("media_root", defaults.media_root.as_str()),
        ("data_dir", defaults.data_dir.as_str()),
    ] {
        let rel = section
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string();
        let abs = runtime::paths::resolve_under(&home, &rel);
        section.insert(key.into(), json!(abs.to_string_lossy()));
    }
    Ok(())
}

async fn connect_db(config: &AppConfig) -> Result<Arc<DbHandle>> {
    let db_config = config
        .database
        .as_ref()
        .ok_or_else(|| anyhow!("Database URL not configured"))?;
    let mut dsn = db_config.url.trim().to_owned();
    if dsn.is_empty() {
        bail!("Database URL not configured");
    }
    if dsn.starts_with("sqlite://") {
        dsn = absolutize_sqlite_dsn(&dsn, &config.home_dir())?;
    }

    let connect_opts = ConnectOpts {
        max_conns: db_config.max_conns,
        acquire_timeout: Some(Duration::from_secs(5)),
        sqlite_busy_timeout: db_config
            .busy_timeout_ms
            .map(|ms| Duration::from_millis(u64::from(ms))),
        create_sqlite_dirs: true,
        ..Default::default()
    };

    tracing::info!(
        dsn = %modkit_db::redact_credentials_in_dsn(&dsn),
        "Connecting to database"
    );
    let db = DbHandle::connect(&dsn, connect_opts)
        .await
        .context("database connection failed")?;
    tracing::info!(backend = ?db.engine(), "Connected to database");
    Ok(Arc::new(db))
}

async fn run_server(config: AppConfig) -> Result<()> {
    tracing::info!("Initializing modules...");

    let config_provider = Arc::new(ModkitConfigAdapter(Arc::new(AppConfigProvider::new(
        config.clone(),
    ))));

    let mut builder = modkit::RegistryBuilder::default();
    api_ingress::register(&mut builder);
    foodgram::register(&mut builder);
    let registry = builder.build_topo_sorted()?;

    let db = connect_db(&config).await?;

    run(RunOptions {
        modules_cfg: config_provider,
        db: DbOptions::Handle(db),
        registry,
        shutdown: ShutdownOptions::Signals,
    })
    .await
}

fn check_config(config: AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");

    if let Some(db) = &config.database {
        DbHandle::detect(&db.url).context("invalid database url")?;
    }
    let foodgram_cfg: foodgram::FoodgramConfig = config
        .modules
        .get(foodgram::MODULE_NAME)
        .map(|v| serde_json::from_value(v.clone()))
        .transpose()
        .context("invalid modules.foodgram section")?
        .unwrap_or_default();
    if foodgram_cfg.default_page_size == 0 || foodgram_cfg.default_page_size > foodgram_cfg.max_page_size {
        bail!("modules.foodgram.default_page_size must be between 1 and max_page_size");
    }

    tracing::info!("Configuration is valid");
    println!("Configuration check passed");
    println!("{}", config.to_yaml()?);
    Ok(())
}

async fn import_data(config: AppConfig, dir: Option<PathBuf>) -> Result<()> {
    let dir = match dir {
        Some(dir) => dir,
        None => config
            .modules
            .get(foodgram::MODULE_NAME)
            .and_then(|m| m.get("data_dir"))
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("no data directory configured"))?,
    };
    tracing::info!(dir = %dir.display(), "Importing seed data");

    let db = connect_db(&config).await?;
    let report = foodgram::import_data(&db, &dir).await?;
    println!("ingredients: {}", report.ingredients);
    println!("tags: {}", report.tags);
    Ok(())
}
