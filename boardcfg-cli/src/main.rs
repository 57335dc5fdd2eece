//! boardcfg CLI - generate and validate per-unit device configurations.

mod prompt;

use anyhow::Context;
use boardcfg::assemble::{EnvSensor, ManualSensors, PresenceSensor};
use boardcfg::core::EntryKind;
use boardcfg::output::companion_command;
use boardcfg::schema::BatchDate;
use boardcfg::{
    run_session, save_config, BoardCfgCore, BoardCfgError, Catalog, CatalogReport, FsCatalog,
    PinReport, PinoutTable, SensorPreset, SessionPresets,
};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::prompt::DialoguerPrompter;

#[derive(Parser)]
#[command(name = "boardcfg")]
#[command(about = "Validated device configuration generator for GPIO control boards", long_about = None)]
#[command(version)]
struct Cli {
    /// Catalog directory (boards/, sensor_boards.json, sku_mapping.json)
    #[arg(long, global = true, env = "BOARDCFG_CATALOG", default_value = "catalog")]
    catalog: PathBuf,

    /// Directory generated configurations are written to
    #[arg(long, global = true, env = "BOARDCFG_OUTPUT", default_value = "configs")]
    output: PathBuf,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a configuration for one unit (default)
    Generate(GenerateArgs),

    /// Validate every board, sensor board and SKU mapping in the catalog
    Validate {
        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Show the GPIO usage report for one board
    Pins {
        /// Board type, alias or file name
        #[arg(value_name = "BOARD")]
        board: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Convert the legacy SKU mapping into per-board products
    Migrate {
        /// JSON object of board id to pinout, instead of the catalog's legacy boards
        #[arg(long, value_name = "FILE")]
        pinouts: Option<PathBuf>,

        /// Write the result here instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Re-validate a saved configuration file
    Check {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
}

#[derive(Args, Default)]
struct GenerateArgs {
    /// Product SKU
    #[arg(long)]
    sku: Option<String>,

    /// Board type or alias
    #[arg(long)]
    board: Option<String>,

    /// Batch date, MYYYY or MMYYYY
    #[arg(long)]
    batch_date: Option<String>,

    /// Attach this sensor board
    #[arg(long, conflicts_with_all = ["env_sensor", "presence", "mlx90614"])]
    sensor_board: Option<String>,

    /// Environmental sensor: bme688, sht41 or none
    #[arg(long)]
    env_sensor: Option<EnvSensor>,

    /// LD2410 presence radar: uart, binary or none
    #[arg(long)]
    presence: Option<PresenceSensor>,

    /// MLX90614 infrared sensor fitted
    #[arg(long)]
    mlx90614: bool,

    /// Accept defaults for unanswered questions and save without asking
    #[arg(short, long)]
    yes: bool,
}

impl GenerateArgs {
    fn presets(&self) -> SessionPresets {
        let manual = self.env_sensor.is_some() || self.presence.is_some() || self.mlx90614;
        let sensors = if let Some(sku) = &self.sensor_board {
            Some(SensorPreset::SensorBoard(sku.clone()))
        } else if manual {
            Some(SensorPreset::Manual(ManualSensors {
                env: self.env_sensor.unwrap_or_default(),
                mlx90614: self.mlx90614,
                presence: self.presence.unwrap_or_default(),
            }))
        } else if self.yes {
            Some(SensorPreset::BoardDefaults)
        } else {
            None
        };

        let batch_date = match (&self.batch_date, self.yes) {
            (Some(raw), _) => Some(raw.clone()),
            (None, true) => Some(BatchDate::current().to_string()),
            (None, false) => None,
        };

        SessionPresets {
            sku: self.sku.clone(),
            board: self.board.clone(),
            batch_date,
            sensors,
            save: self.yes,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for scripts
    Json,
}

/// Compact stderr logging. `RUST_LOG` wins when no `-v` is given.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = if verbose == 0 {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .compact()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            let cancelled = e
                .downcast_ref::<BoardCfgError>()
                .is_some_and(BoardCfgError::is_cancelled);
            if cancelled {
                eprintln!("Cancelled, nothing written.");
                0
            } else {
                eprintln!("Error: {:#}", e);
                1
            }
        }
    };

    process::exit(exit_code);
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let source = FsCatalog::new(&cli.catalog);
    match cli.command.unwrap_or(Commands::Generate(GenerateArgs::default())) {
        Commands::Generate(args) => handle_generate(&source, &cli.output, &args),
        Commands::Validate { format } => handle_validate(&source, format),
        Commands::Pins { board, format } => handle_pins(&source, &board, format),
        Commands::Migrate { pinouts, out } => handle_migrate(&source, pinouts.as_deref(), out.as_deref()),
        Commands::Check { file, format } => handle_check(&file, format),
    }
}

fn handle_generate(source: &FsCatalog, output: &Path, args: &GenerateArgs) -> anyhow::Result<i32> {
    let catalog = Catalog::load(source)
        .with_context(|| format!("loading catalog from {}", source.root().display()))?;
    let mut prompter = DialoguerPrompter::new();
    let generated = run_session(&catalog, &mut prompter, &args.presets())?;

    if !generated.save {
        println!("Not saved.");
        return Ok(0);
    }

    let saved = save_config(output, &generated.config)
        .with_context(|| format!("writing configuration to {}", output.display()))?;
    println!("Configuration: {}", saved.json_path.display());
    println!("Command:       {}", saved.command_path.display());
    println!();
    println!("{}", companion_command(&generated.config)?);
    Ok(0)
}

fn entry_label(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Board => "board",
        EntryKind::SensorBoards => "sensor boards",
        EntryKind::SkuMapping => "sku mapping",
    }
}

fn output_report_human(root: &Path, report: &CatalogReport) {
    println!("\nCatalog: {}", root.display());
    println!("{}", "─".repeat(60));

    for entry in &report.entries {
        let status = if entry.is_valid() { "ok" } else { "FAILED" };
        match &entry.pins {
            Some(pins) if entry.is_valid() => println!(
                "  {:<7}{} {} ({} pins)",
                status,
                entry_label(entry.kind),
                entry.id,
                pins.all_pins.len()
            ),
            _ => println!("  {:<7}{} {}", status, entry_label(entry.kind), entry.id),
        }
        for error in &entry.errors {
            println!("    - {}", error);
        }
    }

    println!("\n  Summary:");
    println!("    Boards:        {}", report.stats.boards);
    println!("    Sensor boards: {}", report.stats.sensor_boards);
    println!("    Legacy SKUs:   {}", report.stats.legacy_products);
    println!("    Failures:      {}", report.stats.failures);
}

fn handle_validate(source: &FsCatalog, format: OutputFormat) -> anyhow::Result<i32> {
    let report = BoardCfgCore::validate_catalog(source)?;
    match format {
        OutputFormat::Human => output_report_human(source.root(), &report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(if report.is_valid() { 0 } else { 1 })
}

fn output_pins_human(board: &str, report: &PinReport) {
    println!("\nBoard: {}", board);
    println!("{}", "─".repeat(60));
    let pins: Vec<String> = report.all_pins.iter().map(|p| p.to_string()).collect();
    println!("  GPIO in use: {}", pins.join(", "));
    if report.is_valid {
        println!("  No conflicts");
        return;
    }
    println!("\n  CONFLICTS:");
    for conflict in &report.conflicts {
        println!("    - {}", conflict);
    }
}

fn handle_pins(source: &FsCatalog, board: &str, format: OutputFormat) -> anyhow::Result<i32> {
    let (record, report) = BoardCfgCore::pin_report(source, board)?;
    match format {
        OutputFormat::Human => output_pins_human(record.board_type(), &report),
        OutputFormat::Json => {
            let output = serde_json::json!({
                "board": record.board_type(),
                "report": report,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(if report.is_valid { 0 } else { 1 })
}

fn handle_migrate(source: &FsCatalog, pinouts: Option<&Path>, out: Option<&Path>) -> anyhow::Result<i32> {
    let table = match pinouts {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading pinout table {}", path.display()))?;
            Some(PinoutTable::from_value(&serde_json::from_str(&text)?)?)
        }
        None => None,
    };

    let output = BoardCfgCore::migrate_catalog(source, table)?;
    for (board, report) in output.pin_reports() {
        for conflict in &report.conflicts {
            tracing::warn!(board, "{}", conflict);
        }
    }

    let json = serde_json::to_string_pretty(&output)?;
    match out {
        Some(path) => {
            std::fs::write(path, format!("{}\n", json))
                .with_context(|| format!("writing {}", path.display()))?;
            println!(
                "Migrated {} products onto {} boards: {}",
                output.product_count(),
                output.boards.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(0)
}

fn handle_check(file: &Path, format: OutputFormat) -> anyhow::Result<i32> {
    let result = match BoardCfgCore::check_config(file) {
        Err(e @ (BoardCfgError::Io(_) | BoardCfgError::Json(_))) => {
            return Err(anyhow::Error::new(e).context(format!("reading {}", file.display())))
        }
        other => other,
    };
    let errors: Vec<String> = match &result {
        Ok(_) => Vec::new(),
        Err(BoardCfgError::Structural { issues, .. }) => issues.iter().map(|i| i.to_string()).collect(),
        Err(BoardCfgError::PinConflict { conflicts, .. }) => {
            conflicts.iter().map(|c| c.to_string()).collect()
        }
        Err(other) => vec![other.to_string()],
    };
    let valid = result.is_ok();

    match format {
        OutputFormat::Human => match &result {
            Ok(config) => println!(
                "ok: {} on {} {} (configVersion {})",
                config.sku, config.board_type, config.board_version, config.config_version
            ),
            Err(_) => {
                println!("{} is invalid:", file.display());
                for error in &errors {
                    println!("  - {}", error);
                }
            }
        },
        OutputFormat::Json => {
            let output = serde_json::json!({
                "file": file.display().to_string(),
                "valid": valid,
                "errors": errors,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(if valid { 0 } else { 1 })
}
