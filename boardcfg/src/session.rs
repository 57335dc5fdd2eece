//! Interactive generation flow
//!
//! product line → SKU → board → batch date → sensor method → sensor details
//! → save. Every question goes through a [`Prompter`], and any of them can
//! be answered up front with [`SessionPresets`] so runs can be scripted.
//! The session never writes files; the caller decides what to do with
//! [`Generated`].

use crate::assemble::{
    assemble_current, assemble_legacy, EnvSensor, ManualSensors, PresenceSensor,
    SensorSelection, UnitMeta,
};
use crate::catalog::Catalog;
use crate::core::{BoardCfgError, Result};
use crate::schema::{
    BatchDate, Board, BoardRecord, FieldIssue, FinalConfig, IssueKind, LegacyBoard, LegacyProduct,
    Product,
};

/// Terminal collaborator. Implementations return
/// [`BoardCfgError::Cancelled`] when the operator aborts.
pub trait Prompter {
    /// Index of the chosen item.
    fn select(&mut self, prompt: &str, items: &[String], default: usize) -> Result<usize>;

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool>;

    /// Free text, re-asked until `validate` accepts it.
    fn input(
        &mut self,
        prompt: &str,
        default: Option<&str>,
        validate: &dyn Fn(&str) -> std::result::Result<(), String>,
    ) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SensorPreset {
    BoardDefaults,
    /// Sensor board SKU.
    SensorBoard(String),
    Manual(ManualSensors),
}

/// Pre-answered questions. `None` means "ask".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPresets {
    pub sku: Option<String>,
    pub board: Option<String>,
    pub batch_date: Option<String>,
    pub sensors: Option<SensorPreset>,
    /// Skip the final save confirmation.
    pub save: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub config: FinalConfig,
    /// Whether the operator asked for the record to be written.
    pub save: bool,
}

/// A SKU as offered on one board.
#[derive(Debug, Clone, Copy)]
enum Offering<'a> {
    Current(&'a BoardRecord, &'a Board, &'a Product),
    Legacy(&'a BoardRecord, &'a LegacyBoard, &'a LegacyProduct),
}

impl<'a> Offering<'a> {
    fn record(&self) -> &'a BoardRecord {
        match self {
            Offering::Current(r, ..) | Offering::Legacy(r, ..) => r,
        }
    }

    fn sku(&self) -> &'a str {
        match self {
            Offering::Current(_, _, p) => &p.sku,
            Offering::Legacy(_, _, p) => &p.sku,
        }
    }

    fn family(&self) -> &'a str {
        match self {
            Offering::Current(_, _, p) => &p.name,
            Offering::Legacy(_, _, p) => &p.product_name,
        }
    }

    fn variant(&self) -> &'a str {
        match self {
            Offering::Current(_, _, p) => &p.variant,
            Offering::Legacy(_, _, p) => &p.variant,
        }
    }
}

fn offerings(catalog: &Catalog) -> Vec<Offering<'_>> {
    let mut out = Vec::new();
    for record in &catalog.boards {
        match record {
            BoardRecord::Current(board) => {
                out.extend(board.products.iter().map(|p| Offering::Current(record, board, p)));
            }
            BoardRecord::Legacy(board) => {
                out.extend(
                    catalog
                        .legacy_products_for(record)
                        .into_iter()
                        .map(|p| Offering::Legacy(record, board, p)),
                );
            }
        }
    }
    out
}

/// Distinct values in first-seen order.
fn distinct<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen: Vec<&str> = Vec::new();
    for v in values {
        if !seen.contains(&v) {
            seen.push(v);
        }
    }
    seen
}

fn choose<'a, P: Prompter + ?Sized>(
    prompter: &mut P,
    prompt: &str,
    options: &[&'a str],
) -> Result<&'a str> {
    if let [only] = options {
        tracing::debug!(prompt, choice = *only, "single option, not asking");
        return Ok(*only);
    }
    let items: Vec<String> = options.iter().map(|s| s.to_string()).collect();
    let index = prompter.select(prompt, &items, 0)?;
    pick(options, index)
}

fn pick<T: Copy>(items: &[T], index: usize) -> Result<T> {
    items
        .get(index)
        .copied()
        .ok_or_else(|| BoardCfgError::Prompt(format!("selection {} out of range", index)))
}

fn select_sku<'a, P: Prompter + ?Sized>(
    all: &[Offering<'a>],
    prompter: &mut P,
    presets: &SessionPresets,
) -> Result<&'a str> {
    if let Some(sku) = &presets.sku {
        return all
            .iter()
            .map(Offering::sku)
            .find(|s| s.eq_ignore_ascii_case(sku))
            .ok_or_else(|| BoardCfgError::not_found("sku", sku.clone()));
    }
    let families = distinct(all.iter().map(Offering::family));
    if families.is_empty() {
        return Err(BoardCfgError::not_found("product", "any"));
    }
    let family = choose(prompter, "Product line", &families)?;

    let in_family: Vec<&Offering> = all.iter().filter(|o| o.family() == family).collect();
    let skus = distinct(in_family.iter().map(|o| o.sku()));
    if let [only] = skus.as_slice() {
        return Ok(*only);
    }
    let labels: Vec<String> = skus
        .iter()
        .map(|sku| {
            let variant = in_family
                .iter()
                .find(|o| o.sku() == *sku)
                .map(|o| o.variant())
                .unwrap_or_default();
            format!("{} ({})", sku, variant)
        })
        .collect();
    let index = prompter.select("SKU", &labels, 0)?;
    pick(&skus, index)
}

fn select_offering<'a, P: Prompter + ?Sized>(
    all: &[Offering<'a>],
    sku: &str,
    prompter: &mut P,
    presets: &SessionPresets,
) -> Result<Offering<'a>> {
    let candidates: Vec<Offering<'a>> = all.iter().filter(|o| o.sku() == sku).copied().collect();
    if let Some(board) = &presets.board {
        return candidates
            .into_iter()
            .find(|o| o.record().matches(board))
            .ok_or_else(|| BoardCfgError::not_found("product", format!("{} on {}", sku, board)));
    }
    let labels: Vec<&str> = candidates.iter().map(|o| o.record().board_type()).collect();
    let board = choose(prompter, "Board", &labels)?;
    candidates
        .into_iter()
        .find(|o| o.record().board_type() == board)
        .ok_or_else(|| BoardCfgError::not_found("board", board))
}

fn batch_date<P: Prompter + ?Sized>(prompter: &mut P, presets: &SessionPresets) -> Result<BatchDate> {
    let raw = match &presets.batch_date {
        Some(raw) => raw.clone(),
        None => {
            let default = BatchDate::current();
            prompter.input(
                "Batch date (MYYYY or MMYYYY)",
                Some(default.as_str()),
                &|s: &str| BatchDate::parse(s.trim()).map(|_| ()).map_err(|e| e.to_string()),
            )?
        }
    };
    BatchDate::parse(raw.trim()).map_err(|e| BoardCfgError::Structural {
        schema: "BatchDate",
        issues: vec![FieldIssue::new(
            "batchDate",
            IssueKind::OutOfRange {
                message: e.to_string(),
            },
        )],
    })
}

fn manual_sensors<P: Prompter + ?Sized>(prompter: &mut P) -> Result<ManualSensors> {
    let env_items: Vec<String> = EnvSensor::ALL.iter().map(|e| e.to_string()).collect();
    let env = pick(&EnvSensor::ALL, prompter.select("Environmental sensor", &env_items, 0)?)?;
    let mlx90614 = prompter.confirm("MLX90614 infrared temperature sensor fitted?", false)?;
    let presence_items: Vec<String> = PresenceSensor::ALL.iter().map(|p| p.to_string()).collect();
    let presence = pick(
        &PresenceSensor::ALL,
        prompter.select("LD2410 presence radar", &presence_items, 2)?,
    )?;
    Ok(ManualSensors {
        env,
        mlx90614,
        presence,
    })
}

fn sensor_selection<P: Prompter + ?Sized>(
    catalog: &Catalog,
    record: &BoardRecord,
    prompter: &mut P,
    presets: &SessionPresets,
) -> Result<SensorSelection> {
    match &presets.sensors {
        Some(SensorPreset::BoardDefaults) => return Ok(SensorSelection::BoardDefaults),
        Some(SensorPreset::SensorBoard(sku)) => {
            return Ok(SensorSelection::SensorBoard(catalog.find_sensor_board(sku)?.clone()))
        }
        Some(SensorPreset::Manual(manual)) => return Ok(SensorSelection::Manual(*manual)),
        None => {}
    }

    let compatible = catalog.compatible_sensor_boards(record);
    let mut methods = vec!["Use board defaults".to_string()];
    if !compatible.is_empty() {
        methods.push("Attach a sensor board".to_string());
    }
    methods.push("Choose sensors manually".to_string());

    let method = prompter.select("Sensor configuration", &methods, 0)?;
    match methods.get(method).map(String::as_str) {
        Some("Use board defaults") => Ok(SensorSelection::BoardDefaults),
        Some("Attach a sensor board") => {
            let labels: Vec<String> = compatible
                .iter()
                .map(|s| format!("{} ({})", s.sku, s.name))
                .collect();
            let index = prompter.select("Sensor board", &labels, 0)?;
            let sensor_board = pick(&compatible, index)?;
            Ok(SensorSelection::SensorBoard(sensor_board.clone()))
        }
        Some(_) => Ok(SensorSelection::Manual(manual_sensors(prompter)?)),
        None => Err(BoardCfgError::Prompt(format!("selection {} out of range", method))),
    }
}

/// Run the full flow against a loaded catalog.
pub fn run_session<P: Prompter + ?Sized>(
    catalog: &Catalog,
    prompter: &mut P,
    presets: &SessionPresets,
) -> Result<Generated> {
    let all = offerings(catalog);
    let sku = select_sku(&all, prompter, presets)?;
    let offering = select_offering(&all, sku, prompter, presets)?;
    tracing::info!(sku, board = offering.record().board_type(), "product selected");

    let meta = UnitMeta::new(batch_date(prompter, presets)?);
    let selection = sensor_selection(catalog, offering.record(), prompter, presets)?;

    let config = match offering {
        Offering::Current(_, board, product) => {
            assemble_current(board, &product.sku, &selection, &meta)?
        }
        Offering::Legacy(_, board, product) => assemble_legacy(board, product, &selection, &meta)?,
    };

    let save = presets.save || prompter.confirm("Save configuration?", true)?;
    Ok(Generated { config, save })
}
