//! Final per-unit configuration assembly.
//!
//! A configuration is composed from catalog values that are never mutated:
//! sensor overrides build a fresh capabilities value, and the finished
//! record is serialized and re-validated before it is handed back.

use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::core::{BoardCfgError, Result};
use crate::schema::{
    self, BatchDate, Board, FinalConfig, LegacyBoard, LegacyProduct, SensorBoard,
    SensorCapabilities, SensorFlags, CONFIG_VERSION_CURRENT, CONFIG_VERSION_LEGACY,
};

/// Environmental sensor fitted to the unit. The two parts are mutually
/// exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnvSensor {
    Bme688,
    Sht41,
    #[default]
    None,
}

impl EnvSensor {
    pub const ALL: [EnvSensor; 3] = [EnvSensor::Bme688, EnvSensor::Sht41, EnvSensor::None];

    pub fn as_str(self) -> &'static str {
        match self {
            EnvSensor::Bme688 => "bme688",
            EnvSensor::Sht41 => "sht41",
            EnvSensor::None => "none",
        }
    }
}

impl fmt::Display for EnvSensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvSensor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown environmental sensor '{}' (bme688, sht41, none)", s))
    }
}

/// LD2410 presence radar wiring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PresenceSensor {
    Uart,
    Binary,
    #[default]
    None,
}

impl PresenceSensor {
    pub const ALL: [PresenceSensor; 3] = [
        PresenceSensor::Uart,
        PresenceSensor::Binary,
        PresenceSensor::None,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PresenceSensor::Uart => "uart",
            PresenceSensor::Binary => "binary",
            PresenceSensor::None => "none",
        }
    }
}

impl fmt::Display for PresenceSensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresenceSensor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown presence sensor '{}' (uart, binary, none)", s))
    }
}

/// Sensors chosen by hand instead of from a sensor board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManualSensors {
    pub env: EnvSensor,
    pub mlx90614: bool,
    pub presence: PresenceSensor,
}

impl ManualSensors {
    pub fn flags(&self) -> SensorFlags {
        SensorFlags {
            has_mlx90614: self.mlx90614,
            has_bme688: self.env == EnvSensor::Bme688,
            has_sht41: self.env == EnvSensor::Sht41,
            has_ld2410_uart: self.presence == PresenceSensor::Uart,
            has_ld2410_binary: self.presence == PresenceSensor::Binary,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SensorSelection {
    /// Keep whatever the board or product declares.
    BoardDefaults,
    SensorBoard(SensorBoard),
    Manual(ManualSensors),
}

impl SensorSelection {
    /// Flags that replace the defaults, or `None` to keep them.
    pub fn override_flags(&self) -> Option<SensorFlags> {
        match self {
            SensorSelection::BoardDefaults => None,
            SensorSelection::SensorBoard(sb) => Some(sb.capabilities.flags()),
            SensorSelection::Manual(manual) => Some(manual.flags()),
        }
    }

    fn sensor_board(&self) -> Option<&SensorBoard> {
        match self {
            SensorSelection::SensorBoard(sb) => Some(sb),
            _ => None,
        }
    }
}

/// Apply a selection to a set of default flags. Overrides replace all five
/// flags; nothing is merged.
pub fn apply_sensor_flags(defaults: SensorFlags, selection: &SensorSelection) -> SensorFlags {
    selection.override_flags().unwrap_or(defaults)
}

/// Per-unit provisioning credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
}

impl Credentials {
    /// 32 hex characters of key, 64 of secret.
    pub fn generate() -> Self {
        let key = uuid::Uuid::new_v4().simple().to_string();
        let secret = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );
        Self { key, secret }
    }

    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }
}

/// Values that identify one manufactured unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitMeta {
    pub batch_date: BatchDate,
    pub credentials: Credentials,
}

impl UnitMeta {
    pub fn new(batch_date: BatchDate) -> Self {
        Self {
            batch_date,
            credentials: Credentials::generate(),
        }
    }
}

fn ensure_compatible<'a>(
    selection: &SensorSelection,
    board_type: &str,
    identifiers: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    if let Some(sb) = selection.sensor_board() {
        if !sb.is_compatible_with(identifiers) {
            return Err(BoardCfgError::Incompatible {
                sensor_board: sb.sku.clone(),
                board: board_type.to_string(),
            });
        }
    }
    Ok(())
}

fn finalize(config: FinalConfig) -> Result<FinalConfig> {
    let value: Value = serde_json::to_value(&config)?;
    let config = schema::validate::<FinalConfig>(&value)?;
    tracing::debug!(sku = %config.sku, board = %config.board_type, "assembled configuration");
    Ok(config)
}

/// Assemble an `i2c` + `product` configuration for `sku` on a current board.
pub fn assemble_current(
    board: &Board,
    sku: &str,
    selection: &SensorSelection,
    meta: &UnitMeta,
) -> Result<FinalConfig> {
    let product = board
        .product(sku)
        .ok_or_else(|| BoardCfgError::not_found("product", format!("{} on {}", sku, board.board_type)))?;
    let identifiers = std::iter::once(board.board_type.as_str())
        .chain(board.aliases.iter().map(String::as_str));
    ensure_compatible(selection, &board.board_type, identifiers)?;

    let defaults = product.sensor_flags();
    let sensor_capabilities = match selection {
        SensorSelection::BoardDefaults => None,
        SensorSelection::SensorBoard(sb) => Some(sb.capabilities.clone()),
        SensorSelection::Manual(manual) if manual.flags() != defaults => {
            Some(SensorCapabilities::from_flags(manual.flags()))
        }
        SensorSelection::Manual(_) => None,
    };

    finalize(FinalConfig {
        config_version: CONFIG_VERSION_CURRENT,
        sku: product.sku.clone(),
        board_type: board.board_type.clone(),
        board_version: board.board_version.clone(),
        batch_date: meta.batch_date.to_string(),
        provisioning_key: meta.credentials.key.clone(),
        provisioning_secret: meta.credentials.secret.clone(),
        module: board.module.clone(),
        i2c: Some(board.i2c.clone()),
        product: Some(product.clone()),
        sensor_capabilities,
        capabilities: None,
        pinout: None,
        heating_wattage: None,
        sensor_board: selection.sensor_board().map(|sb| sb.sku.clone()),
        extra: Default::default(),
    })
}

/// Assemble a `capabilities` + `pinout` configuration for a legacy SKU.
pub fn assemble_legacy(
    board: &LegacyBoard,
    product: &LegacyProduct,
    selection: &SensorSelection,
    meta: &UnitMeta,
) -> Result<FinalConfig> {
    let identifiers = || {
        std::iter::once(board.board_type.as_str()).chain(board.aliases.iter().map(String::as_str))
    };
    if !product.is_compatible_with(identifiers()) {
        return Err(BoardCfgError::not_found(
            "product",
            format!("{} on {}", product.sku, board.board_type),
        ));
    }
    ensure_compatible(selection, &board.board_type, identifiers())?;

    let flags = apply_sensor_flags(board.capabilities.sensor_flags(), selection);
    let capabilities = board.capabilities.with_sensor_flags(flags);

    finalize(FinalConfig {
        config_version: CONFIG_VERSION_LEGACY,
        sku: product.sku.clone(),
        board_type: board.board_type.clone(),
        board_version: board.board_version.clone(),
        batch_date: meta.batch_date.to_string(),
        provisioning_key: meta.credentials.key.clone(),
        provisioning_secret: meta.credentials.secret.clone(),
        module: board.module.clone(),
        i2c: None,
        product: None,
        sensor_capabilities: selection.sensor_board().map(|sb| sb.capabilities.clone()),
        capabilities: Some(capabilities),
        pinout: Some(board.pinout.clone()),
        heating_wattage: Some(product.heating_wattage),
        sensor_board: selection.sensor_board().map(|sb| sb.sku.clone()),
        extra: Default::default(),
    })
}
