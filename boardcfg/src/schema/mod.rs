//! Versioned record schemas
//!
//! Every catalog and output record goes through the same two steps:
//!
//! 1. a structural walk over the raw JSON ([`Checker`]) that collects every
//!    missing key, type mismatch, range and enum violation, and cross-field
//!    refinement failure in one pass;
//! 2. a typed decode with `serde`, followed by the record's pin-uniqueness
//!    refinement.
//!
//! Unknown keys are never rejected. Each typed record keeps them in an
//! `extra` bag so a load → validate → save round-trip preserves them.

pub mod batch_date;
pub mod board;
pub mod checker;
pub mod final_config;
pub mod legacy;
pub mod product;
pub mod sensor_board;

pub use batch_date::BatchDate;
pub use board::{Board, BoardRecord, I2cBus, Module};
pub use checker::{Checker, FieldIssue, IssueKind};
pub use final_config::{ConfigShape, FinalConfig, CONFIG_VERSION_CURRENT, CONFIG_VERSION_LEGACY};
pub use legacy::{
    HeatingWattage, LegacyBoard, LegacyCapabilities, LegacyPinout, LegacyProduct,
    LegacySkuCatalog,
};
pub use product::{
    AnalogSensor, Button, ButtonType, HeatingRelay, I2cModel, I2cSensor, Led, LedType,
    LightingRelay, LightingType, Product, Sensor, SensorKind, UartSensor,
};
pub use sensor_board::{SensorBoard, SensorBoardCatalog, SensorCapabilities, SensorFlags};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::core::{BoardCfgError, Result};

/// GPIO pin number.
pub type Pin = u32;

/// Bag of unrecognized keys carried through untouched.
pub type Extra = Map<String, Value>;

/// A record type with a structural check and an optional refinement.
pub trait Schema: Sized + DeserializeOwned {
    /// Name used in validation reports.
    const NAME: &'static str;

    /// Walk the raw value and record every violated constraint.
    fn check(checker: &mut Checker, value: &Value);

    /// Cross-field constraints that need the typed record (pin uniqueness).
    fn refine(&self) -> Result<()> {
        Ok(())
    }
}

/// Structural validation and typed decode, without refinements.
pub fn parse_structure<T: Schema>(value: &Value) -> Result<T> {
    let mut checker = Checker::new();
    T::check(&mut checker, value);
    if !checker.is_clean() {
        return Err(BoardCfgError::Structural {
            schema: T::NAME,
            issues: checker.into_issues(),
        });
    }
    T::deserialize(value).map_err(|e| BoardCfgError::Structural {
        schema: T::NAME,
        issues: vec![FieldIssue::new(
            "",
            IssueKind::Malformed {
                message: e.to_string(),
            },
        )],
    })
}

/// Full validation: structure, typed decode, then refinements.
///
/// Pure: the input is only borrowed and never modified.
pub fn validate<T: Schema>(value: &Value) -> Result<T> {
    let record = parse_structure::<T>(value)?;
    record.refine()?;
    Ok(record)
}

/// Parse JSON text, then [`validate`] it.
pub fn validate_str<T: Schema>(text: &str) -> Result<T> {
    let value: Value = serde_json::from_str(text)?;
    validate(&value)
}
