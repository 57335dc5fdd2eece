//! boardcfg - validated device configuration derivation
//!
//! Given a catalog of hardware boards and sensor-board add-ons, produce one
//! schema-valid configuration record per manufactured unit while
//! guaranteeing that no two functions on a board share a GPIO pin.
//!
//! # Quick Start
//!
//! ```no_run
//! use boardcfg::prelude::*;
//!
//! let source = FsCatalog::new("catalog");
//! let report = BoardCfgCore::validate_catalog(&source).unwrap();
//! for entry in report.failures() {
//!     for error in &entry.errors {
//!         println!("{}: {}", entry.id, error);
//!     }
//! }
//! ```
//!
//! # Features
//!
//! - **Schema validation**: boards, sensor boards, products and final
//!   configurations, every issue reported at once
//! - **Pin uniqueness**: per-board GPIO conflict detection
//! - **Migration**: legacy SKU mapping to per-board products
//! - **Assembly**: per-unit records with sensor-board overrides

pub mod assemble;
pub mod catalog;
pub mod core;
pub mod migrate;
pub mod output;
pub mod pins;
pub mod schema;
pub mod session;

// Re-export main types
pub use assemble::{
    assemble_current, assemble_legacy, Credentials, EnvSensor, ManualSensors, PresenceSensor,
    SensorSelection, UnitMeta,
};
pub use catalog::{Catalog, CatalogSource, FsCatalog};
pub use crate::core::{BoardCfgCore, BoardCfgError, CatalogReport, EntryReport, Result};
pub use migrate::{migrate, MigrationOutput, PinoutTable};
pub use output::{save_config, SavedConfig};
pub use pins::{PinConflict, PinRegistry, PinReport};
pub use schema::{validate, BatchDate, BoardRecord, FinalConfig};
pub use session::{run_session, Generated, Prompter, SensorPreset, SessionPresets};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        BoardCfgCore, BoardCfgError, Catalog, CatalogSource, FinalConfig, FsCatalog, PinReport,
        Prompter, SessionPresets,
    };
}
