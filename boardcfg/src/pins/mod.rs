//! GPIO pin uniqueness
//!
//! Scope is always a single board: the same pin number on two different
//! boards never conflicts, because each board is its own pin namespace.

pub mod registry;

pub use registry::{
    detect_conflicts, detect_legacy_conflicts, detect_product_conflicts, Category, PinConflict,
    PinRegistry, PinReport, SHARED_OWNER,
};
