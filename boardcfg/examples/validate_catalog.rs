//! Validate a catalog directory and print a per-board pin summary.
//!
//! ```text
//! cargo run --example validate_catalog -- path/to/catalog
//! ```

use boardcfg::prelude::*;

fn main() -> Result<(), BoardCfgError> {
    let root = std::env::args().nth(1).unwrap_or_else(|| "catalog".to_string());
    let source = FsCatalog::new(&root);

    let report = BoardCfgCore::validate_catalog(&source)?;
    for entry in &report.entries {
        let status = if entry.is_valid() { "ok" } else { "FAILED" };
        match &entry.pins {
            Some(pins) => println!("{:<24} {:<6} {} pins", entry.id, status, pins.all_pins.len()),
            None => println!("{:<24} {}", entry.id, status),
        }
        for error in &entry.errors {
            println!("    {}", error);
        }
    }

    println!(
        "\n{} boards, {} sensor boards, {} legacy SKUs, {} failures",
        report.stats.boards,
        report.stats.sensor_boards,
        report.stats.legacy_products,
        report.stats.failures
    );
    Ok(())
}
