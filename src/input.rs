//! Validation applied before a search is started. The solver defends itself
//! against bad values too, but only these checks explain what was wrong.
//!
//! Every check runs against the [`Scale`] the search will use, so anything
//! accepted here is also representable by the engine.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::scale::Scale;
use crate::types::InventoryItem;

/// Parses a desired length such as `120.5`.
pub fn parse_target(scale: Scale, s: &str) -> Result<f64> {
    let trimmed = s.trim();
    let value = trimmed
        .parse::<f64>()
        .map_err(|_| Error::InvalidTarget(trimmed.to_string()))?;
    validate_target(scale, value).map_err(|_| Error::InvalidTarget(trimmed.to_string()))?;
    Ok(value)
}

pub fn validate_target(scale: Scale, target: f64) -> Result<()> {
    if scale.to_units(target).is_none() {
        return Err(Error::InvalidTarget(target.to_string()));
    }
    Ok(())
}

/// Parses a pipe as `LEN:COUNT`, e.g. `25.5:4`.
pub fn parse_pipe(scale: Scale, s: &str) -> Result<InventoryItem> {
    let invalid = || Error::InvalidPipe(s.to_string());
    let (length, count) = s.trim().split_once(':').ok_or_else(invalid)?;
    let length = length.trim().parse::<f64>().map_err(|_| invalid())?;
    let stock = count.trim().parse::<u32>().map_err(|_| invalid())?;
    let item = InventoryItem::new(length, stock);
    validate_item(scale, &item)?;
    Ok(item)
}

pub fn validate_item(scale: Scale, item: &InventoryItem) -> Result<()> {
    if scale.to_units(item.length).is_none() {
        return Err(Error::InvalidLength(item.length));
    }
    if item.stock == 0 {
        return Err(Error::InvalidStock(item.length));
    }
    Ok(())
}

/// Checks each item, and that pipes sharing a length after rounding do not
/// add up to more pieces than a count can hold.
pub fn validate_inventory(scale: Scale, items: &[InventoryItem]) -> Result<()> {
    if items.is_empty() {
        return Err(Error::EmptyInventory);
    }
    let mut merged: BTreeMap<u64, u32> = BTreeMap::new();
    for item in items {
        validate_item(scale, item)?;
        let Some(units) = scale.to_units(item.length) else {
            return Err(Error::InvalidLength(item.length));
        };
        let stock = merged.entry(units).or_insert(0);
        *stock = stock
            .checked_add(item.stock)
            .ok_or(Error::StockOverflow(item.length))?;
    }
    Ok(())
}

pub fn validate_top_n(top_n: usize) -> Result<()> {
    if top_n == 0 {
        return Err(Error::InvalidTopN);
    }
    Ok(())
}
