use crate::error::{Error, Result};

/// Decimal places used when none are configured.
pub const DEFAULT_DECIMALS: u32 = 6;

/// `10^9` is the largest factor that still leaves room for lengths in the
/// millions without overflowing the signed deviation.
pub const MAX_DECIMALS: u32 = 9;

/// Fixed-point scale that maps decimal lengths onto exact integer units.
///
/// Every length and target is converted with [`Scale::to_units`] before the
/// search, so comparisons and sums are exact. Conversion rounds half away
/// from zero (`f64::round`); anything past the configured precision is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scale {
    decimals: u32,
    factor: u64,
}

impl Default for Scale {
    fn default() -> Self {
        Self {
            decimals: DEFAULT_DECIMALS,
            factor: 10u64.pow(DEFAULT_DECIMALS),
        }
    }
}

impl Scale {
    pub fn new(decimals: u32) -> Result<Self> {
        if decimals > MAX_DECIMALS {
            return Err(Error::InvalidDecimals(decimals));
        }
        Ok(Self {
            decimals,
            factor: 10u64.pow(decimals),
        })
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn factor(&self) -> u64 {
        self.factor
    }

    /// Converts a length to integer units. Returns `None` for values that are
    /// not finite, not positive, round to zero, or do not fit a signed 64-bit
    /// deviation.
    pub fn to_units(&self, value: f64) -> Option<u64> {
        if !value.is_finite() || value <= 0.0 {
            return None;
        }
        let scaled = (value * self.factor as f64).round();
        if scaled < 1.0 || scaled >= i64::MAX as f64 {
            return None;
        }
        Some(scaled as u64)
    }

    pub fn to_real(&self, units: u64) -> f64 {
        units as f64 / self.factor as f64
    }

    pub fn to_real_signed(&self, units: i64) -> f64 {
        units as f64 / self.factor as f64
    }

    /// Formats units with exactly `decimals` fractional digits.
    pub fn format_units(&self, units: u64) -> String {
        let whole = units / self.factor;
        if self.decimals == 0 {
            return whole.to_string();
        }
        let frac = units % self.factor;
        format!("{whole}.{frac:0width$}", width = self.decimals as usize)
    }

    pub fn format_signed(&self, units: i64) -> String {
        let magnitude = self.format_units(units.unsigned_abs());
        if units < 0 {
            format!("-{magnitude}")
        } else {
            magnitude
        }
    }

    /// Round-trips a real value through the scale for display.
    pub fn format_real(&self, value: f64) -> String {
        match self.to_units(value) {
            Some(units) => self.format_units(units),
            None => format!("{value:.prec$}", prec = self.decimals as usize),
        }
    }
}
