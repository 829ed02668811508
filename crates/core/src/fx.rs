//! Daily FX rates, loaded once at startup from a JSON table.
//!
//! The table is USD-pivoted: `rates[c]` is how many units of `c` one USD
//! buys. Evaluations convert through the pivot; a missing currency means the
//! rule is skipped for that transaction, never guessed.

use cardwatch_primitives::models::CurrencyCode;
use cardwatch_primitives::ApiError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct FxTable {
    pub base: CurrencyCode,
    pub date: String,
    pub rates: HashMap<CurrencyCode, f64>,
}

impl FxTable {
    pub fn load(path: &str) -> Result<Self, ApiError> {
        let raw = std::fs::read_to_string(Path::new(path))
            .map_err(|e| ApiError::Fx(format!("Cannot read FX table {}: {}", path, e)))?;
        let table: FxTable = serde_json::from_str(&raw)
            .map_err(|e| ApiError::Fx(format!("Invalid FX table {}: {}", path, e)))?;

        if table.base != CurrencyCode::USD {
            return Err(ApiError::Fx(format!(
                "FX table must be USD-pivoted, found base {}",
                table.base
            )));
        }
        for (currency, rate) in &table.rates {
            if *rate <= 0.0 {
                return Err(ApiError::Fx(format!(
                    "Non-positive rate for {} in {}",
                    currency, path
                )));
            }
        }
        Ok(table)
    }

    /// Minimal table for environments without a rates file; only USD
    /// identity conversions succeed.
    pub fn usd_only() -> Self {
        Self {
            base: CurrencyCode::USD,
            date: "1970-01-01".into(),
            rates: HashMap::new(),
        }
    }

    fn rate_for(&self, currency: CurrencyCode) -> Option<f64> {
        if currency == self.base {
            Some(1.0)
        } else {
            self.rates.get(&currency).copied()
        }
    }

    /// None when either side of the pair is missing from the table.
    pub fn convert_cents(
        &self,
        amount_cents: i64,
        from: CurrencyCode,
        to: CurrencyCode,
    ) -> Option<i64> {
        if from == to {
            return Some(amount_cents);
        }
        let from_rate = self.rate_for(from)?;
        let to_rate = self.rate_for(to)?;
        let usd = amount_cents as f64 / from_rate;
        Some((usd * to_rate).round() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> FxTable {
        let mut rates = HashMap::new();
        rates.insert(CurrencyCode::EUR, 0.9);
        rates.insert(CurrencyCode::GBP, 0.8);
        FxTable {
            base: CurrencyCode::USD,
            date: "2025-06-14".into(),
            rates,
        }
    }

    #[test]
    fn identity_conversion_is_exact() {
        assert_eq!(
            table().convert_cents(54_700, CurrencyCode::USD, CurrencyCode::USD),
            Some(54_700)
        );
    }

    #[test]
    fn converts_through_usd_pivot() {
        // 90 EUR -> 100 USD -> 80 GBP
        assert_eq!(
            table().convert_cents(9_000, CurrencyCode::EUR, CurrencyCode::GBP),
            Some(8_000)
        );
    }

    #[test]
    fn missing_rate_yields_none() {
        assert_eq!(
            table().convert_cents(1_000, CurrencyCode::JPY, CurrencyCode::USD),
            None
        );
    }
}
