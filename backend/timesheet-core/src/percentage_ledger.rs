// src/percentage_ledger.rs
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;

use crate::errors::{CatalogError, NotFound};
use crate::model::WeekId;
use crate::week_catalog::WeekCatalog;

pub const DEFAULT_PERCENTAGE: Decimal = Decimal::ONE_HUNDRED;

/// Sparse per-week work percentages for one user.
///
/// Only weeks where the percentage changes carry a row; every other week
/// inherits from the nearest earlier row, or 100 when there is none.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PercentageLedger {
    explicit: HashMap<WeekId, Decimal>,
}

impl PercentageLedger {
    pub fn new(rows: HashMap<WeekId, Decimal>) -> Self {
        Self { explicit: rows }
    }

    /// Ledger from stored rows, refusing any percentage outside 0..=100.
    pub fn from_rows(user_id: &str, rows: HashMap<WeekId, Decimal>) -> Result<Self, CatalogError> {
        if let Some((week_id, percentage)) = rows.iter().find(|(_, p)| !is_valid_percentage(**p)) {
            return Err(CatalogError::PercentageOutOfRange {
                user_id: user_id.to_string(),
                week_id: week_id.clone(),
                percentage: *percentage,
            });
        }
        Ok(Self::new(rows))
    }

    pub fn explicit(&self, week_id: &str) -> Option<Decimal> {
        self.explicit.get(week_id).copied()
    }

    pub fn set(&mut self, week_id: &str, percentage: Decimal) {
        self.explicit.insert(week_id.to_string(), percentage);
    }

    pub fn resolve(&self, catalog: &WeekCatalog, week_id: &str) -> Result<Decimal, NotFound> {
        catalog.get(week_id)?;
        if let Some(percentage) = self.explicit(week_id) {
            return Ok(percentage);
        }
        let inherited = catalog
            .earlier_than(week_id)?
            .iter()
            .rev()
            .find_map(|week| self.explicit(&week.id));
        Ok(inherited.unwrap_or(DEFAULT_PERCENTAGE))
    }

    pub fn effective_required_hours(
        &self,
        catalog: &WeekCatalog,
        week_id: &str,
    ) -> Result<Decimal, NotFound> {
        let week = catalog.get(week_id)?;
        let percentage = self.resolve(catalog, week_id)?;
        Ok(effective_required_hours(week.required_hours, percentage))
    }
}

/// `round(base × percentage / 100)` to whole hours, halves rounding up.
/// Saturates instead of overflowing; stored percentages are range-checked on
/// load, so the factor never exceeds one.
pub fn effective_required_hours(base_hours: Decimal, percentage: Decimal) -> Decimal {
    base_hours
        .saturating_mul(percentage / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

pub fn is_valid_percentage(percentage: Decimal) -> bool {
    percentage >= Decimal::ZERO && percentage <= Decimal::ONE_HUNDRED
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Week;
    use chrono::{Duration, NaiveDate};
    use rust_decimal_macros::dec;

    // W1..W4, consecutive Mondays starting 2025-03-03, all inside March
    fn catalog() -> WeekCatalog {
        let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let weeks = (0..4)
            .map(|i| {
                let from = start + Duration::weeks(i);
                Week {
                    id: format!("W{}", i + 1),
                    name: format!("March {}", i + 1),
                    period_from: from,
                    period_to: from + Duration::days(4),
                    required_hours: dec!(40),
                }
            })
            .collect();
        WeekCatalog::new(weeks).unwrap()
    }

    #[test]
    fn no_rows_resolves_to_full_time() {
        let ledger = PercentageLedger::default();
        assert_eq!(ledger.resolve(&catalog(), "W3").unwrap(), dec!(100));
    }

    #[test]
    fn explicit_row_wins() {
        let mut ledger = PercentageLedger::default();
        ledger.set("W1", dec!(80));
        ledger.set("W2", dec!(60));
        assert_eq!(ledger.resolve(&catalog(), "W2").unwrap(), dec!(60));
    }

    #[test]
    fn later_weeks_inherit_nearest_earlier_row() {
        let catalog = catalog();
        let mut ledger = PercentageLedger::default();
        ledger.set("W3", dec!(50));

        assert_eq!(ledger.resolve(&catalog, "W4").unwrap(), dec!(50));
        assert_eq!(
            ledger.effective_required_hours(&catalog, "W4").unwrap(),
            dec!(20)
        );
    }

    #[test]
    fn inheritance_never_looks_ahead() {
        let catalog = catalog();
        let mut ledger = PercentageLedger::default();
        ledger.set("W2", dec!(25));
        ledger.set("W4", dec!(75));

        let resolved: Vec<Decimal> = catalog
            .weeks()
            .iter()
            .map(|w| ledger.resolve(&catalog, &w.id).unwrap())
            .collect();
        assert_eq!(resolved, vec![dec!(100), dec!(25), dec!(25), dec!(75)]);
    }

    #[test]
    fn unknown_week_is_not_found_even_with_a_row() {
        let mut ledger = PercentageLedger::default();
        ledger.set("W9", dec!(50));
        assert_eq!(
            ledger.resolve(&catalog(), "W9").unwrap_err(),
            NotFound::Week("W9".to_string())
        );
    }

    #[test]
    fn required_hours_round_half_up() {
        assert_eq!(effective_required_hours(dec!(37), dec!(50)), dec!(19));
        assert_eq!(effective_required_hours(dec!(40), dec!(33)), dec!(13));
        assert_eq!(effective_required_hours(dec!(40), dec!(0)), dec!(0));
        assert_eq!(effective_required_hours(dec!(40), dec!(100)), dec!(40));
    }

    #[test]
    fn huge_base_hours_do_not_overflow() {
        assert_eq!(effective_required_hours(Decimal::MAX, dec!(100)), Decimal::MAX);
        assert_eq!(effective_required_hours(Decimal::MAX, dec!(150)), Decimal::MAX);
    }

    #[test]
    fn stored_rows_outside_range_are_refused() {
        let rows = HashMap::from([("W1".to_string(), dec!(80)), ("W2".to_string(), dec!(150))]);
        assert_eq!(
            PercentageLedger::from_rows("emp", rows).unwrap_err(),
            CatalogError::PercentageOutOfRange {
                user_id: "emp".to_string(),
                week_id: "W2".to_string(),
                percentage: dec!(150),
            }
        );

        let rows = HashMap::from([("W1".to_string(), dec!(80))]);
        let ledger = PercentageLedger::from_rows("emp", rows).unwrap();
        assert_eq!(ledger.explicit("W1"), Some(dec!(80)));
    }

    #[test]
    fn percentage_bounds() {
        assert!(is_valid_percentage(dec!(0)));
        assert!(is_valid_percentage(dec!(100)));
        assert!(is_valid_percentage(dec!(62.5)));
        assert!(!is_valid_percentage(dec!(-1)));
        assert!(!is_valid_percentage(dec!(100.5)));
    }
}
