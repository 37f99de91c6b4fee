// src/hours_ledger.rs
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

use crate::errors::NotFound;
use crate::model::{HourEntry, HourKey, WeekId};
use crate::percentage_ledger::PercentageLedger;
use crate::week_catalog::WeekCatalog;

/// Logged hours for one (user, week), keyed by client and media type.
/// A zero value is never held: setting an entry to 0 removes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeekHours {
    entries: BTreeMap<HourKey, Decimal>,
}

impl WeekHours {
    /// Builds from stored rows. Stale zero rows are treated as absent.
    pub fn from_rows(rows: HashMap<HourKey, Decimal>) -> Self {
        let entries = rows
            .into_iter()
            .filter(|(_, hours)| !hours.is_zero())
            .collect();
        Self { entries }
    }

    pub fn get(&self, key: &HourKey) -> Decimal {
        self.entries.get(key).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn set(&mut self, key: HourKey, hours: Decimal) {
        if hours.is_zero() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, hours);
        }
    }

    pub fn total(&self) -> Decimal {
        self.entries.values().copied().sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A copy with `draft` applied on top, later entries winning on duplicate keys.
    pub fn overlay(&self, draft: &[HourEntry]) -> WeekHours {
        let mut merged = self.clone();
        for entry in draft {
            merged.set(entry.key(), entry.hours);
        }
        merged
    }

    pub fn entries(&self) -> Vec<HourEntry> {
        self.entries
            .iter()
            .map(|(key, hours)| HourEntry {
                client_id: key.client_id.clone(),
                media_type_id: key.media_type_id.clone(),
                hours: *hours,
            })
            .collect()
    }
}

/// Hours per week for one user. Weeks that were never loaded read as empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HoursLedger {
    weeks: HashMap<WeekId, WeekHours>,
}

impl HoursLedger {
    pub fn insert_week(&mut self, week_id: &str, hours: WeekHours) {
        self.weeks.insert(week_id.to_string(), hours);
    }

    pub fn week(&self, week_id: &str) -> WeekHours {
        self.weeks.get(week_id).cloned().unwrap_or_default()
    }

    pub fn total_hours(&self, week_id: &str) -> Decimal {
        self.weeks
            .get(week_id)
            .map(WeekHours::total)
            .unwrap_or(Decimal::ZERO)
    }

    /// Effective required hours minus logged hours. Negative means over.
    pub fn remaining_hours(
        &self,
        catalog: &WeekCatalog,
        percentages: &PercentageLedger,
        week_id: &str,
    ) -> Result<Decimal, NotFound> {
        let required = percentages.effective_required_hours(catalog, week_id)?;
        Ok(required - self.total_hours(week_id))
    }

    pub fn is_complete(
        &self,
        catalog: &WeekCatalog,
        percentages: &PercentageLedger,
        week_id: &str,
    ) -> Result<bool, NotFound> {
        Ok(self.remaining_hours(catalog, percentages, week_id)?.is_zero())
    }
}
