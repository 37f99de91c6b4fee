// src/week_catalog.rs
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::errors::{CatalogError, NotFound};
use crate::model::{Week, WeekId};

/// Custom weeks ordered ascending by `period_from`, with lookup by id.
///
/// The catalog is read-only from the engine's side; it is rebuilt from the
/// store whenever the snapshot cache is refreshed.
#[derive(Debug, Clone, Default)]
pub struct WeekCatalog {
    weeks: Vec<Week>,
    index: HashMap<WeekId, usize>,
}

impl WeekCatalog {
    /// Sorts the rows and checks the period invariants: each week ends in the
    /// month it starts, ids are unique and no two periods overlap.
    pub fn new(mut weeks: Vec<Week>) -> Result<Self, CatalogError> {
        weeks.sort_by(|a, b| {
            a.period_from
                .cmp(&b.period_from)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut index = HashMap::with_capacity(weeks.len());
        let mut latest: Option<(&WeekId, NaiveDate)> = None;

        for (pos, week) in weeks.iter().enumerate() {
            if week.period_to < week.period_from {
                return Err(CatalogError::InvertedPeriod {
                    week_id: week.id.clone(),
                    period_from: week.period_from,
                    period_to: week.period_to,
                });
            }
            if week.period_to.year() != week.period_from.year()
                || week.period_to.month() != week.period_from.month()
            {
                return Err(CatalogError::CrossesMonth {
                    week_id: week.id.clone(),
                    period_from: week.period_from,
                    period_to: week.period_to,
                });
            }
            if week.required_hours < Decimal::ZERO {
                return Err(CatalogError::NegativeRequiredHours {
                    week_id: week.id.clone(),
                    required_hours: week.required_hours,
                });
            }
            if index.insert(week.id.clone(), pos).is_some() {
                return Err(CatalogError::DuplicateId(week.id.clone()));
            }
            if let Some((latest_id, latest_end)) = latest {
                if week.period_from <= latest_end {
                    return Err(CatalogError::Overlap {
                        earlier: latest_id.clone(),
                        later: week.id.clone(),
                    });
                }
            }
            latest = Some((&week.id, week.period_to));
        }

        Ok(Self { weeks, index })
    }

    pub fn weeks(&self) -> &[Week] {
        &self.weeks
    }

    pub fn len(&self) -> usize {
        self.weeks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weeks.is_empty()
    }

    pub fn find(&self, week_id: &str) -> Option<&Week> {
        self.index.get(week_id).map(|&pos| &self.weeks[pos])
    }

    pub fn get(&self, week_id: &str) -> Result<&Week, NotFound> {
        self.find(week_id)
            .ok_or_else(|| NotFound::Week(week_id.to_string()))
    }

    pub fn position(&self, week_id: &str) -> Result<usize, NotFound> {
        self.index
            .get(week_id)
            .copied()
            .ok_or_else(|| NotFound::Week(week_id.to_string()))
    }

    /// The week starting exactly on `date`. Any other date has no current week.
    pub fn week_starting_on(&self, date: NaiveDate) -> Option<&Week> {
        self.weeks
            .binary_search_by(|week| week.period_from.cmp(&date))
            .ok()
            .map(|pos| &self.weeks[pos])
    }

    /// All weeks strictly before `week_id`.
    pub fn earlier_than(&self, week_id: &str) -> Result<&[Week], NotFound> {
        let pos = self.position(week_id)?;
        Ok(&self.weeks[..pos])
    }

    /// Weeks from `first_week_id` (inclusive) to the end of the catalog.
    pub fn weeks_from(&self, first_week_id: Option<&str>) -> Result<&[Week], NotFound> {
        let start = match first_week_id {
            Some(id) => self.position(id)?,
            None => 0,
        };
        Ok(&self.weeks[start..])
    }

    /// Weeks from `first_week_id` (inclusive) up to `week_id` (exclusive).
    /// Empty when the target lies before the first obligated week.
    pub fn between(&self, first_week_id: Option<&str>, week_id: &str) -> Result<&[Week], NotFound> {
        let start = match first_week_id {
            Some(id) => self.position(id)?,
            None => 0,
        };
        let end = self.position(week_id)?;
        if start >= end {
            return Ok(&[]);
        }
        Ok(&self.weeks[start..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(date_str: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .unwrap_or_else(|_| panic!("Invalid date string format: {}", date_str))
    }

    fn week(id: &str, from: &str, to: &str) -> Week {
        Week {
            id: id.to_string(),
            name: format!("Week {}", id),
            period_from: d(from),
            period_to: d(to),
            required_hours: dec!(40),
        }
    }

    fn january() -> WeekCatalog {
        WeekCatalog::new(vec![
            week("W3", "2025-01-20", "2025-01-26"),
            week("W1", "2025-01-06", "2025-01-12"),
            week("W4", "2025-01-27", "2025-01-31"),
            week("W2", "2025-01-13", "2025-01-19"),
        ])
        .unwrap()
    }

    #[test]
    fn weeks_are_sorted_by_period_start() {
        let catalog = january();
        let ids: Vec<&str> = catalog.weeks().iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["W1", "W2", "W3", "W4"]);
        assert_eq!(catalog.len(), 4);
    }

    #[test]
    fn unknown_week_is_not_found() {
        let catalog = january();
        assert_eq!(
            catalog.get("W9").unwrap_err(),
            NotFound::Week("W9".to_string())
        );
        assert!(catalog.find("W9").is_none());
    }

    #[test]
    fn current_week_requires_exact_start_date() {
        let catalog = january();
        assert_eq!(catalog.week_starting_on(d("2025-01-13")).unwrap().id, "W2");
        assert!(catalog.week_starting_on(d("2025-01-14")).is_none());
        assert!(catalog.week_starting_on(d("2024-12-30")).is_none());
    }

    #[test]
    fn earlier_than_excludes_the_week_itself() {
        let catalog = january();
        let ids: Vec<&str> = catalog
            .earlier_than("W3")
            .unwrap()
            .iter()
            .map(|w| w.id.as_str())
            .collect();
        assert_eq!(ids, vec!["W1", "W2"]);
        assert!(catalog.earlier_than("W1").unwrap().is_empty());
    }

    #[test]
    fn between_starts_at_first_obligated_week() {
        let catalog = january();
        let ids: Vec<&str> = catalog
            .between(Some("W2"), "W4")
            .unwrap()
            .iter()
            .map(|w| w.id.as_str())
            .collect();
        assert_eq!(ids, vec!["W2", "W3"]);
        assert!(catalog.between(Some("W3"), "W2").unwrap().is_empty());
        assert_eq!(catalog.between(None, "W3").unwrap().len(), 2);
        assert!(catalog.between(Some("W9"), "W3").is_err());
    }

    #[test]
    fn overlapping_periods_are_rejected() {
        let result = WeekCatalog::new(vec![
            week("A", "2025-01-06", "2025-01-12"),
            week("B", "2025-01-12", "2025-01-18"),
        ]);
        assert_eq!(
            result.unwrap_err(),
            CatalogError::Overlap {
                earlier: "A".to_string(),
                later: "B".to_string()
            }
        );
    }

    #[test]
    fn period_must_stay_within_its_month() {
        let result = WeekCatalog::new(vec![week("A", "2025-01-27", "2025-02-02")]);
        assert!(matches!(result, Err(CatalogError::CrossesMonth { .. })));
    }

    #[test]
    fn inverted_and_duplicate_weeks_are_rejected() {
        assert!(matches!(
            WeekCatalog::new(vec![week("A", "2025-01-12", "2025-01-06")]),
            Err(CatalogError::InvertedPeriod { .. })
        ));
        assert_eq!(
            WeekCatalog::new(vec![
                week("A", "2025-01-06", "2025-01-12"),
                week("A", "2025-01-13", "2025-01-19"),
            ])
            .unwrap_err(),
            CatalogError::DuplicateId("A".to_string())
        );
    }
}
