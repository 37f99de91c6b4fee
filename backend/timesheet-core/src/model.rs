// src/model.rs
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type UserId = String;
pub type WeekId = String;
pub type ClientId = String;
pub type MediaTypeId = String;

// --- Users ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Manager,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub role: Role,
    #[serde(default)]
    pub manager_id: Option<UserId>,
    // Second approval delegate, independent of the manager relation
    #[serde(default)]
    pub user_head_id: Option<UserId>,
    /// Earliest week the user is obligated to fill. `None` means the whole catalog.
    #[serde(default)]
    pub first_week_id: Option<WeekId>,
    #[serde(default)]
    pub hidden: bool,
}

impl User {
    pub fn new(id: &str, role: Role) -> Self {
        Self {
            id: id.to_string(),
            role,
            manager_id: None,
            user_head_id: None,
            first_week_id: None,
            hidden: false,
        }
    }

    pub fn managed_by(mut self, manager_id: &str) -> Self {
        self.manager_id = Some(manager_id.to_string());
        self
    }

    pub fn headed_by(mut self, head_id: &str) -> Self {
        self.user_head_id = Some(head_id.to_string());
        self
    }

    pub fn starting_at(mut self, week_id: &str) -> Self {
        self.first_week_id = Some(week_id.to_string());
        self
    }

    pub fn is_managed_by(&self, manager_id: &str) -> bool {
        self.manager_id.as_deref() == Some(manager_id)
    }

    pub fn is_headed_by(&self, head_id: &str) -> bool {
        self.user_head_id.as_deref() == Some(head_id)
    }
}

// --- Custom weeks ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Week {
    pub id: WeekId,
    pub name: String,
    pub period_from: NaiveDate,
    pub period_to: NaiveDate,
    /// Base hours for a 100% allocation.
    pub required_hours: Decimal,
}

// --- Hour entries ---

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HourKey {
    pub client_id: ClientId,
    pub media_type_id: MediaTypeId,
}

impl HourKey {
    pub fn new(client_id: &str, media_type_id: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            media_type_id: media_type_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourEntry {
    pub client_id: ClientId,
    pub media_type_id: MediaTypeId,
    pub hours: Decimal,
}

impl HourEntry {
    pub fn new(client_id: &str, media_type_id: &str, hours: Decimal) -> Self {
        Self {
            client_id: client_id.to_string(),
            media_type_id: media_type_id.to_string(),
            hours,
        }
    }

    pub fn key(&self) -> HourKey {
        HourKey {
            client_id: self.client_id.clone(),
            media_type_id: self.media_type_id.clone(),
        }
    }
}
