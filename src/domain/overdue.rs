use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// A member's payment standing as computed by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverdueSummary {
    pub member_id: String,
    pub has_overdue: bool,
    pub overdue_count: u32,
    pub total_overdue_amount: Decimal,
    pub oldest_overdue_days: u32,
    pub restricted_access: bool,
    #[serde(default)]
    pub overdue_items: Vec<OverdueRecord>,
}

impl OverdueSummary {
    /// Checks the relationships the backend is expected to maintain
    /// between the flags and the counters.
    pub fn is_consistent(&self) -> bool {
        let count_matches = self.has_overdue == (self.overdue_count > 0);
        let restriction_implies_overdue = !self.restricted_access || self.has_overdue;
        count_matches && restriction_implies_overdue
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverdueRecord {
    pub id: String,
    pub overdue_type: OverdueType,
    pub due_amount: Decimal,
    #[serde(deserialize_with = "date_prefix")]
    pub due_date: NaiveDate,
    #[serde(deserialize_with = "date_prefix")]
    pub overdue_since: NaiveDate,
    #[serde(default)]
    pub days_overdue: u32,
    pub status: String,
    #[serde(default)]
    pub reference_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverdueType {
    Welfare,
    Educational,
    #[serde(other)]
    Other,
}

/// Total of the records' due amounts.
pub fn total_due(records: &[OverdueRecord]) -> Decimal {
    records.iter().map(|r| r.due_amount).sum()
}

// The backend sends either plain dates or full ISO timestamps.
fn date_prefix<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let date_part = raw.get(..10).unwrap_or(&raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(serde::de::Error::custom)
}
