use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// A hired employee. `hired_at` is kept as text; the reports read the year
/// and month from its leading `YYYY-MM-DD` characters.
#[derive(sqlx::FromRow, Serialize, Deserialize, Validate, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Employee {
    pub id: i32,
    pub name: String,
    #[serde(alias = "datetime")]
    #[validate(custom = "validate_hired_at")]
    pub hired_at: String,
    pub department_id: i32,
    pub job_id: i32,
}

pub fn validate_hired_at(hired_at: &str) -> Result<(), ValidationError> {
    let date = hired_at.get(..10).ok_or_else(|| ValidationError::new("hired_at must start with YYYY-MM-DD"))?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| ValidationError::new("hired_at must start with YYYY-MM-DD"))
}
