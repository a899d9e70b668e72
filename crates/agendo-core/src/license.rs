//! # License State Evaluator
//!
//! Pure functions over a `BusinessLicense` (or its absence) and an
//! instant. A license is valid while it is active and `now <= end_date`.
//!
//! Durations are calendar additions, not fixed lengths: a `1month`
//! license started on the 15th ends on the 15th of the next month. When
//! the start day does not exist in the target month the surplus days
//! roll into the following month (Jan 31 + 1 month = Mar 3 in 2023).

use chrono::{DateTime, Datelike, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::models::license::{BusinessLicense, LicenseType};

/// A license ending within this many days counts as expiring soon.
pub const EXPIRING_SOON_DAYS: i64 = 3;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// True when there is no license, it was deactivated, or `now` is past
/// its end date.
pub fn is_expired(license: Option<&BusinessLicense>, now: DateTime<Utc>) -> bool {
    match license {
        None => true,
        Some(l) => !l.is_active || now > l.end_date,
    }
}

/// True when an active license ends within [`EXPIRING_SOON_DAYS`].
pub fn is_expiring_soon(license: Option<&BusinessLicense>, now: DateTime<Utc>) -> bool {
    match license {
        Some(l) if l.is_active => l.end_date <= now + Duration::days(EXPIRING_SOON_DAYS),
        _ => false,
    }
}

/// Whole days until the end date, rounded up. Zero for a missing or
/// inactive license; negative once the end date has passed.
pub fn days_remaining(license: Option<&BusinessLicense>, now: DateTime<Utc>) -> i64 {
    match license {
        Some(l) if l.is_active => {
            let millis = (l.end_date - now).num_milliseconds();
            let days = millis.div_euclid(MILLIS_PER_DAY);
            if millis.rem_euclid(MILLIS_PER_DAY) == 0 {
                days
            } else {
                days + 1
            }
        }
        _ => 0,
    }
}

/// End date of a license of `license_type` starting at `start`.
pub fn compute_end_date(start: DateTime<Utc>, license_type: LicenseType) -> DateTime<Utc> {
    match license_type {
        LicenseType::FifteenDays => start + Duration::days(15),
        LicenseType::OneMonth => add_months_rolling(start, 1),
        LicenseType::ThreeMonths => add_months_rolling(start, 3),
        LicenseType::SixMonths => add_months_rolling(start, 6),
        LicenseType::OneYear => add_months_rolling(start, 12),
    }
}

/// Move to the same day-of-month `months` later, spilling into the next
/// month when that day does not exist.
fn add_months_rolling(start: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    let day_offset = Duration::days(i64::from(start.day0()));
    let first_of_month = start - day_offset;
    first_of_month + Months::new(months) + day_offset
}

/// Snapshot of a business's license as seen by the UI and the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseStatus {
    pub is_valid: bool,
    pub is_expired: bool,
    pub is_expiring_soon: bool,
    pub days_remaining: i64,
    pub license: Option<BusinessLicense>,
    pub business_id: Option<String>,
}

impl LicenseStatus {
    pub fn evaluate(
        business_id: Option<&str>,
        license: Option<BusinessLicense>,
        now: DateTime<Utc>,
    ) -> Self {
        let expired = is_expired(license.as_ref(), now);
        Self {
            is_valid: !expired,
            is_expired: expired,
            is_expiring_soon: is_expiring_soon(license.as_ref(), now),
            days_remaining: days_remaining(license.as_ref(), now),
            license,
            business_id: business_id.map(str::to_owned),
        }
    }
}
