//! Snapshot retention (TTL) codec.
//!
//! Operators enter retention as a quantity and a calendar unit ("1 month").
//! The backup controller stores it as a Go duration string ("720h" or
//! "720h0m0s"). Months are 30 days and years 365 days.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SnapshotError, SnapshotResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtlUnit {
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl TtlUnit {
    pub fn hours(&self) -> u64 {
        match self {
            TtlUnit::Hours => 1,
            TtlUnit::Days => 24,
            TtlUnit::Weeks => 24 * 7,
            TtlUnit::Months => 24 * 30,
            TtlUnit::Years => 24 * 365,
        }
    }

    fn singular(&self) -> &'static str {
        match self {
            TtlUnit::Hours => "hour",
            TtlUnit::Days => "day",
            TtlUnit::Weeks => "week",
            TtlUnit::Months => "month",
            TtlUnit::Years => "year",
        }
    }

    // Largest first, used when picking the unit for a raw hour count.
    const DESCENDING: [TtlUnit; 5] = [
        TtlUnit::Years,
        TtlUnit::Months,
        TtlUnit::Weeks,
        TtlUnit::Days,
        TtlUnit::Hours,
    ];
}

impl FromStr for TtlUnit {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hour" | "hours" | "h" => Ok(TtlUnit::Hours),
            "day" | "days" | "d" => Ok(TtlUnit::Days),
            "week" | "weeks" | "w" => Ok(TtlUnit::Weeks),
            "month" | "months" => Ok(TtlUnit::Months),
            "year" | "years" | "y" => Ok(TtlUnit::Years),
            _ => Err(SnapshotError::Validation(format!(
                "Invalid snapshot TTL unit: {}",
                s
            ))),
        }
    }
}

impl Display for TtlUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}s", self.singular())
    }
}

/// Longest duration the controller can hold: Go durations are int64
/// nanoseconds.
pub const MAX_TTL_HOURS: u64 = (i64::MAX as u64) / 3_600_000_000_000;

fn too_long(input: &str) -> SnapshotError {
    SnapshotError::Validation(format!(
        "Snapshot TTL {} exceeds the maximum of {} hours",
        input, MAX_TTL_HOURS
    ))
}

/// Retention expressed as a quantity of calendar units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ttl {
    pub quantity: u64,
    pub unit: TtlUnit,
}

impl Ttl {
    pub fn new(quantity: u64, unit: TtlUnit) -> SnapshotResult<Self> {
        if quantity == 0 {
            return Err(SnapshotError::Validation(
                "Snapshot TTL must be at least 1".to_string(),
            ));
        }
        match quantity.checked_mul(unit.hours()) {
            Some(hours) if hours <= MAX_TTL_HOURS => Ok(Self { quantity, unit }),
            _ => Err(too_long(&format!("{} {}", quantity, unit))),
        }
    }

    /// Saturates for values not built through [`Ttl::new`].
    pub fn total_hours(&self) -> u64 {
        self.quantity.saturating_mul(self.unit.hours())
    }

    /// Go duration string understood by the backup controller, e.g. `720h`.
    pub fn to_duration_string(&self) -> String {
        format!("{}h", self.total_hours())
    }

    /// Decode a Go duration string. Only whole-hour durations are accepted;
    /// the result uses the largest unit that divides the total exactly.
    pub fn from_duration_string(duration: &str) -> SnapshotResult<Self> {
        let total_seconds = parse_go_duration_seconds(duration)?;
        if total_seconds == 0 || total_seconds % 3600 != 0 {
            return Err(SnapshotError::Validation(format!(
                "Snapshot TTL must be a whole number of hours: {}",
                duration
            )));
        }
        let hours = total_seconds / 3600;
        if hours > MAX_TTL_HOURS {
            return Err(too_long(duration));
        }

        let unit = TtlUnit::DESCENDING
            .into_iter()
            .find(|unit| hours % unit.hours() == 0)
            .unwrap_or(TtlUnit::Hours);

        Ok(Self {
            quantity: hours / unit.hours(),
            unit,
        })
    }
}

impl FromStr for Ttl {
    type Err = SnapshotError;

    /// Parses the human form, e.g. `1 month` or `14 days`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (Some(quantity), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(SnapshotError::Validation(format!(
                "Invalid snapshot TTL: {:?} (expected \"<quantity> <unit>\")",
                s
            )));
        };

        let quantity: u64 = quantity.parse().map_err(|_| {
            SnapshotError::Validation(format!("Invalid snapshot TTL quantity: {}", quantity))
        })?;

        Ttl::new(quantity, unit.parse()?)
    }
}

impl Display for Ttl {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.quantity == 1 {
            write!(f, "1 {}", self.unit.singular())
        } else {
            write!(f, "{} {}", self.quantity, self.unit)
        }
    }
}

/// `"1 month"` -> `"720h"`
pub fn parse_ttl(human: &str) -> SnapshotResult<String> {
    Ok(human.parse::<Ttl>()?.to_duration_string())
}

/// `"720h"` -> `"1 month"`
pub fn format_ttl(duration: &str) -> SnapshotResult<String> {
    Ok(Ttl::from_duration_string(duration)?.to_string())
}

fn parse_go_duration_seconds(duration: &str) -> SnapshotResult<u64> {
    let invalid =
        || SnapshotError::Validation(format!("Invalid snapshot TTL duration: {}", duration));

    let duration = duration.trim();
    if duration.is_empty() {
        return Err(invalid());
    }

    let mut total: u64 = 0;
    let mut number = String::new();
    for ch in duration.chars() {
        if ch.is_ascii_digit() {
            number.push(ch);
            continue;
        }
        let multiplier = match ch {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(invalid()),
        };
        let value: u64 = number.parse().map_err(|_| invalid())?;
        total = value
            .checked_mul(multiplier)
            .and_then(|seconds| total.checked_add(seconds))
            .ok_or_else(|| too_long(duration))?;
        number.clear();
    }

    if !number.is_empty() {
        return Err(invalid());
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_human_ttl() {
        assert_eq!(parse_ttl("1 month").unwrap(), "720h");
        assert_eq!(parse_ttl("2 weeks").unwrap(), "336h");
        assert_eq!(parse_ttl("1 year").unwrap(), "8760h");
        assert_eq!(parse_ttl("36 Hours").unwrap(), "36h");
    }

    #[test]
    fn test_format_duration_ttl() {
        assert_eq!(format_ttl("720h").unwrap(), "1 month");
        assert_eq!(format_ttl("720h0m0s").unwrap(), "1 month");
        assert_eq!(format_ttl("168h").unwrap(), "1 week");
        assert_eq!(format_ttl("48h").unwrap(), "2 days");
        assert_eq!(format_ttl("25h").unwrap(), "25 hours");
        assert_eq!(format_ttl("17520h").unwrap(), "2 years");
    }

    #[test]
    fn test_rejects_invalid_ttls() {
        assert!(parse_ttl("month").is_err());
        assert!(parse_ttl("0 days").is_err());
        assert!(parse_ttl("3 fortnights").is_err());
        assert!(format_ttl("90m").is_err());
        assert!(format_ttl("1h30m").is_err());
        assert!(format_ttl("abc").is_err());
        assert!(format_ttl("").is_err());
        assert!(parse_ttl("99999999999999999 years").is_err());
        assert!(format_ttl("9999999999999999h").is_err());
        assert!(format_ttl("5000000000000000h5000000000000000h").is_err());
    }

    #[test]
    fn test_ttl_upper_bound() {
        assert_eq!(MAX_TTL_HOURS, 2_562_047);
        assert_eq!(parse_ttl("2562047 hours").unwrap(), "2562047h");
        assert_eq!(format_ttl("2562047h").unwrap(), "2562047 hours");

        let err = parse_ttl("2562048 hours").unwrap_err();
        assert!(matches!(err, SnapshotError::Validation(m) if m.contains("maximum")));
        assert!(parse_ttl("300 years").is_err());
        assert!(format_ttl("2562048h").is_err());
    }
}
