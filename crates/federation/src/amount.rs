use serde::{Deserialize, Serialize};

use hourbridge_core::{DomainError, DomainResult, ValueObject};

/// Time-credit amount for a cross-tenant transfer, stored in hundredths of an
/// hour so bounds and ledger arithmetic stay exact.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct TransferAmount(i64);

impl ValueObject for TransferAmount {}

const MIN_HOURS: f64 = 0.01;
const MAX_HOURS: f64 = 100.0;
/// Slack for binary representation error, e.g. `2.07 * 100.0`.
const HUNDREDTH_TOLERANCE: f64 = 1e-6;

impl TransferAmount {
    /// 0.01 hours.
    pub const MIN: TransferAmount = TransferAmount(1);
    /// 100 hours.
    pub const MAX: TransferAmount = TransferAmount(10_000);

    pub fn from_hundredths(hundredths: i64) -> DomainResult<Self> {
        if (Self::MIN.0..=Self::MAX.0).contains(&hundredths) {
            Ok(Self(hundredths))
        } else {
            Err(DomainError::validation(format!(
                "transfer amount must be between 0.01 and 100 hours (got {})",
                format_hundredths(hundredths)
            )))
        }
    }

    /// Whole hundredths of an hour between 0.01 and 100, checked on the raw
    /// value. Finer fractions are rejected rather than rounded.
    pub fn from_hours(hours: f64) -> DomainResult<Self> {
        if !hours.is_finite() {
            return Err(DomainError::validation("transfer amount must be a finite number"));
        }
        if !(MIN_HOURS..=MAX_HOURS).contains(&hours) {
            return Err(DomainError::validation(format!(
                "transfer amount must be between 0.01 and 100 hours (got {hours})"
            )));
        }
        let scaled = hours * 100.0;
        let whole = scaled.round();
        if (scaled - whole).abs() > HUNDREDTH_TOLERANCE {
            return Err(DomainError::validation(format!(
                "transfer amount must have at most two decimal places (got {hours})"
            )));
        }
        Self::from_hundredths(whole as i64)
    }

    pub fn hundredths(self) -> i64 {
        self.0
    }

    pub fn hours(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl TryFrom<i64> for TransferAmount {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_hundredths(value)
    }
}

impl From<TransferAmount> for i64 {
    fn from(value: TransferAmount) -> Self {
        value.0
    }
}

impl core::fmt::Display for TransferAmount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&format_hundredths(self.0))
    }
}

fn format_hundredths(v: i64) -> String {
    let sign = if v < 0 { "-" } else { "" };
    let abs = v.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
