//! Observation sanity checks.
//!
//! Gates extracted fields before any chain interaction: garbage from the
//! page source must never reach the registry. A rejected observation is a
//! clean end of run, not a crash.

use rust_decimal::Decimal;

use crate::extract::ExtractedFields;
use crate::types::{Observation, OracleError};

const SECONDS_PER_DAY: i64 = 86_400;

/// Validate extracted fields into an `Observation`, or fail naming the
/// violated bound. Checks run in order; the first failure aborts.
pub fn validate(fields: ExtractedFields) -> Result<Observation, OracleError> {
    let nav_upper = Decimal::from(100_000_000_000u64); // 1e11
    let ytm_lower = Decimal::from(-3);
    let ytm_upper = Decimal::from(1000);

    if fields.nav <= Decimal::ZERO {
        return Err(violation("nav_positive", format!("nav {} must be > 0", fields.nav)));
    }
    if fields.nav >= nav_upper {
        return Err(violation("nav_upper", format!("nav {} must be < 1e11", fields.nav)));
    }
    if fields.ytm <= ytm_lower {
        return Err(violation("ytm_lower", format!("ytm {} must be > -3", fields.ytm)));
    }
    if fields.ytm >= ytm_upper {
        return Err(violation("ytm_upper", format!("ytm {} must be < 1000", fields.ytm)));
    }
    if fields.as_of_date < 0 {
        return Err(violation(
            "date_non_negative",
            format!("as-of date {} predates the epoch", fields.as_of_date),
        ));
    }
    if fields.as_of_date % SECONDS_PER_DAY != 0 {
        return Err(violation(
            "date_day_aligned",
            format!("as-of date {} is not midnight UTC", fields.as_of_date),
        ));
    }

    Ok(Observation {
        ticker: fields.ticker,
        as_of_date: fields.as_of_date,
        nav: fields.nav,
        ytm: fields.ytm,
    })
}

fn violation(bound: &'static str, detail: String) -> OracleError {
    OracleError::Validation { bound, detail }
}
