//! Schedule model: which run a product is required to have published by a
//! given instant, and when a missing run becomes critically late.
//!
//! Everything here is pure arithmetic on UTC instants. Inputs of any
//! [`TimeZone`] are accepted and normalised to UTC; textual instants must
//! carry an explicit offset (see [`parse_instant`]).

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use slamon_model::{ModelError, Product, Publication};

/// Schedule view over one product.
#[derive(Debug, Clone, Copy)]
pub struct Schedule<'a> {
    product: &'a Product,
}

impl<'a> Schedule<'a> {
    pub fn of(product: &'a Product) -> Self {
        Self { product }
    }

    /// Most recent scheduled run whose expected latency plus warning grace has
    /// elapsed at `now`.
    ///
    /// The cadence hours are projected onto the calendar day of the cutoff
    /// (`now - expected_latency - warning_grace`) and the latest one at or
    /// before the cutoff wins. When none qualifies, the last run of the
    /// previous day is required.
    pub fn required<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Publication {
        let cutoff = now.with_timezone(&Utc)
            - self.product.expected_latency()
            - self.product.warning_grace();
        let day = cutoff.date_naive();

        for hour in self.product.cadence().hours_desc() {
            let candidate = at_hour(day, hour);
            if cutoff >= candidate {
                return Publication::new(candidate);
            }
        }

        let yesterday = (cutoff - TimeDelta::days(1)).date_naive();
        Publication::new(at_hour(yesterday, self.product.cadence().last_hour()))
    }

    /// The scheduled run immediately before `required`.
    ///
    /// Evaluating the schedule at a scheduled instant never yields that same
    /// instant because products are validated to have a positive
    /// `expected_latency + warning_grace`.
    pub fn previous(&self, required: Publication) -> Publication {
        self.required(&required.timestamp())
    }

    /// Whether `required` is still missing past its error grace at `now`.
    pub fn is_critically_late<Tz: TimeZone>(
        &self,
        required: Publication,
        now: &DateTime<Tz>,
    ) -> bool {
        required.timestamp()
            + self.product.expected_latency()
            + self.product.error_grace()
            <= now.with_timezone(&Utc)
    }
}

fn at_hour(day: NaiveDate, hour: u32) -> DateTime<Utc> {
    (day.and_time(NaiveTime::MIN) + TimeDelta::hours(i64::from(hour))).and_utc()
}

/// Parses an RFC 3339 instant. Instants without an explicit offset are
/// ambiguous and rejected.
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>, ModelError> {
    let trimmed = value.trim();
    match DateTime::parse_from_rfc3339(trimmed) {
        Ok(instant) => Ok(instant.with_timezone(&Utc)),
        Err(err) => {
            let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S"));
            if naive.is_ok() {
                Err(ModelError::invalid_input(format!(
                    "instant '{trimmed}' has no UTC offset"
                )))
            } else {
                Err(ModelError::invalid_input(format!(
                    "instant '{trimmed}' is not RFC 3339: {err}"
                )))
            }
        }
    }
}
