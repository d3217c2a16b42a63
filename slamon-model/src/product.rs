//! Products are the schedule-bearing entities being monitored.
//!
//! A product is plain configuration: when runs are scheduled, how long they
//! normally take to show up, where nodes list them and which board component
//! reports on them. Everything downstream takes a `&Product` as a parameter.

use chrono::TimeDelta;
use url::Url;

use crate::error::{ModelError, Result};

/// Default grace period after the expected latency before a missing run is
/// considered late.
pub const DEFAULT_WARNING_GRACE: TimeDelta = TimeDelta::minutes(15);
/// Default grace period after the expected latency before a missing run is
/// a significant delay.
pub const DEFAULT_ERROR_GRACE: TimeDelta = TimeDelta::hours(1);
/// Default latency from analysis time until a run is normally published.
pub const DEFAULT_EXPECTED_LATENCY: TimeDelta =
    TimeDelta::minutes(2 * 60 + 20);

/// The hours of the UTC day at which a product has a scheduled run.
///
/// Always non-empty, deduplicated and sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cadence(Vec<u32>);

impl Cadence {
    pub fn new<I>(hours: I) -> Result<Self>
    where
        I: IntoIterator<Item = u32>,
    {
        let mut hours: Vec<u32> = hours.into_iter().collect();
        if let Some(bad) = hours.iter().find(|hour| **hour > 23) {
            return Err(ModelError::invalid_input(format!(
                "cadence hour {bad} is outside 0..=23"
            )));
        }
        hours.sort_unstable();
        hours.dedup();
        if hours.is_empty() {
            return Err(ModelError::invalid_input("cadence has no hours"));
        }
        Ok(Self(hours))
    }

    /// Runs every `step` hours starting at 00 UTC.
    pub fn every(step: u32) -> Result<Self> {
        if step == 0 {
            return Err(ModelError::invalid_input("cadence step must be positive"));
        }
        Self::new((0..24).step_by(step as usize))
    }

    pub fn hours(&self) -> &[u32] {
        &self.0
    }

    /// Latest first; the schedule lookup walks the day backwards.
    pub fn hours_desc(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().rev().copied()
    }

    pub fn last_hour(&self) -> u32 {
        // Non-empty by construction.
        self.0[self.0.len() - 1]
    }

    pub fn contains(&self, hour: u32) -> bool {
        self.0.binary_search(&hour).is_ok()
    }
}

/// Immutable configuration record for one monitored product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    name: String,
    cadence: Cadence,
    expected_latency: TimeDelta,
    warning_grace: TimeDelta,
    error_grace: TimeDelta,
    component_id: String,
    catalog_url: Url,
    filename_pattern: String,
}

impl Product {
    pub fn builder(
        name: impl Into<String>,
        component_id: impl Into<String>,
    ) -> ProductBuilder {
        ProductBuilder {
            name: name.into(),
            component_id: component_id.into(),
            cadence: None,
            expected_latency: DEFAULT_EXPECTED_LATENCY,
            warning_grace: DEFAULT_WARNING_GRACE,
            error_grace: DEFAULT_ERROR_GRACE,
            catalog_url: None,
            filename_pattern: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cadence(&self) -> &Cadence {
        &self.cadence
    }

    pub fn expected_latency(&self) -> TimeDelta {
        self.expected_latency
    }

    pub fn warning_grace(&self) -> TimeDelta {
        self.warning_grace
    }

    pub fn error_grace(&self) -> TimeDelta {
        self.error_grace
    }

    pub fn component_id(&self) -> &str {
        &self.component_id
    }

    pub fn catalog_url(&self) -> &Url {
        &self.catalog_url
    }

    pub fn filename_pattern(&self) -> &str {
        &self.filename_pattern
    }

    /// Title of the one board incident managed for this product.
    pub fn incident_title(&self) -> String {
        format!("{} production", self.name)
    }
}

/// Validating builder for [`Product`].
#[derive(Debug, Clone)]
pub struct ProductBuilder {
    name: String,
    component_id: String,
    cadence: Option<Cadence>,
    expected_latency: TimeDelta,
    warning_grace: TimeDelta,
    error_grace: TimeDelta,
    catalog_url: Option<Url>,
    filename_pattern: Option<String>,
}

impl ProductBuilder {
    pub fn cadence(mut self, cadence: Cadence) -> Self {
        self.cadence = Some(cadence);
        self
    }

    pub fn expected_latency(mut self, latency: TimeDelta) -> Self {
        self.expected_latency = latency;
        self
    }

    pub fn warning_grace(mut self, grace: TimeDelta) -> Self {
        self.warning_grace = grace;
        self
    }

    pub fn error_grace(mut self, grace: TimeDelta) -> Self {
        self.error_grace = grace;
        self
    }

    pub fn catalog_url(mut self, url: Url) -> Self {
        self.catalog_url = Some(url);
        self
    }

    pub fn filename_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.filename_pattern = Some(pattern.into());
        self
    }

    pub fn build(self) -> Result<Product> {
        if self.name.trim().is_empty() {
            return Err(ModelError::invalid_input("product name is empty"));
        }
        let cadence = self.cadence.ok_or_else(|| {
            ModelError::invalid_input(format!(
                "product '{}' has no cadence",
                self.name
            ))
        })?;
        if self.expected_latency < TimeDelta::zero()
            || self.warning_grace < TimeDelta::zero()
            || self.error_grace < TimeDelta::zero()
        {
            return Err(ModelError::invalid_input(format!(
                "product '{}' has a negative latency or grace period",
                self.name
            )));
        }
        // previous() evaluates the schedule at a scheduled instant and must
        // land strictly before it.
        if self.expected_latency + self.warning_grace <= TimeDelta::zero() {
            return Err(ModelError::invalid_input(format!(
                "product '{}' must allow a positive delay before it is required",
                self.name
            )));
        }
        let catalog_url = self.catalog_url.ok_or_else(|| {
            ModelError::invalid_input(format!(
                "product '{}' has no catalog url",
                self.name
            ))
        })?;
        let filename_pattern = self.filename_pattern.ok_or_else(|| {
            ModelError::invalid_input(format!(
                "product '{}' has no filename pattern",
                self.name
            ))
        })?;

        Ok(Product {
            name: self.name,
            cadence,
            expected_latency: self.expected_latency,
            warning_grace: self.warning_grace,
            error_grace: self.error_grace,
            component_id: self.component_id,
            catalog_url,
            filename_pattern,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Url {
        Url::parse("https://thredds.example/catalog.xml").unwrap()
    }

    #[test]
    fn cadence_sorts_and_dedups() {
        let cadence = Cadence::new([18, 0, 6, 12, 6]).unwrap();
        assert_eq!(cadence.hours(), &[0, 6, 12, 18]);
        assert_eq!(cadence.hours_desc().collect::<Vec<_>>(), vec![18, 12, 6, 0]);
        assert_eq!(cadence.last_hour(), 18);
        assert!(cadence.contains(12));
        assert!(!cadence.contains(3));
    }

    #[test]
    fn cadence_rejects_empty_and_out_of_range() {
        assert!(matches!(
            Cadence::new(Vec::new()),
            Err(ModelError::InvalidInput(_))
        ));
        assert!(matches!(
            Cadence::new([0, 24]),
            Err(ModelError::InvalidInput(_))
        ));
        assert!(Cadence::every(0).is_err());
        assert_eq!(Cadence::every(3).unwrap().hours().len(), 8);
    }

    #[test]
    fn builder_requires_positive_delay() {
        let err = Product::builder("Zero", "c1")
            .cadence(Cadence::every(6).unwrap())
            .expected_latency(TimeDelta::zero())
            .warning_grace(TimeDelta::zero())
            .catalog_url(catalog())
            .filename_pattern("x_%Y%m%dT%HZ.nc")
            .build()
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidInput(_)));
    }

    #[test]
    fn incident_title_uses_name() {
        let product = Product::builder("MEPS ensemble", "6bb2dq9t7vx9")
            .cadence(Cadence::every(3).unwrap())
            .catalog_url(catalog())
            .filename_pattern("meps_%Y%m%dT%HZ.ncml")
            .build()
            .unwrap();
        assert_eq!(product.incident_title(), "MEPS ensemble production");
        assert_eq!(product.warning_grace(), DEFAULT_WARNING_GRACE);
        assert_eq!(product.error_grace(), DEFAULT_ERROR_GRACE);
    }
}
