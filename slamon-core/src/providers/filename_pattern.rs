//! strftime-style dataset filename patterns.
//!
//! Only the fields needed to name a model run are understood: `%Y`, `%m`,
//! `%d`, `%H` and `%M`, plus `%%` for a literal percent sign. Everything else
//! in the pattern must match literally.

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use slamon_model::Publication;

use crate::ports::CatalogError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Year,
    Month,
    Day,
    Hour,
    Minute,
}

impl Field {
    fn from_directive(directive: char) -> Option<Self> {
        match directive {
            'Y' => Some(Self::Year),
            'm' => Some(Self::Month),
            'd' => Some(Self::Day),
            'H' => Some(Self::Hour),
            'M' => Some(Self::Minute),
            _ => None,
        }
    }

    fn width(self) -> usize {
        match self {
            Self::Year => 4,
            _ => 2,
        }
    }
}

/// A compiled filename pattern, e.g. `meps_det_2_5km_%Y%m%dT%HZ.ncml`.
#[derive(Debug, Clone)]
pub struct FilenamePattern {
    source: String,
    regex: Regex,
    fields: Vec<Field>,
}

impl FilenamePattern {
    pub fn compile(pattern: &str) -> Result<Self, CatalogError> {
        let invalid = |reason: String| CatalogError::Pattern {
            pattern: pattern.to_string(),
            reason,
        };

        let mut expression = String::from("^");
        let mut literal = String::new();
        let mut fields = Vec::new();
        let mut chars = pattern.chars();

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            match chars.next() {
                Some('%') => literal.push('%'),
                Some(directive) => {
                    let field = Field::from_directive(directive).ok_or_else(|| {
                        invalid(format!("unsupported directive %{directive}"))
                    })?;
                    if fields.contains(&field) {
                        return Err(invalid(format!("%{directive} appears twice")));
                    }
                    expression.push_str(&regex::escape(&literal));
                    literal.clear();
                    expression.push_str(&format!("(\\d{{{}}})", field.width()));
                    fields.push(field);
                }
                None => return Err(invalid("trailing %".to_string())),
            }
        }
        expression.push_str(&regex::escape(&literal));
        expression.push('$');

        for required in [Field::Year, Field::Month, Field::Day] {
            if !fields.contains(&required) {
                return Err(invalid(
                    "a run needs at least %Y, %m and %d".to_string(),
                ));
            }
        }

        let regex =
            Regex::new(&expression).map_err(|err| invalid(err.to_string()))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
            fields,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The run a dataset name denotes, if it matches the pattern and names a
    /// real date and time. Missing hour or minute default to zero.
    pub fn parse(&self, name: &str) -> Option<Publication> {
        let captures = self.regex.captures(name)?;
        let (mut year, mut month, mut day, mut hour, mut minute) = (0, 0, 0, 0, 0);
        for (index, field) in self.fields.iter().enumerate() {
            let value: u32 = captures.get(index + 1)?.as_str().parse().ok()?;
            match field {
                Field::Year => year = value,
                Field::Month => month = value,
                Field::Day => day = value,
                Field::Hour => hour = value,
                Field::Minute => minute = value,
            }
        }

        let date = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)?;
        let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
        Some(Publication::new(date.and_time(time).and_utc()))
    }

    /// Newest run among `names`.
    pub fn latest<'a, I>(&self, names: I) -> Option<Publication>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names.into_iter().filter_map(|name| self.parse(name)).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::utc;

    #[test]
    fn parses_model_run_names() {
        let pattern = FilenamePattern::compile("meps_det_2_5km_%Y%m%dT%HZ.ncml").unwrap();
        assert_eq!(
            pattern.parse("meps_det_2_5km_20240301T09Z.ncml"),
            Some(Publication::new(utc(2024, 3, 1, 9, 0)))
        );
        assert_eq!(pattern.parse("meps_det_2_5km_20240301T09Z.nc"), None);
        assert_eq!(pattern.parse("xmeps_det_2_5km_20240301T09Z.ncml"), None);
        assert_eq!(pattern.parse("meps_det_2_5km_2024031T09Z.ncml"), None);
    }

    #[test]
    fn dots_in_the_pattern_are_literal() {
        let pattern = FilenamePattern::compile("run_%Y%m%dT%HZ.nc").unwrap();
        assert_eq!(pattern.parse("run_20240301T09Zxnc"), None);
    }

    #[test]
    fn impossible_dates_do_not_match() {
        let pattern = FilenamePattern::compile("run_%Y%m%dT%H%M").unwrap();
        assert_eq!(pattern.parse("run_20240230T0900"), None);
        assert_eq!(pattern.parse("run_20240301T2500"), None);
        assert_eq!(
            pattern.parse("run_20240301T0930"),
            Some(Publication::new(utc(2024, 3, 1, 9, 30)))
        );
    }

    #[test]
    fn fields_may_appear_in_any_order() {
        let pattern = FilenamePattern::compile("%H-%d.%m.%Y%%").unwrap();
        assert_eq!(
            pattern.parse("06-02.03.2024%"),
            Some(Publication::new(utc(2024, 3, 2, 6, 0)))
        );
    }

    #[test]
    fn rejects_unusable_patterns() {
        for bad in ["run_%Y%m%dT%S", "run_%Y%m", "run_%Y%m%d%", "%Y%Y%m%d"] {
            assert!(
                matches!(
                    FilenamePattern::compile(bad),
                    Err(CatalogError::Pattern { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn latest_picks_the_newest_match() {
        let pattern = FilenamePattern::compile("run_%Y%m%dT%HZ.nc").unwrap();
        let names = [
            "run_20240301T06Z.nc",
            "unrelated.nc",
            "run_20240301T12Z.nc",
            "run_20240228T18Z.nc",
        ];
        assert_eq!(
            pattern.latest(names),
            Some(Publication::new(utc(2024, 3, 1, 12, 0)))
        );
        assert_eq!(pattern.latest(["unrelated.nc"]), None);
    }
}
