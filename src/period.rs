//! Active-period selection inside a nested planetary-period tree.
//!
//! Period lists arrive from an external chart document with raw string
//! timestamps. The selector normalizes them to one reference zone, drops
//! periods that ended before birth, and picks the one containing the
//! reference instant, falling back deterministically when none does.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Keys under which a period's nested sub-periods may appear.
const CHILD_KEYS: &[&str] = &["antardasha", "pratyantardasha", "children", "periods"];

/// Offset-carrying timestamp layouts tried after RFC 3339.
const AWARE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
];

/// Wall-clock layouts, read in the selector's reference zone.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("malformed timestamp '{0}'")]
    MalformedInput(String),
}

/// One node of the period tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodNode {
    pub name: String,
    /// Raw timestamp as supplied; parsed only during selection.
    pub start: String,
    pub end: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PeriodNode>,
}

impl PeriodNode {
    pub fn new(name: impl Into<String>, start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: start.into(),
            end: end.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<PeriodNode>) -> Self {
        self.children = children;
        self
    }

    /// Build a node from a chart-document object. Missing fields become
    /// empty strings so the entry is kept but never matches an interval.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let text = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let children = CHILD_KEYS
            .iter()
            .find_map(|k| obj.get(*k))
            .and_then(Self::list_from_value)
            .unwrap_or_default();

        Some(Self {
            name: text("name"),
            start: text("start"),
            end: text("end"),
            children,
        })
    }

    /// Build a period list from a chart-document value.
    ///
    /// Returns `None` when the value is not an array at all; non-object
    /// array entries are dropped.
    pub fn list_from_value(value: &Value) -> Option<Vec<Self>> {
        value
            .as_array()
            .map(|items| items.iter().filter_map(Self::from_value).collect())
    }
}

/// Picks the active period of one sibling list.
#[derive(Debug, Clone, Copy)]
pub struct PeriodSelector {
    zone: Tz,
}

impl Default for PeriodSelector {
    fn default() -> Self {
        Self::utc()
    }
}

impl PeriodSelector {
    pub fn utc() -> Self {
        Self { zone: chrono_tz::UTC }
    }

    /// Read naive timestamps as wall-clock time in `zone`.
    pub fn in_zone(zone: Tz) -> Self {
        Self { zone }
    }

    /// Parse a timestamp into an absolute instant.
    ///
    /// Aware timestamps keep their own offset; naive ones are read in the
    /// selector's zone. A bare date means midnight.
    pub fn normalize(&self, raw: &str) -> Result<DateTime<Utc>, PeriodError> {
        let s = raw.trim();
        let malformed = || PeriodError::MalformedInput(raw.to_string());
        if s.is_empty() {
            return Err(malformed());
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }
        for fmt in AWARE_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
                return Ok(dt.with_timezone(&Utc));
            }
        }

        let naive = NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
            .ok_or_else(malformed)?;

        self.zone
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(malformed)
    }

    /// Select the active period at `reference`.
    ///
    /// 1. Entries whose start or end cannot be parsed are skipped.
    /// 2. With a birth instant, periods ending strictly before it are dropped.
    /// 3. The first remaining period (input order) containing `reference`,
    ///    both ends inclusive, wins.
    /// 4. Otherwise the remaining period with the earliest start wins.
    /// 5. If the birth filter dropped every parseable period, the first
    ///    input entry is returned as-is.
    ///
    /// Returns `None` for empty input or when no entry parses at all.
    pub fn select<'a>(
        &self,
        periods: &'a [PeriodNode],
        reference: DateTime<Utc>,
        birth: Option<DateTime<Utc>>,
    ) -> Option<&'a PeriodNode> {
        let parsed: Vec<(usize, DateTime<Utc>, DateTime<Utc>)> = periods
            .iter()
            .enumerate()
            .filter_map(|(i, p)| match (self.normalize(&p.start), self.normalize(&p.end)) {
                (Ok(start), Ok(end)) => Some((i, start, end)),
                (Err(e), _) | (_, Err(e)) => {
                    debug!(period = %p.name, error = %e, "skipping period");
                    None
                }
            })
            .collect();

        if parsed.is_empty() {
            return None;
        }

        let candidates: Vec<_> = parsed
            .into_iter()
            .filter(|(_, _, end)| birth.map_or(true, |b| *end >= b))
            .collect();

        if candidates.is_empty() {
            return periods.first();
        }

        if let Some((i, _, _)) = candidates
            .iter()
            .find(|(_, start, end)| *start <= reference && reference <= *end)
        {
            return Some(&periods[*i]);
        }

        candidates
            .iter()
            .min_by_key(|(i, start, _)| (*start, *i))
            .map(|(i, _, _)| &periods[*i])
    }
}

/// Select with the default UTC reference zone.
pub fn select_active<'a>(
    periods: &'a [PeriodNode],
    reference: DateTime<Utc>,
    birth: Option<DateTime<Utc>>,
) -> Option<&'a PeriodNode> {
    PeriodSelector::default().select(periods, reference, birth)
}
