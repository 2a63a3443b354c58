// validity.rs — Timestamps, validity intervals and the <validity> condition.
//
// On the wire a validity condition is a flat list of alternating <from> and
// <until> elements. Parsing pairs them two at a time in document order; a
// pair that is not exactly (from, until) with two valid timestamps is dropped
// with a debug log, as is a trailing unpaired element. Building in code and
// serializing are strict: a validity condition without intervals fails
// `check_validity`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::document::NAMESPACE;
use crate::element::Element;
use crate::error::{PolicyError, PolicyResult};
use crate::field::{self, FieldDef, FieldLocation, FieldType, FieldValue, Fields};
use crate::xml::{QName, XmlNode, XmlWriter};

/// An instant with the UTC offset it was written with.
///
/// Ordering and equality compare the instant, so `10:00:00+02:00` equals
/// `08:00:00Z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<FixedOffset>);

impl Timestamp {
    pub fn as_datetime(&self) -> &DateTime<FixedOffset> {
        &self.0
    }

    pub fn to_utc(&self) -> DateTime<Utc> {
        self.0.with_timezone(&Utc)
    }
}

impl FromStr for Timestamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DateTime::parse_from_rfc3339(s).map(Timestamp)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl From<DateTime<FixedOffset>> for Timestamp {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Timestamp(value)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Timestamp(value.fixed_offset())
    }
}

/// One <from> or <until> element.
#[derive(Debug, Default)]
struct Bound {
    value: Option<Timestamp>,
}

fn get_bound(bound: &Bound) -> Option<FieldValue> {
    bound.value.map(FieldValue::Timestamp)
}

fn set_bound(bound: &mut Bound, value: Option<FieldValue>) -> Option<FieldValue> {
    std::mem::replace(&mut bound.value, value.and_then(FieldValue::into_timestamp))
        .map(FieldValue::Timestamp)
}

impl Fields for Bound {
    const ELEMENT: &'static str = "from/until";
    const FIELDS: &'static [FieldDef<Self>] = &[FieldDef {
        name: "timestamp",
        namespace: "",
        wire_name: "",
        location: FieldLocation::Text,
        value_type: FieldType::Timestamp,
        required: true,
        test_equal: true,
        get: get_bound,
        set: set_bound,
        onset: None,
    }];
}

impl Bound {
    fn parse(node: &XmlNode) -> PolicyResult<Timestamp> {
        let mut bound = Bound::default();
        field::parse_fields(&mut bound, node)?;
        bound
            .value
            .ok_or_else(|| PolicyError::validation(Self::ELEMENT, "missing timestamp"))
    }

    fn write(value: Timestamp, writer: &mut XmlWriter, name: &QName) -> PolicyResult<()> {
        field::write_fields(&Bound { value: Some(value) }, writer, name)
    }
}

/// A time window, written as a <from>/<until> pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityInterval {
    from: Timestamp,
    until: Timestamp,
}

impl ValidityInterval {
    pub fn new(from: impl Into<Timestamp>, until: impl Into<Timestamp>) -> Self {
        Self {
            from: from.into(),
            until: until.into(),
        }
    }

    /// Build an interval from two RFC 3339 strings.
    pub fn parse(from: &str, until: &str) -> PolicyResult<Self> {
        let from = FieldType::Timestamp
            .coerce("from", from.into())?
            .into_timestamp();
        let until = FieldType::Timestamp
            .coerce("until", until.into())?
            .into_timestamp();
        match (from, until) {
            (Some(from), Some(until)) => Ok(Self { from, until }),
            _ => Err(PolicyError::validation("validity", "interval bounds must be timestamps")),
        }
    }

    pub fn from(&self) -> Timestamp {
        self.from
    }

    pub fn until(&self) -> Timestamp {
        self.until
    }

    pub fn set_from(&mut self, from: impl Into<Timestamp>) {
        self.from = from.into();
    }

    pub fn set_until(&mut self, until: impl Into<Timestamp>) {
        self.until = until.into();
    }

    /// Whether `at` falls inside the window (`from <= at < until`).
    pub fn contains(&self, at: impl Into<Timestamp>) -> bool {
        let at = at.into();
        self.from <= at && at < self.until
    }
}

/// The <validity> condition: one or more intervals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validity {
    intervals: Vec<ValidityInterval>,
}

impl Validity {
    pub fn new(intervals: impl IntoIterator<Item = ValidityInterval>) -> Self {
        Self {
            intervals: intervals.into_iter().collect(),
        }
    }

    pub fn add(&mut self, interval: ValidityInterval) {
        self.intervals.push(interval);
    }

    /// Remove the interval starting at `from`.
    pub fn remove(&mut self, from: impl Into<Timestamp>) -> Option<ValidityInterval> {
        let from = from.into();
        let index = self.intervals.iter().position(|interval| interval.from == from)?;
        Some(self.intervals.remove(index))
    }

    /// The interval starting at `from`.
    pub fn get(&self, from: impl Into<Timestamp>) -> Option<&ValidityInterval> {
        let from = from.into();
        self.intervals.iter().find(|interval| interval.from == from)
    }

    /// Replace the intervals.
    pub fn update(&mut self, intervals: impl IntoIterator<Item = ValidityInterval>) {
        self.intervals = intervals.into_iter().collect();
    }

    pub fn clear(&mut self) {
        self.intervals.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidityInterval> {
        self.intervals.iter()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Whether any interval contains `at`.
    pub fn contains(&self, at: impl Into<Timestamp>) -> bool {
        let at = at.into();
        self.intervals.iter().any(|interval| interval.contains(at))
    }
}

impl<'a> IntoIterator for &'a Validity {
    type Item = &'a ValidityInterval;
    type IntoIter = std::slice::Iter<'a, ValidityInterval>;

    fn into_iter(self) -> Self::IntoIter {
        self.intervals.iter()
    }
}

fn pair(first: &XmlNode, second: Option<&XmlNode>) -> Option<ValidityInterval> {
    let Some(second) = second else {
        tracing::debug!(element = %first.name, "dropping unpaired validity element");
        return None;
    };
    if !first.name.is(NAMESPACE, "from") || !second.name.is(NAMESPACE, "until") {
        tracing::debug!(
            first = %first.name,
            second = %second.name,
            "dropping validity pair that is not from/until"
        );
        return None;
    }
    match (Bound::parse(first), Bound::parse(second)) {
        (Ok(from), Ok(until)) => Some(ValidityInterval { from, until }),
        (Err(err), _) | (_, Err(err)) => {
            tracing::debug!(error = %err, "dropping validity pair with a bad timestamp");
            None
        }
    }
}

impl Element for Validity {
    const NAMESPACE: &'static str = NAMESPACE;
    const TAG: &'static str = "validity";

    fn from_node(node: &XmlNode) -> PolicyResult<Self> {
        let intervals = node
            .children
            .chunks(2)
            .filter_map(|chunk| pair(&chunk[0], chunk.get(1)))
            .collect();
        Ok(Self { intervals })
    }

    fn write(&self, writer: &mut XmlWriter) -> PolicyResult<()> {
        self.check_validity()?;
        writer.start(&Self::qname(), &[])?;
        let from = QName::new(NAMESPACE, "from");
        let until = QName::new(NAMESPACE, "until");
        for interval in &self.intervals {
            Bound::write(interval.from, writer, &from)?;
            Bound::write(interval.until, writer, &until)?;
        }
        writer.end()
    }

    fn check_validity(&self) -> PolicyResult<()> {
        if self.intervals.is_empty() {
            return Err(PolicyError::validation(
                Self::TAG,
                "at least one from/until interval is required",
            ));
        }
        Ok(())
    }
}
