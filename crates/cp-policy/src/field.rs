// field.rs — Declarative field descriptors and the shared binding routine.
//
// Every element type with scalar content (attributes or text) declares a
// static table of `FieldDef` records. The functions in this module are the
// only code that moves values between those fields and the wire: parsing,
// writing, required-field checks and structural equality are all driven by
// the table, so an element type only supplies accessors and, where needed,
// an onset hook.
//
// Onset hooks run after the new value is stored and before the previous
// value is dropped. `IdentityExcept` uses them to keep `id` and `domain`
// mutually exclusive.

use std::fmt;

use crate::error::{PolicyError, PolicyResult};
use crate::validity::Timestamp;
use crate::xml::{QName, XmlNode, XmlWriter};

/// Where a field lives on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLocation {
    /// An attribute.
    Attribute,
    /// The text content of the element.
    Text,
}

/// The semantic type a field value is coerced to on assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Timestamp,
}

/// A field value after coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Timestamp(Timestamp),
}

impl FieldValue {
    pub fn into_text(self) -> Option<String> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::Timestamp(_) => None,
        }
    }

    pub fn into_timestamp(self) -> Option<Timestamp> {
        match self {
            FieldValue::Timestamp(ts) => Some(ts),
            FieldValue::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Timestamp(ts) => write!(f, "{}", ts),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Timestamp> for FieldValue {
    fn from(value: Timestamp) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for FieldValue {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        FieldValue::Timestamp(value.into())
    }
}

impl From<chrono::DateTime<chrono::FixedOffset>> for FieldValue {
    fn from(value: chrono::DateTime<chrono::FixedOffset>) -> Self {
        FieldValue::Timestamp(value.into())
    }
}

impl FieldType {
    /// Coerce a raw value to this type. Strings are parsed as RFC 3339 for
    /// timestamp fields; a timestamp is never silently turned into text.
    pub fn coerce(self, field: &str, value: FieldValue) -> PolicyResult<FieldValue> {
        match (self, value) {
            (FieldType::Text, value @ FieldValue::Text(_)) => Ok(value),
            (FieldType::Timestamp, value @ FieldValue::Timestamp(_)) => Ok(value),
            (FieldType::Timestamp, FieldValue::Text(raw)) => raw
                .trim()
                .parse::<Timestamp>()
                .map(FieldValue::Timestamp)
                .map_err(|err| PolicyError::Type {
                    field: field.to_string(),
                    expected: "timestamp",
                    reason: format!("'{}': {}", raw, err),
                }),
            (FieldType::Text, FieldValue::Timestamp(ts)) => Err(PolicyError::Type {
                field: field.to_string(),
                expected: "string",
                reason: format!("got timestamp {}", ts),
            }),
        }
    }
}

/// Descriptor for one field of element type `E`.
pub struct FieldDef<E: 'static> {
    /// Name used in error messages.
    pub name: &'static str,
    /// Namespace of the wire attribute (empty for none). Ignored for text.
    pub namespace: &'static str,
    /// Local name of the wire attribute. Ignored for text.
    pub wire_name: &'static str,
    pub location: FieldLocation,
    pub value_type: FieldType,
    pub required: bool,
    /// Whether the field takes part in structural equality.
    pub test_equal: bool,
    pub get: fn(&E) -> Option<FieldValue>,
    /// Store a value (already coerced) and hand back the previous one.
    pub set: fn(&mut E, Option<FieldValue>) -> Option<FieldValue>,
    pub onset: Option<fn(&mut E, Option<&FieldValue>)>,
}

/// Element types described by a field table.
pub trait Fields: Sized + 'static {
    /// Element name used in error messages.
    const ELEMENT: &'static str;
    const FIELDS: &'static [FieldDef<Self>];
}

/// Store an already-typed value, then run the onset hook.
pub fn store<E: Fields>(element: &mut E, field: &FieldDef<E>, value: Option<FieldValue>) {
    let previous = (field.set)(element, value);
    if let Some(onset) = field.onset {
        let current = (field.get)(element);
        onset(element, current.as_ref());
    }
    drop(previous);
}

/// Coerce and store a value. Type errors leave the field untouched.
pub fn assign<E: Fields>(
    element: &mut E,
    field: &FieldDef<E>,
    value: Option<FieldValue>,
) -> PolicyResult<()> {
    let value = value
        .map(|value| field.value_type.coerce(field.name, value))
        .transpose()?;
    store(element, field, value);
    Ok(())
}

/// Populate every declared field from a parsed element.
pub fn parse_fields<E: Fields>(element: &mut E, node: &XmlNode) -> PolicyResult<()> {
    for field in E::FIELDS {
        let raw = match field.location {
            FieldLocation::Attribute => node
                .attribute(field.namespace, field.wire_name)
                .map(str::to_string),
            // An empty element carries empty text, which a string field keeps
            // as a value; only a typed field treats it as absent.
            FieldLocation::Text => match field.value_type {
                FieldType::Text => Some(node.text.clone()),
                FieldType::Timestamp => Some(node.text.clone()).filter(|text| !text.is_empty()),
            },
        };
        match raw {
            Some(raw) => assign(element, field, Some(FieldValue::Text(raw)))?,
            None if field.required => return Err(missing(E::ELEMENT, field)),
            None => {}
        }
    }
    Ok(())
}

/// Wire attributes derived from the current field values.
pub fn attributes<E: Fields>(element: &E) -> Vec<(QName, String)> {
    E::FIELDS
        .iter()
        .filter(|field| field.location != FieldLocation::Text)
        .filter_map(|field| {
            (field.get)(element)
                .map(|value| (QName::new(field.namespace, field.wire_name), value.to_string()))
        })
        .collect()
}

/// Wire text derived from the text field, if the element declares one.
pub fn text<E: Fields>(element: &E) -> Option<String> {
    E::FIELDS
        .iter()
        .find(|field| field.location == FieldLocation::Text)
        .and_then(|field| (field.get)(element))
        .map(|value| value.to_string())
}

/// Write a leaf element whose attributes and text come from its fields.
pub fn write_fields<E: Fields>(element: &E, writer: &mut XmlWriter, name: &QName) -> PolicyResult<()> {
    check_required(element)?;
    let body = text(element).unwrap_or_default();
    writer.text_element(name, &attributes(element), &body)
}

/// Fail if a required field has no value.
pub fn check_required<E: Fields>(element: &E) -> PolicyResult<()> {
    match E::FIELDS
        .iter()
        .find(|field| field.required && (field.get)(element).is_none())
    {
        Some(field) => Err(missing(E::ELEMENT, field)),
        None => Ok(()),
    }
}

/// Compare the equality-participating fields of two elements.
pub fn fields_equal<E: Fields>(a: &E, b: &E) -> bool {
    E::FIELDS
        .iter()
        .filter(|field| field.test_equal)
        .all(|field| (field.get)(a) == (field.get)(b))
}

fn missing<E: 'static>(tag: &str, field: &FieldDef<E>) -> PolicyError {
    let what = match field.location {
        FieldLocation::Text => "text content".to_string(),
        FieldLocation::Attribute => format!("attribute '{}'", field.wire_name),
    };
    PolicyError::validation(tag, format!("missing required {}", what))
}

/// Generate the get/set accessor pair for an `Option<String>` field.
macro_rules! text_slot {
    ($get:ident, $set:ident, $ty:ty, $field:ident) => {
        fn $get(element: &$ty) -> Option<$crate::field::FieldValue> {
            element
                .$field
                .clone()
                .map($crate::field::FieldValue::Text)
        }

        fn $set(
            element: &mut $ty,
            value: Option<$crate::field::FieldValue>,
        ) -> Option<$crate::field::FieldValue> {
            std::mem::replace(
                &mut element.$field,
                value.and_then($crate::field::FieldValue::into_text),
            )
            .map($crate::field::FieldValue::Text)
        }
    };
}
pub(crate) use text_slot;
