/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Record, field, and message types for ASTM E1394 content.
//!
//! This module provides:
//! - [`RecordType`]: the positional record type codes (`H`, `P`, `O`, ...)
//! - [`Field`]: a tree over the four delimiter nesting levels
//! - [`Record`]: one parsed CR-terminated record line
//! - [`Message`]: a header-to-terminator sequence of records
//!
//! Positional schemas are deliberately not enforced; records expose
//! field-by-field access and typed conversion on demand.

use crate::types::{AstmTimestamp, CR};
use bytes::Bytes;
use rust_decimal::Decimal;
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// ASTM E1394 record type code, the first field of every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// `H` - message header.
    Header,
    /// `P` - patient information.
    Patient,
    /// `O` - test order.
    Order,
    /// `R` - result.
    Result,
    /// `C` - comment.
    Comment,
    /// `Q` - request information (query).
    Query,
    /// `L` - message terminator.
    Terminator,
    /// `M` - manufacturer information.
    Manufacturer,
    /// `S` - scientific record.
    Scientific,
    /// Any other type code, kept verbatim.
    Other(char),
}

impl RecordType {
    /// Classifies a record from its leading type code byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            b'H' => Self::Header,
            b'P' => Self::Patient,
            b'O' => Self::Order,
            b'R' => Self::Result,
            b'C' => Self::Comment,
            b'Q' => Self::Query,
            b'L' => Self::Terminator,
            b'M' => Self::Manufacturer,
            b'S' => Self::Scientific,
            other => Self::Other(other as char),
        }
    }

    /// Returns the single-character type code.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::Header => 'H',
            Self::Patient => 'P',
            Self::Order => 'O',
            Self::Result => 'R',
            Self::Comment => 'C',
            Self::Query => 'Q',
            Self::Terminator => 'L',
            Self::Manufacturer => 'M',
            Self::Scientific => 'S',
            Self::Other(c) => c,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One field of a record, shaped by the delimiter nesting levels.
///
/// A field with no inner delimiters is a [`Field::Value`] leaf; repeats,
/// components, and subcomponents nest in that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// Plain text leaf, escape sequences already decoded.
    Value(String),
    /// Repeated field values, split on the repeat separator.
    Repeats(Vec<Field>),
    /// Component values, split on the component separator.
    Components(Vec<Field>),
    /// Subcomponent values, split on the subcomponent separator.
    Subcomponents(Vec<String>),
}

impl Field {
    /// Returns the text of a leaf field.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Value(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the first leaf value in document order.
    ///
    /// For a plain field this is the field text itself; for structured
    /// fields it descends into the first repeat/component/subcomponent.
    #[must_use]
    pub fn first_value(&self) -> Option<&str> {
        match self {
            Self::Value(s) => Some(s),
            Self::Repeats(fields) | Self::Components(fields) => {
                fields.first().and_then(Field::first_value)
            }
            Self::Subcomponents(parts) => parts.first().map(String::as_str),
        }
    }

    /// Returns true if the field carries no text at any level.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Value(s) => s.is_empty(),
            Self::Repeats(fields) | Self::Components(fields) => {
                fields.iter().all(Field::is_empty)
            }
            Self::Subcomponents(parts) => parts.iter().all(String::is_empty),
        }
    }

    /// Parses the first leaf value as a decimal number.
    #[must_use]
    pub fn as_decimal(&self) -> Option<Decimal> {
        self.first_value().and_then(|s| Decimal::from_str(s).ok())
    }

    /// Parses the first leaf value as an unsigned integer.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        self.first_value().and_then(|s| s.parse().ok())
    }

    /// Normalizes the first leaf value as an ASTM timestamp.
    ///
    /// Malformed values are kept raw and flagged, never dropped.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<AstmTimestamp> {
        self.first_value().map(AstmTimestamp::parse)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(s) => write!(f, "{}", s),
            Self::Repeats(fields) => {
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "\\")?;
                    }
                    write!(f, "{}", field)?;
                }
                Ok(())
            }
            Self::Components(fields) => {
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "^")?;
                    }
                    write!(f, "{}", field)?;
                }
                Ok(())
            }
            Self::Subcomponents(parts) => write!(f, "{}", parts.join("&")),
        }
    }
}

/// One parsed record: the type code, the field tree, and the raw line.
///
/// The raw bytes are kept alongside the tree so that messages can be dumped
/// exactly as received even when individual fields fail typed conversion.
#[derive(Debug, Clone)]
pub struct Record {
    /// The record type code.
    pub record_type: RecordType,
    /// Parsed fields; index 0 is the type code field.
    pub fields: SmallVec<[Field; 16]>,
    /// The raw record line, CR stripped.
    pub raw: Bytes,
}

impl Record {
    /// Returns the field at `index`, if present.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Returns the first leaf value of the field at `index`.
    #[must_use]
    pub fn field_str(&self, index: usize) -> Option<&str> {
        self.fields.get(index).and_then(Field::first_value)
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A complete ASTM message: an `H`-to-`L` sequence of records.
#[derive(Debug, Clone)]
pub struct Message {
    records: Vec<Record>,
}

impl Message {
    /// Index of the sender name field within the header record.
    const HEADER_SENDER_FIELD: usize = 4;

    /// Creates a message from its parsed records.
    ///
    /// The session layer guarantees the header-to-terminator shape; this
    /// constructor does not re-check it.
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Returns the records of this message.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the message has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the instrument sender name from the header record, if set.
    ///
    /// See E1394 section 6, Header Record: field 5 names the sender.
    #[must_use]
    pub fn sender_name(&self) -> Option<&str> {
        let header = self.records.first()?;
        if header.record_type != RecordType::Header {
            return None;
        }
        header
            .field(Self::HEADER_SENDER_FIELD)
            .and_then(Field::first_value)
            .filter(|name| !name.is_empty())
    }

    /// Renders the message as transport-stripped text: each raw record
    /// followed by CR.
    #[must_use]
    pub fn to_text(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            self.records.iter().map(|r| r.raw.len() + 1).sum(),
        );
        for record in &self.records {
            out.extend_from_slice(&record.raw);
            out.push(CR);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_record(record_type: RecordType, values: &[&str], raw: &[u8]) -> Record {
        Record {
            record_type,
            fields: values.iter().map(|v| Field::Value((*v).to_string())).collect(),
            raw: Bytes::copy_from_slice(raw),
        }
    }

    #[test]
    fn test_record_type_from_byte() {
        assert_eq!(RecordType::from_byte(b'H'), RecordType::Header);
        assert_eq!(RecordType::from_byte(b'L'), RecordType::Terminator);
        assert_eq!(RecordType::from_byte(b'R'), RecordType::Result);
        assert_eq!(RecordType::from_byte(b'X'), RecordType::Other('X'));
        assert_eq!(RecordType::from_byte(b'X').code(), 'X');
    }

    #[test]
    fn test_field_first_value() {
        let leaf = Field::Value("glucose".to_string());
        assert_eq!(leaf.first_value(), Some("glucose"));

        let nested = Field::Repeats(vec![
            Field::Components(vec![
                Field::Value("LDL".to_string()),
                Field::Value("mg/dL".to_string()),
            ]),
            Field::Value("HDL".to_string()),
        ]);
        assert_eq!(nested.first_value(), Some("LDL"));

        let subs = Field::Subcomponents(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(subs.first_value(), Some("a"));
    }

    #[test]
    fn test_field_typed_access() {
        assert_eq!(
            Field::Value("12.5".to_string()).as_decimal(),
            Some(Decimal::from_str("12.5").unwrap())
        );
        assert_eq!(Field::Value("42".to_string()).as_u64(), Some(42));
        assert_eq!(Field::Value("abc".to_string()).as_u64(), None);

        let ts = Field::Value("20240117143055".to_string())
            .as_timestamp()
            .unwrap();
        assert!(!ts.is_malformed());

        let bad = Field::Value("20249917".to_string()).as_timestamp().unwrap();
        assert!(bad.is_malformed());
    }

    #[test]
    fn test_field_is_empty() {
        assert!(Field::Value(String::new()).is_empty());
        assert!(Field::Components(vec![Field::Value(String::new())]).is_empty());
        assert!(!Field::Value("x".to_string()).is_empty());
    }

    #[test]
    fn test_message_sender_name() {
        let header = leaf_record(
            RecordType::Header,
            &["H", "|\\^&", "", "", "cobas", ""],
            b"H|\\^&|||cobas|",
        );
        let term = leaf_record(RecordType::Terminator, &["L", "1", "N"], b"L|1|N");
        let msg = Message::new(vec![header, term]);
        assert_eq!(msg.sender_name(), Some("cobas"));
    }

    #[test]
    fn test_message_sender_name_absent() {
        let header = leaf_record(RecordType::Header, &["H", "|\\^&", "", "", ""], b"H|\\^&|||");
        let msg = Message::new(vec![header]);
        assert_eq!(msg.sender_name(), None);
    }

    #[test]
    fn test_message_to_text() {
        let header = leaf_record(RecordType::Header, &["H"], b"H|\\^&");
        let term = leaf_record(RecordType::Terminator, &["L"], b"L|1|N");
        let msg = Message::new(vec![header, term]);
        assert_eq!(msg.to_text(), b"H|\\^&\rL|1|N\r");
    }
}
