/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Record line parser.
//!
//! Splits a raw record into the four E1394 nesting levels: fields, repeats,
//! components, and subcomponents. The escape introducer is recognized only
//! inside text: the sequences `&F&`, `&R&`, `&S&`, and `&E&` decode to the
//! literal field, repeat, component, and escape bytes; any other occurrence
//! of the escape byte acts as a subcomponent separator.

use astmgate_core::{Delimiters, Field, Record, RecordType};
use bytes::Bytes;
use smallvec::SmallVec;

/// Parses one raw record line (CR already stripped) into a [`Record`].
///
/// The header record's delimiter definition field is kept verbatim; it
/// defines the separators and must not be split by them.
///
/// # Arguments
/// * `raw` - The record bytes, transport framing and CR removed
/// * `delimiters` - The session delimiter set
#[must_use]
pub fn parse_record(raw: &[u8], delimiters: &Delimiters) -> Record {
    let record_type = RecordType::from_byte(raw.first().copied().unwrap_or(b' '));

    let mut fields: SmallVec<[Field; 16]> = SmallVec::new();
    for (index, field) in raw.split(|&b| b == delimiters.field).enumerate() {
        if record_type == RecordType::Header && index == 1 {
            // Delimiter definition field, e.g. `\^&`.
            fields.push(Field::Value(lossy(field)));
        } else {
            fields.push(parse_field(field, delimiters));
        }
    }

    Record {
        record_type,
        fields,
        raw: Bytes::copy_from_slice(raw),
    }
}

fn parse_field(bytes: &[u8], delimiters: &Delimiters) -> Field {
    let repeats: Vec<&[u8]> = bytes.split(|&b| b == delimiters.repeat).collect();
    if repeats.len() > 1 {
        Field::Repeats(
            repeats
                .into_iter()
                .map(|r| parse_repeat(r, delimiters))
                .collect(),
        )
    } else {
        parse_repeat(bytes, delimiters)
    }
}

fn parse_repeat(bytes: &[u8], delimiters: &Delimiters) -> Field {
    let components: Vec<&[u8]> = bytes.split(|&b| b == delimiters.component).collect();
    if components.len() > 1 {
        Field::Components(
            components
                .into_iter()
                .map(|c| parse_component(c, delimiters))
                .collect(),
        )
    } else {
        parse_component(bytes, delimiters)
    }
}

fn parse_component(bytes: &[u8], delimiters: &Delimiters) -> Field {
    let parts = split_subcomponents(bytes, delimiters.escape);
    if parts.len() > 1 {
        Field::Subcomponents(parts.into_iter().map(|p| unescape(p, delimiters)).collect())
    } else {
        Field::Value(unescape(bytes, delimiters))
    }
}

#[inline]
fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Splits on escape-byte occurrences that do not open a recognized escape
/// sequence.
fn split_subcomponents<'a>(bytes: &'a [u8], escape: u8) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == escape {
            if is_escape_sequence(bytes, i, escape) {
                i += 3;
                continue;
            }
            parts.push(&bytes[start..i]);
            start = i + 1;
        }
        i += 1;
    }
    parts.push(&bytes[start..]);
    parts
}

#[inline]
fn is_escape_sequence(bytes: &[u8], i: usize, escape: u8) -> bool {
    i + 2 < bytes.len()
        && bytes[i + 2] == escape
        && matches!(bytes[i + 1], b'F' | b'R' | b'S' | b'E')
}

/// Decodes delimiter escapes; unrecognized sequences pass through literally.
fn unescape(bytes: &[u8], delimiters: &Delimiters) -> String {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == delimiters.escape && is_escape_sequence(bytes, i, delimiters.escape) {
            out.push(match bytes[i + 1] {
                b'F' => delimiters.field,
                b'R' => delimiters.repeat,
                b'S' => delimiters.component,
                _ => delimiters.escape,
            });
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
