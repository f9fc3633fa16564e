/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # AstmGate Records
//!
//! ASTM E1394 record parsing.
//!
//! This crate lifts raw CR-terminated record lines into the [`Record`] tree
//! of `astmgate-core`, using the delimiter set discovered from the session's
//! header record. Parsing never fails: structure that cannot be interpreted
//! degrades to plain text leaves, and typed access (timestamps, decimals)
//! happens on demand at the field level.

pub mod parser;

pub use astmgate_core::{Delimiters, Field, Record, RecordType};
pub use parser::parse_record;
