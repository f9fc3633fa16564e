/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # AstmGate Transport
//!
//! Network transport layer for the ASTM gateway.
//!
//! Provides [`AstmWireCodec`], a Tokio codec that feeds the incremental
//! frame decoder from a TCP stream. Malformed frames are yielded as regular
//! items, not errors: the session layer answers them with NAK instead of
//! dropping the connection.

pub mod codec;

pub use codec::AstmWireCodec;
