/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # AstmGate Dispatch
//!
//! Delivery of completed ASTM messages to their consumers.
//!
//! Two sinks are provided:
//! - [`FileSink`]: append-only message dumps, one file per message, written
//!   atomically (write-then-rename)
//! - [`HttpSink`]: JSON push to a LIS endpoint with basic authentication
//!   and fixed-delay retry
//!
//! The [`Dispatcher`] fans each message out to every configured sink
//! independently; a failing sink is logged and never blocks the others or
//! the instrument session.

pub mod dispatcher;
pub mod file;
pub mod http;
pub mod traits;

pub use dispatcher::Dispatcher;
pub use file::FileSink;
pub use http::HttpSink;
pub use traits::MessageSink;
