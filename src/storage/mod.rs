//! Page-addressed I/O over dictionary streams.

pub mod cache;
pub mod stream;
