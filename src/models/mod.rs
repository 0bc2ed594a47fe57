//! Data models for the iTop REST API.
//!
//! This module contains the response envelope classification, the
//! per-class record model, operation descriptors and status codes.

mod operation;
mod record;
mod response;
mod status;

pub use operation::*;
pub use record::*;
pub use response::*;
pub use status::*;
