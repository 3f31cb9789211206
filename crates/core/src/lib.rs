//! Dropzone domain logic.
//!
//! Everything here is synchronous and free of network access: reading
//! workbooks, mapping rows to manifest records through a declarative
//! layout, writing batch files, tracking conversion history, and exporting
//! retention schedules.

pub mod convert;
pub mod error;
pub mod hashing;
pub mod layout;
pub mod manifest;
pub mod registry;
pub mod retention;
pub mod transform;
pub mod workbook;
