//! External system integrations for Tidemark.
//!
//! - [`source`] - Row source and cursor traits, reusable row buffer
//! - [`postgresql`] - PostgreSQL row source
//! - [`blob`] - Remote object storage (S3 and compatible services)
//!
//! The core only sees the [`source::RowSource`] and [`blob::BlobStore`]
//! traits, so both boundaries can be replaced with in-memory doubles.

pub mod blob;
pub mod postgresql;
pub mod source;
