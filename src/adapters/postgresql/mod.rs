//! PostgreSQL row source
//!
//! Templates bind `:startDate` / `:tillDate`, are prepared against the pool,
//! and stream back through [`cursor::PostgresCursor`] one row at a time.

pub mod client;
pub mod cursor;
pub mod params;
pub mod values;

pub use client::PostgresSource;
