//! Remote object storage

pub mod s3;
pub mod traits;

pub use s3::S3BlobStore;
pub use traits::BlobStore;
