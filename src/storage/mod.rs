//! Object storage clients.
//!
//! The [`backend::ObjectStore`] trait is the capability set the round-trip
//! check needs from a blob service.  [`s3::S3ObjectStore`] talks to the
//! bound S3-compatible endpoint; [`memory::MemoryObjectStore`] keeps
//! objects in process.

pub mod backend;
pub mod memory;
pub mod s3;
