//! HTTP access to the PLATiNA::ARCHiVE web service.

pub mod client;

pub use client::{ArchiveClient, ClientVersion};
