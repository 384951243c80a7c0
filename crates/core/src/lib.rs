//! Core logic for Docgate.
//!
//! This crate has no HTTP dependencies. It owns the storage gateway and the
//! redaction session manager; the API crate only translates requests into
//! calls on these two.
//!
//! # Modules
//!
//! - `storage` - Multi-provider object operations and chunked uploads
//! - `redaction` - PDF redaction sessions over objects in storage

pub mod redaction;
pub mod storage;
