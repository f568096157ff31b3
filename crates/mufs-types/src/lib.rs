//! Shared value types for mufs.
//!
//! This crate holds the plain values every filesystem backend agrees on. It has
//! **no internal mufs dependencies** and performs no I/O: parsing and comparing
//! resource addresses, permission arithmetic, and the catalogue of optional
//! operations a backend may advertise.
//!
//! # Key Types
//!
//! |---------------------|----------------------------------------------------|
//! | Type                | Purpose                                            |
//! |---------------------|----------------------------------------------------|
//! | [`FileUrl`]         | Parsed, normalized address of any resource         |
//! | [`Credentials`]     | Login + password carried by a URL                  |
//! | [`PermissionBits`]  | owner/group/other × read/write/execute bitmask     |
//! | [`FilePermissions`] | Bits plus the mask of bits that carry information  |
//! | [`FileOperation`]   | One optional, capability-gated operation           |
//! | [`Capabilities`]    | Set of operations a file object supports           |
//! |---------------------|----------------------------------------------------|

mod credentials;
mod error;
mod operation;
mod permissions;
mod url;

pub use credentials::Credentials;
pub use error::UrlError;
pub use operation::{Capabilities, FileOperation};
pub use permissions::{AccessClass, FilePermissions, PermissionBits, Right};
pub use url::{FILE_SCHEME, FileUrl, LOCALHOST, standard_port};
