//! `saaskit-auth` — pure authorization boundary (zero-trust).
//!
//! This crate is intentionally decoupled from HTTP and storage: it holds the
//! request-local identity, the permission node model, the tree builder and
//! the path/method matcher. No IO happens here; loading and caching live in
//! `saaskit-infra`.

pub mod identity;
pub mod matcher;
pub mod permission;
pub mod tree;

pub use identity::Identity;
pub use matcher::{Method, authorize};
pub use permission::PermissionNode;
pub use tree::{build_tree, flatten, prune_hidden};
