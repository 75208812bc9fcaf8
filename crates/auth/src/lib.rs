//! `travel-auth`: identity of the acting principal, as consumed by persistence.
//!
//! Authentication itself happens elsewhere; this crate only exposes who is
//! acting so audit fields can be stamped.

pub mod current_user;

pub use current_user::{CurrentUser, SYSTEM_USER, StaticCurrentUser};
