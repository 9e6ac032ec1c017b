//! Cache inspection tools.
//!
//! - `cache_keys`: list stores with their entry counts
//! - `cache_get`: read back one stored entry

pub mod get;
pub mod keys;
