//! Utility functions

pub mod natural_sort;
pub mod path_security;

pub use natural_sort::natural_cmp;
pub use path_security::{UnsafePath, enforce_child_path};
