//! Fixed-size kernel headers and attribute IDs.

pub mod addr;
pub mod link;
