//! Internal helpers for filesystem locations, URL escaping, and serde shapes.

pub(crate) mod paths;
pub(crate) mod query;
pub(crate) mod serde;
