//! Message records: types, storage, and the REST surface.

pub mod api;
pub mod store;
pub mod types;
