//! Storage backend traits.

mod records;

pub use records::RecordStore;
