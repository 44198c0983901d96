pub mod actions;
pub mod store;

pub use store::{RESERVED_ROOT, StateStore, StoreError};
