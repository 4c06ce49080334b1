//! Cell location caching.
//!
//! The provider resolves every visible cell through [`CellLocationCache`]
//! before considering an online lookup. The cache remembers both outcomes of
//! a lookup: cells with known coordinates and cells confirmed to have none.

mod cell_location;

pub use cell_location::{CacheLookup, CellLocationCache};
