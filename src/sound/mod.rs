//! # Sound Module
//!
//! The pool of sounds the scheduler draws from, and the catalog that fills it.
//!
//! ### [`pool`] - Sound Pool
//! - Eligible sound ids, swapped wholesale on every refresh
//! - Uniform random selection that never observes a partial swap
//!
//! ### [`catalog`] - Sound Catalog
//! - Fetches the guild's custom sounds and, optionally, Discord's defaults
//! - Applies the exclusion list and installs the result in the pool
//! - Caches the default list after the first successful fetch

pub mod catalog;
pub mod pool;

pub use catalog::{CatalogFilter, SoundCatalog};
pub use pool::SoundPool;
