//! # lrukit
//!
//! Fixed-capacity, in-memory LRU cache.
//!
//! ## Architecture
//! - **HashMap**: AHash index from key to arena slot (O(1))
//! - **LRU List**: Index-linked doubly-linked list over the arena (O(1))
//! - **Locators**: Generation-stamped [`EntryRef`]s that detect eviction
//! - **Sharing**: [`SharedLruCache`] wraps the cache in a single lock
//!
//! ```
//! use lrukit::{Error, LruCache};
//!
//! let mut cache = LruCache::new(2)?;
//! cache.insert(1, "test1");
//! cache.insert(2, "test2");
//! let two = cache.get_ref(&2).unwrap();
//! cache.insert(1, "test1");
//! cache.insert(3, "test3"); // evicts 2
//!
//! assert_eq!(cache.get(&1), Some(&"test1"));
//! assert_eq!(cache.get(&2), None);
//! assert_eq!(cache.resolve(two), Err(Error::StaleReference));
//! # Ok::<(), Error>(())
//! ```

#![warn(missing_docs)]

mod error;
mod lru;
mod shared;
mod stats;

pub use error::{Error, Result};
pub use lru::{EntryRef, Iter, LruCache};
pub use shared::SharedLruCache;
pub use stats::{CacheStats, StatsSnapshot};
