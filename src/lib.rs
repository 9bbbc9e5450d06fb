//! Word acquisition for a vocabulary screensaver.
//!
//! [`lookup::WordLookup`] serves words from an expiring LRU [`cache::WordCache`]
//! and falls through to a [`dispatcher::Dispatcher`] that picks among several
//! translation providers by preference, credentials and remaining quota.

pub mod cache;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod lookup;
pub mod models;
pub mod providers;
pub mod settings;

pub use cache::WordCache;
pub use dispatcher::Dispatcher;
pub use error::{TranslationError, TranslationResult};
pub use lookup::WordLookup;
pub use models::{ProviderId, Word};
