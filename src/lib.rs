//! Scrape-and-merge grade synchronization for the Sapphire community web
//! portal.
//!
//! The portal has no API, only server-rendered pages behind templated URLs
//! ([`portal`]). One run ([`sync::SyncEngine::run`]) fetches the course
//! listing, derives every grading-period page from it, fetches those
//! concurrently, parses them ([`parse`]) and merges the records into a
//! [`store::Store`] with change detection. A run is all-or-nothing: any
//! failure rolls the store back to its pre-run state.

pub mod error;
pub mod extract;
pub mod fetch;
pub mod model;
pub mod parse;
pub mod portal;
pub mod store;
pub mod sync;
