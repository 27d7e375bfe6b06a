//! Response cache tests.
//!
//! - semantics.rs: storage rules and lazy expiry
//! - memoize.rs: the higher-order form and its bypass flag
//! - events.rs: hit/miss listeners

mod events;
