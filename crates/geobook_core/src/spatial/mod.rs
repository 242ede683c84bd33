//! Distance search over stored locations.
//!
//! # Responsibility
//! - Provide the optional SQL spatial extension used by the first tier.
//! - Run tiered distance search that degrades instead of failing.
//!
//! # Invariants
//! - Only the outcome of the last attempted tier is observable to callers.
//! - A degraded (unfiltered) result is always flagged as such.

pub mod distance;
pub mod extension;
pub mod search;
