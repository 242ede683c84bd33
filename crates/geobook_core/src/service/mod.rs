//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repositories, the asset store and image processing into
//!   the operations callers invoke.
//! - Keep callers decoupled from storage paths and fallback tiers.

pub mod media_service;
pub mod spatial_entity_service;
