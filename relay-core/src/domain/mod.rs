//! Core domain types
//!
//! This module contains the core domain structures used across Relay crates.
//! These types represent the fundamental business entities and are shared between
//! the orchestrator (which owns and mutates them) and its clients (which read them).

pub mod job;
pub mod repo;
