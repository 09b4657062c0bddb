//! Relay Core
//!
//! Core types and abstractions for the Relay agent dispatch service.
//!
//! This crate contains:
//! - Domain types: Core business entities (JobRecord, RepoPath, etc.)
//! - DTOs: Data transfer objects exchanged with callers and the remote workflow

pub mod domain;
pub mod dto;
