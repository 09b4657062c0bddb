//! Data Transfer Objects
//!
//! This module contains DTOs exchanged over HTTP: requests and responses of
//! the orchestrator API, the terminal callback body, and the completion
//! webhook sent by the remote workflow.

pub mod health;
pub mod job;
pub mod webhook;
