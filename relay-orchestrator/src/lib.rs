//! Relay orchestrator
//!
//! Forks a repository, dispatches the agent workflow against the fork, polls
//! the run to completion and reports the outcome to the caller.

pub mod api;
pub mod config;
pub mod gateway;
pub mod repository;
pub mod service;
