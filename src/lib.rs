//! Serverless trivia party game core.
//!
//! Independent clients coordinate one room through a shared mutable
//! document store with push notifications; there is no arbitrating server
//! process. This crate implements the per-room protocol each client runs:
//! the room state machine, turn rotation, answer collection and scoring,
//! and the deadline scheduler that auto-advances expired phases.

pub mod client;
pub mod clock;
pub mod config;
pub mod dto;
pub mod error;
pub mod services;
pub mod state;
pub mod store;
