//! Event conductor: runs an event as a sequence of timed phases, grouped into
//! queues or loops, driven by a one-second tick and operator commands, with
//! progress persisted so a restart resumes where it left off.

pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod phase;
pub mod routes;
pub mod services;
pub mod state;
pub mod world;
