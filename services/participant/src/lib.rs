//! Participant node plumbing: configuration, the dataset boundary, the
//! coordinator channel and the per-round session loop. The learning pipeline
//! itself lives in `fedmaint-core`.

pub mod config;
pub mod connection;
pub mod data;
pub mod protocol;
pub mod session;
