//! Core domain models
//!
//! This module defines the matrix, job and step data structures, the
//! workflow configuration they are loaded from and the outcome types a run
//! produces.

pub mod axis;
pub mod config;
pub mod context;
pub mod error;
pub mod job;
pub mod outcome;
pub mod pipeline;
pub mod state;
pub mod step;

pub use axis::*;
pub use context::*;
pub use error::*;
pub use job::*;
pub use outcome::*;
pub use pipeline::*;
pub use state::*;
pub use step::*;
