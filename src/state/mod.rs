//! State module for tracking qualification task progress
//!
//! Every qualification link moves through a small, linear state machine while it
//! is fetched, parsed, and assembled. Failure is terminal; nothing is retried.

mod task_state;

pub use task_state::QualificationState;
