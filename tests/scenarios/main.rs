//! Scenario-based tests for matrix runs

mod helpers;

mod concurrency;
mod continue_on_error;
mod expansion;
mod provisioning;
mod reporting;
