//! Integration tests for the harvesting pipeline
//!
//! These tests use wiremock to stand in for remote sites (robots.txt plus
//! documents) and drive [`tidepool::Pipeline`] end to end.

mod common;
mod compliance_tests;
mod pipeline_tests;
