//! tyr-api service library crate.
//!
//! # Purpose
//! Exposes the REST API surface, authentication, configuration, storage and
//! receipt analysis pipeline for use by the binary and tests.
pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod model;
pub mod observability;
pub mod ocr;
pub mod store;
