//! Shared test helpers for cvp-enhance integration tests

#![allow(dead_code)]

pub mod audio_generator;
pub mod mock_models;
