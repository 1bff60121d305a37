//! Integration tests for the Shotforge orchestration core

mod orchestrator_images;
mod pack_properties;
mod support;
