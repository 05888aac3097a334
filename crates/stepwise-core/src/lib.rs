//! Plan synthesis core: turn a free-text goal into a validated plan.
//!
//! The generative path goes through a [`generator::TextGenerator`]; any
//! failure there falls back to the local synthesizer, so callers always get
//! a well-formed [`plan::Plan`].

pub mod generator;
pub mod plan;
pub mod store;
