//! Hosted language model access and the analysis prompts.

pub mod client;
pub mod prompt;

pub use client::{HostedModel, ModelClient, Provider};
