#![deny(missing_docs)]
//! `OpenSloth` core library.
//!
//! Shared logic for the spreadsheet agent: configuration, LLM provider
//! adapters, the Google Sheets client and the tool-calling loop.

/// Agent logic and tools.
pub mod agent;
/// Configuration management.
pub mod config;
/// LLM providers.
pub mod llm;
/// Google Sheets client.
pub mod sheets;
/// Utility functions.
pub mod utils;
