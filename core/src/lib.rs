// Core knowledge base chat functionality:
// - Chat session controller and transcript
// - Bedrock RetrieveAndGenerate client and request signing
// - Configuration loading and validation
// - Shared error types

// Export session module - Transcript and request/response cycle
pub mod session;
pub use session::*;

// Export client module - API client for the knowledge base service
pub mod client;
pub use client::*;

// Export types module - Turns and wire structures
pub mod types;
pub use types::*;

// Export config module - Configuration loading
pub mod config;
pub use config::*;

// Export errors module - Shared error types
pub mod errors;
pub use errors::*;

pub mod prompt;
pub mod sigv4;
