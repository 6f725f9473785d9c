#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]
#![doc = include_str!("../README.md")]

mod error;
pub use error::{ErrorData, ToolCallError};

/// JSON-RPC and MCP wire types
pub mod model;
pub mod service;
pub use service::{
    ClientInitializeError, Diagnostics, McpClient, McpClientConfig, ProgressHandler,
};

pub mod generation;
pub use generation::{GeneratedImage, GenerationError, GenerationRequest, TattooGenerator};

pub mod transport;

// re-export
pub use serde_json;
