//! MCP server for Unsplash photo search.
//!
//! Exposes `search_photos`, `get_photo`, and `random_photo` tools over
//! JSON-RPC 2.0 stdio transport, compatible with any MCP-aware AI agent.

pub mod config;
pub mod handlers;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod tool;
pub mod transport;

pub mod schema;
