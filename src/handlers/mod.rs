//! Unsplash-backed tools.
//!
//! Each tool module declares its input schema and a handler that receives
//! already-validated input. Request construction, response decoding and text
//! formatting all live here, behind the `ToolHandler` boundary.

pub mod get_photo;
pub mod random_photo;
pub mod search_photos;
pub mod unsplash;

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::registry::ToolRegistry;
use crate::server::ServerError;

use self::unsplash::UnsplashClient;

/// Build the registry holding the fixed tool set.
pub fn default_registry(config: &ServerConfig) -> Result<ToolRegistry, ServerError> {
    let client = Arc::new(UnsplashClient::new(config)?);

    let mut registry = ToolRegistry::new();
    registry.register(search_photos::tool(Arc::clone(&client)))?;
    registry.register(get_photo::tool(Arc::clone(&client)))?;
    registry.register(random_photo::tool(client))?;
    Ok(registry)
}
