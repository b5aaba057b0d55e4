use std::sync::Arc;

use super::unsplash::{format_photo_details, Photo, UnsplashClient};
use crate::protocol::ContentBlock;
use crate::schema::{Field, InputSchema, ValidatedInput};
use crate::tool::{ToolDescriptor, ToolError, ToolOutput};

pub const NAME: &str = "get_photo";

pub fn input_schema() -> InputSchema {
    InputSchema::new().field(
        Field::string("photoId")
            .required()
            .describe("The photo ID to retrieve"),
    )
}

pub fn tool(client: Arc<UnsplashClient>) -> ToolDescriptor {
    ToolDescriptor::new(
        NAME,
        "Get detailed information about a specific Unsplash photo",
        input_schema(),
        move |input: ValidatedInput| {
            let client = Arc::clone(&client);
            async move { handle(&client, input).await }
        },
    )
}

/// Handle a `get_photo` tool call.
pub async fn handle(client: &UnsplashClient, input: ValidatedInput) -> ToolOutput {
    let photo_id = input
        .get_str("photoId")
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ToolError::new("missing or empty required parameter: photoId"))?;
    tracing::info!(photo_id, "getting photo details");

    let endpoint = format!("/photos/{}", urlencoding::encode(photo_id));
    let photo: Photo = client.get_json(&endpoint, &[]).await?;

    Ok(vec![ContentBlock::text(format_photo_details(&photo))])
}
