use std::fmt::Write as _;
use std::sync::Arc;

use serde::Deserialize;

use super::unsplash::{format_photo_summary, Photo, UnsplashClient};
use crate::protocol::ContentBlock;
use crate::schema::{Field, InputSchema, ValidatedInput};
use crate::tool::{ToolDescriptor, ToolOutput};

pub const NAME: &str = "random_photo";

const MAX_COUNT: i64 = 30;

#[derive(Debug, Deserialize)]
struct RandomPhotoInput {
    count: i64,
    collections: Option<String>,
    topics: Option<String>,
    username: Option<String>,
    query: Option<String>,
    orientation: Option<String>,
    content_filter: Option<String>,
    featured: Option<bool>,
}

pub fn input_schema() -> InputSchema {
    InputSchema::new()
        .field(
            Field::integer("count")
                .default_value(1)
                .describe("The number of photos to return (Default: 1; Max: 30)"),
        )
        .field(
            Field::string("collections")
                .describe("Public collection ID('s) to filter selection. If multiple, comma-separated"),
        )
        .field(
            Field::string("topics")
                .describe("Public topic ID('s) to filter selection. If multiple, comma-separated"),
        )
        .field(Field::string("username").describe("Limit selection to a specific user"))
        .field(Field::string("query").describe("Limit selection to photos matching a search term"))
        .field(
            Field::string("orientation")
                .describe("Filter by photo orientation. Valid values: landscape, portrait, squarish")
                .one_of(["landscape", "portrait", "squarish"]),
        )
        .field(
            Field::string("content_filter")
                .describe("Limit results by content safety. Valid values: low, high")
                .one_of(["low", "high"]),
        )
        .field(Field::boolean("featured").describe("Limit selection to featured photos"))
}

pub fn tool(client: Arc<UnsplashClient>) -> ToolDescriptor {
    ToolDescriptor::new(
        NAME,
        "Get one or more random photos from Unsplash",
        input_schema(),
        move |input: ValidatedInput| {
            let client = Arc::clone(&client);
            async move { handle(&client, input).await }
        },
    )
}

/// Handle a `random_photo` tool call.
///
/// The API returns a single object unless `count` is sent, so `count` is
/// only sent when more than one photo is wanted.
pub async fn handle(client: &UnsplashClient, input: ValidatedInput) -> ToolOutput {
    let input: RandomPhotoInput = input.deserialize()?;
    let count = input.count.clamp(1, MAX_COUNT);
    tracing::info!(count, "getting random photos");

    let mut params: Vec<(&str, String)> = Vec::new();
    if count != 1 {
        params.push(("count", count.to_string()));
    }
    let optional = [
        ("collections", input.collections),
        ("topics", input.topics),
        ("username", input.username),
        ("query", input.query),
        ("orientation", input.orientation),
        ("content_filter", input.content_filter),
    ];
    for (name, value) in optional {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            params.push((name, value));
        }
    }
    if let Some(featured) = input.featured {
        params.push(("featured", featured.to_string()));
    }

    let photos: Vec<Photo> = if count == 1 {
        vec![client.get_json::<Photo>("/photos/random", &params).await?]
    } else {
        client.get_json("/photos/random", &params).await?
    };
    tracing::info!(count = photos.len(), "retrieved random photos");

    let mut text = format!("Random Photos ({}):\n\n", photos.len());
    for (i, photo) in photos.iter().enumerate() {
        let _ = writeln!(text, "Photo {}:", i + 1);
        text.push_str(&format_photo_summary(photo));
        let _ = writeln!(text);
    }

    Ok(vec![ContentBlock::text(text)])
}
