use std::fmt::Write as _;
use std::sync::Arc;

use serde::Deserialize;

use super::unsplash::{format_photo_summary, SearchResponse, UnsplashClient};
use crate::protocol::ContentBlock;
use crate::schema::{Field, InputSchema, ValidatedInput};
use crate::tool::{ToolDescriptor, ToolOutput};

pub const NAME: &str = "search_photos";

const MAX_PER_PAGE: i64 = 30;

#[derive(Debug, Deserialize)]
struct SearchPhotosInput {
    query: String,
    page: i64,
    per_page: i64,
    order_by: String,
    color: Option<String>,
    orientation: Option<String>,
}

pub fn input_schema() -> InputSchema {
    InputSchema::new()
        .field(Field::string("query").required().describe("Search keyword"))
        .field(
            Field::integer("page")
                .default_value(1)
                .describe("Page number (1-based)"),
        )
        .field(
            Field::integer("per_page")
                .default_value(10)
                .describe("Results per page (1-30)"),
        )
        .field(
            Field::string("order_by")
                .default_value("relevant")
                .describe("Sort method (relevant or latest)")
                .one_of(["relevant", "latest"]),
        )
        .field(
            Field::string("color")
                .describe("Color filter (black_and_white, black, white, yellow, orange, red, purple, magenta, green, teal, blue)")
                .one_of([
                    "black_and_white", "black", "white", "yellow", "orange", "red", "purple",
                    "magenta", "green", "teal", "blue",
                ]),
        )
        .field(
            Field::string("orientation")
                .describe("Orientation filter (landscape, portrait, squarish)")
                .one_of(["landscape", "portrait", "squarish"]),
        )
}

pub fn tool(client: Arc<UnsplashClient>) -> ToolDescriptor {
    ToolDescriptor::new(
        NAME,
        "Search for Unsplash photos",
        input_schema(),
        move |input: ValidatedInput| {
            let client = Arc::clone(&client);
            async move { handle(&client, input).await }
        },
    )
}

/// Handle a `search_photos` tool call.
pub async fn handle(client: &UnsplashClient, input: ValidatedInput) -> ToolOutput {
    let input: SearchPhotosInput = input.deserialize()?;
    tracing::info!(query = %input.query, "searching photos");

    let page = input.page.max(1);
    let per_page = input.per_page.clamp(1, MAX_PER_PAGE);

    let mut params = vec![
        ("query", input.query),
        ("page", page.to_string()),
        ("per_page", per_page.to_string()),
        ("order_by", input.order_by),
    ];
    if let Some(color) = input.color.filter(|c| !c.is_empty()) {
        params.push(("color", color));
    }
    if let Some(orientation) = input.orientation.filter(|o| !o.is_empty()) {
        params.push(("orientation", orientation));
    }

    let response: SearchResponse = client.get_json("/search/photos", &params).await?;
    tracing::info!(count = response.results.len(), "search returned photos");

    let mut text = format!(
        "Found {} photos (Page {}/{}):\n\n",
        response.results.len(),
        page,
        response.total_pages
    );
    for photo in &response.results {
        text.push_str(&format_photo_summary(photo));
        let _ = writeln!(text);
    }

    Ok(vec![ContentBlock::text(text)])
}
