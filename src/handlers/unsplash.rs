//! Unsplash API client, response types and text formatting.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::ServerConfig;
use crate::tool::ToolError;

const MISSING_KEY: &str = "Missing UNSPLASH_ACCESS_KEY environment variable";

/// URL sizes shown first, in this order; any others follow alphabetically.
const PREFERRED_SIZES: [&str; 4] = ["small", "regular", "full", "raw"];

pub struct UnsplashClient {
    http: reqwest::Client,
    base_url: String,
    access_key: Option<String>,
}

impl UnsplashClient {
    pub fn new(config: &ServerConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.clone(),
            access_key: config.access_key.clone(),
        })
    }

    /// GET `endpoint` with query `params` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, ToolError> {
        let access_key = self.access_key.as_deref().ok_or_else(|| {
            tracing::error!("{MISSING_KEY}");
            ToolError::new(MISSING_KEY)
        })?;

        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!(url = %url, "unsplash request");

        let response = self
            .http
            .get(&url)
            .query(params)
            .header("Accept-Version", "v1")
            .header("Authorization", format!("Client-ID {access_key}"))
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            tracing::warn!(
                status = status.as_u16(),
                body = %String::from_utf8_lossy(&body),
                "unsplash API error"
            );
            return Err(ToolError::new(format!(
                "unsplash API error: status code {}",
                status.as_u16()
            )));
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Photo {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub alt_description: Option<String>,
    #[serde(default)]
    pub urls: BTreeMap<String, String>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub downloads: Option<u64>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub exif: Option<Exif>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Location {
    pub name: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Exif {
    pub make: Option<String>,
    pub model: Option<String>,
    pub exposure_time: Option<String>,
    pub aperture: Option<String>,
    pub focal_length: Option<String>,
    pub iso: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    pub name: String,
    pub username: String,
    pub portfolio_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tag {
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<Photo>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub total_pages: u64,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// URLs in display order: preferred sizes first, then the rest.
fn ordered_urls(urls: &BTreeMap<String, String>) -> Vec<(&str, &str)> {
    let mut ordered: Vec<(&str, &str)> = PREFERRED_SIZES
        .iter()
        .filter_map(|size| urls.get(*size).map(|url| (*size, url.as_str())))
        .collect();
    ordered.extend(
        urls.iter()
            .filter(|(size, _)| !PREFERRED_SIZES.contains(&size.as_str()))
            .map(|(size, url)| (size.as_str(), url.as_str())),
    );
    ordered
}

/// Short listing entry used by search and random results.
pub fn format_photo_summary(photo: &Photo) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "- ID: {}", photo.id);
    let description =
        non_empty(&photo.description).or_else(|| non_empty(&photo.alt_description));
    if let Some(desc) = description {
        let _ = writeln!(out, "  Description: {desc}");
    }
    let _ = writeln!(out, "  Size: {}x{}", photo.width, photo.height);
    out.push_str("  URLs:\n");
    for (size, url) in ordered_urls(&photo.urls) {
        let _ = writeln!(out, "    {size}: {url}");
    }
    out
}

pub fn format_photo_details(photo: &Photo) -> String {
    let mut out = String::from("Photo Details:\n\n");
    let _ = writeln!(out, "- ID: {}", photo.id);
    if let Some(desc) = non_empty(&photo.description) {
        let _ = writeln!(out, "- Description: {desc}");
    }
    if let Some(alt) = non_empty(&photo.alt_description) {
        let _ = writeln!(out, "- Alt Description: {alt}");
    }
    let _ = writeln!(out, "- Size: {}x{}", photo.width, photo.height);
    let _ = writeln!(out, "- Likes: {}", photo.likes);
    if let Some(downloads) = photo.downloads {
        let _ = writeln!(out, "- Downloads: {downloads}");
    }

    if let Some(user) = &photo.user {
        out.push_str("\nPhotographer:\n");
        let _ = writeln!(out, "- Name: {}", user.name);
        let _ = writeln!(out, "- Username: @{}", user.username);
        if let Some(portfolio) = non_empty(&user.portfolio_url) {
            let _ = writeln!(out, "- Portfolio: {portfolio}");
        }
    }

    if let Some(location) = &photo.location {
        let lines: Vec<(&str, &str)> = [
            ("Name", non_empty(&location.name)),
            ("City", non_empty(&location.city)),
            ("Country", non_empty(&location.country)),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.map(|v| (label, v)))
        .collect();

        if !lines.is_empty() {
            out.push_str("\nLocation:\n");
            for (label, value) in lines {
                let _ = writeln!(out, "- {label}: {value}");
            }
        }
    }

    if let Some(exif) = &photo.exif {
        let mut lines: Vec<(&str, String)> = [
            ("Camera Make", non_empty(&exif.make)),
            ("Camera Model", non_empty(&exif.model)),
            ("Exposure Time", non_empty(&exif.exposure_time)),
            ("Aperture", non_empty(&exif.aperture)),
            ("Focal Length", non_empty(&exif.focal_length)),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.map(|v| (label, v.to_string())))
        .collect();
        if let Some(iso) = exif.iso.filter(|iso| *iso > 0) {
            lines.push(("ISO", iso.to_string()));
        }

        if !lines.is_empty() {
            out.push_str("\nCamera Info:\n");
            for (label, value) in lines {
                let _ = writeln!(out, "- {label}: {value}");
            }
        }
    }

    out.push_str("\nURLs:\n");
    for (size, url) in ordered_urls(&photo.urls) {
        let _ = writeln!(out, "- {size}: {url}");
    }

    if !photo.tags.is_empty() {
        out.push_str("\nTags:\n");
        for tag in &photo.tags {
            let _ = writeln!(out, "- {}", tag.title);
        }
    }

    out
}
