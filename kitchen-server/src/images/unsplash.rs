use async_trait::async_trait;
use serde::Deserialize;

use super::{get_json, ImageProvider, ImageResult, ImageSearchError, ImageSearchProvider};

const SEARCH_URL: &str = "https://api.unsplash.com/search/photos";

pub struct UnsplashClient {
    client: reqwest::Client,
    access_key: Option<String>,
}

impl UnsplashClient {
    pub fn new(client: reqwest::Client, access_key: Option<String>) -> Self {
        Self { client, access_key }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    id: String,
    description: Option<String>,
    alt_description: Option<String>,
    urls: Urls,
    links: Links,
    user: Option<Photographer>,
}

#[derive(Debug, Deserialize)]
struct Urls {
    regular: String,
    small: Option<String>,
    thumb: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Links {
    html: String,
}

#[derive(Debug, Deserialize)]
struct Photographer {
    name: String,
}

fn normalize(photo: Photo) -> ImageResult {
    let description = photo.description.filter(|d| !d.trim().is_empty());
    let alt = photo.alt_description.filter(|d| !d.trim().is_empty());
    ImageResult {
        title: description
            .clone()
            .or_else(|| alt.clone())
            .unwrap_or_else(|| "Untitled".into()),
        alt_text: alt.or(description).unwrap_or_default(),
        thumbnail_url: photo
            .urls
            .small
            .or(photo.urls.thumb)
            .unwrap_or_else(|| photo.urls.regular.clone()),
        image_url: photo.urls.regular,
        link: photo.links.html,
        author: photo.user.map(|u| u.name),
        id: photo.id,
    }
}

#[async_trait]
impl ImageSearchProvider for UnsplashClient {
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ImageResult>, ImageSearchError> {
        let access_key = self
            .access_key
            .as_deref()
            .ok_or(ImageSearchError::MissingCredential {
                provider: ImageProvider::Unsplash,
                variable: "UNSPLASH_ACCESS_KEY",
            })?;
        let per_page = limit.to_string();
        let response: SearchResponse = get_json(ImageProvider::Unsplash, || {
            self.client
                .get(SEARCH_URL)
                .query(&[
                    ("query", query),
                    ("per_page", per_page.as_str()),
                    ("content_filter", "high"),
                ])
                .header("Accept-Version", "v1")
                .header("Authorization", format!("Client-ID {access_key}"))
        })
        .await?;
        Ok(response.results.into_iter().map(normalize).collect())
    }
}
