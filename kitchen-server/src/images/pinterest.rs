use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::{get_json, ImageProvider, ImageResult, ImageSearchError, ImageSearchProvider};

const SEARCH_URL: &str = "https://api.pinterest.com/v5/search/pins";

pub struct PinterestClient {
    client: reqwest::Client,
    access_token: Option<String>,
}

impl PinterestClient {
    pub fn new(client: reqwest::Client, access_token: Option<String>) -> Self {
        Self {
            client,
            access_token,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Pin>,
}

#[derive(Debug, Deserialize)]
struct Pin {
    id: String,
    title: Option<String>,
    description: Option<String>,
    alt_text: Option<String>,
    link: Option<String>,
    media: Option<Media>,
    board_owner: Option<BoardOwner>,
}

#[derive(Debug, Deserialize)]
struct Media {
    #[serde(default)]
    images: HashMap<String, PinImage>,
}

#[derive(Debug, Deserialize)]
struct PinImage {
    url: String,
    #[serde(default)]
    width: u32,
}

#[derive(Debug, Deserialize)]
struct BoardOwner {
    username: String,
}

/// Pins come in several renditions; the widest is the image and the narrowest the thumbnail.
/// Pins without any image are dropped.
fn normalize(pin: Pin) -> Option<ImageResult> {
    let images = pin.media.map(|m| m.images).unwrap_or_default();
    let largest = images.values().max_by_key(|i| i.width)?;
    let smallest = images.values().min_by_key(|i| i.width)?;
    let title = [&pin.title, &pin.description]
        .into_iter()
        .flatten()
        .find(|t| !t.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| "Untitled".into());
    Some(ImageResult {
        image_url: largest.url.clone(),
        thumbnail_url: smallest.url.clone(),
        link: pin
            .link
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| format!("https://www.pinterest.com/pin/{}/", pin.id)),
        alt_text: pin
            .alt_text
            .or(pin.description)
            .unwrap_or_default(),
        author: pin.board_owner.map(|o| o.username),
        title,
        id: pin.id,
    })
}

#[async_trait]
impl ImageSearchProvider for PinterestClient {
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ImageResult>, ImageSearchError> {
        let token = self
            .access_token
            .as_deref()
            .ok_or(ImageSearchError::MissingCredential {
                provider: ImageProvider::Pinterest,
                variable: "PINTEREST_ACCESS_TOKEN",
            })?;
        let page_size = limit.to_string();
        let response: SearchResponse = get_json(ImageProvider::Pinterest, || {
            self.client
                .get(SEARCH_URL)
                .query(&[("query", query), ("page_size", page_size.as_str())])
                .bearer_auth(token)
        })
        .await?;
        Ok(response
            .items
            .into_iter()
            .filter_map(normalize)
            .take(limit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pins_are_normalized() {
        let response: SearchResponse = serde_json::from_str(
            r#"{
                "items": [
                    {
                        "id": "813744226",
                        "title": "",
                        "description": "Easy weeknight ramen",
                        "alt_text": null,
                        "link": "https://example.com/ramen",
                        "media": {
                            "media_type": "image",
                            "images": {
                                "150x150": { "url": "https://i.pinimg.com/150x150/a.jpg", "width": 150, "height": 150 },
                                "600x": { "url": "https://i.pinimg.com/600x/a.jpg", "width": 600, "height": 900 },
                                "1200x": { "url": "https://i.pinimg.com/1200x/a.jpg", "width": 1200, "height": 1800 }
                            }
                        },
                        "board_owner": { "username": "noodlefan" }
                    },
                    { "id": "2", "title": "Video only", "media": { "media_type": "video" } },
                    {
                        "id": "3",
                        "title": "Dumplings",
                        "alt_text": "steamed dumplings",
                        "link": null,
                        "media": { "images": { "600x": { "url": "https://i.pinimg.com/600x/c.jpg", "width": 600 } } }
                    }
                ],
                "bookmark": null
            }"#,
        )
        .unwrap();
        let results = response
            .items
            .into_iter()
            .filter_map(normalize)
            .collect::<Vec<_>>();

        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0],
            ImageResult {
                id: "813744226".into(),
                title: "Easy weeknight ramen".into(),
                image_url: "https://i.pinimg.com/1200x/a.jpg".into(),
                thumbnail_url: "https://i.pinimg.com/150x150/a.jpg".into(),
                link: "https://example.com/ramen".into(),
                alt_text: "Easy weeknight ramen".into(),
                author: Some("noodlefan".into()),
            }
        );
        assert_eq!(results[1].link, "https://www.pinterest.com/pin/3/");
        assert_eq!(results[1].image_url, results[1].thumbnail_url);
        assert_eq!(results[1].alt_text, "steamed dumplings");
    }
}
