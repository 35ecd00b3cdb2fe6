//! Image search through third-party providers.
//!
//! The server holds the provider credentials; clients only ever see normalized
//! [`ImageResult`]s.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio_retry::Retry;

use crate::{
    cache::{CacheQuery, CacheValue, KitchenCache},
    config::ImagesConfig,
    errors::WebError,
};

pub mod pinterest;
pub mod unsplash;

pub const DEFAULT_LIMIT: usize = 12;
pub const MAX_LIMIT: usize = 30;

/// The result count actually requested from a provider.
pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ImageProvider {
    Unsplash,
    Pinterest,
}

/// One search hit, the same shape whichever provider it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResult {
    pub id: String,
    pub title: String,
    pub image_url: String,
    pub thumbnail_url: String,
    /// The page the image lives on at the provider.
    pub link: String,
    pub alt_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ImageSearchError {
    #[error("{provider} search is not configured: set {variable}")]
    MissingCredential {
        provider: ImageProvider,
        variable: &'static str,
    },
    #[error("{provider} search failed with status {status}")]
    Provider {
        provider: ImageProvider,
        status: u16,
        details: serde_json::Value,
    },
    #[error("{provider} request failed: {source}")]
    Request {
        provider: ImageProvider,
        #[source]
        source: reqwest::Error,
    },
}

impl From<ImageSearchError> for WebError {
    fn from(e: ImageSearchError) -> Self {
        let message = e.to_string();
        match e {
            ImageSearchError::MissingCredential { .. } => WebError::Misconfigured(message),
            ImageSearchError::Provider {
                status, details, ..
            } => WebError::ExternalApi {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                message,
                details,
            },
            ImageSearchError::Request { source, .. } => WebError::ExternalApi {
                status: StatusCode::BAD_GATEWAY,
                message,
                details: serde_json::Value::String(source.to_string()),
            },
        }
    }
}

#[async_trait]
pub trait ImageSearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize)
        -> Result<Vec<ImageResult>, ImageSearchError>;
}

fn default_retry() -> impl Iterator<Item = Duration> {
    tokio_retry::strategy::ExponentialBackoff::from_millis(100)
        .map(tokio_retry::strategy::jitter)
        .take(3)
}

/// Send a request built by `request` and decode the JSON reply.
///
/// Connection failures are retried; an error status is returned as is, with the
/// provider's JSON error body (if any) as details.
async fn get_json<T: DeserializeOwned>(
    provider: ImageProvider,
    request: impl Fn() -> reqwest::RequestBuilder,
) -> Result<T, ImageSearchError> {
    let response = Retry::spawn(default_retry(), || request().send())
        .await
        .map_err(|source| ImageSearchError::Request { provider, source })?;
    let status = response.status();
    if !status.is_success() {
        let details = response
            .json::<serde_json::Value>()
            .await
            .unwrap_or(serde_json::Value::Null);
        tracing::warn!(%provider, %status, "Image search rejected");
        return Err(ImageSearchError::Provider {
            provider,
            status: status.as_u16(),
            details,
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|source| ImageSearchError::Request { provider, source })
}

/// Both providers behind one cache.
#[derive(Clone)]
pub struct ImageSearch {
    unsplash: Arc<dyn ImageSearchProvider>,
    pinterest: Arc<dyn ImageSearchProvider>,
    cache: KitchenCache,
}

impl ImageSearch {
    pub fn from_config(conf: &ImagesConfig, cache: KitchenCache) -> Self {
        let client = reqwest::Client::new();
        Self::with_providers(
            Arc::new(unsplash::UnsplashClient::new(
                client.clone(),
                conf.unsplash_key(),
            )),
            Arc::new(pinterest::PinterestClient::new(
                client,
                conf.pinterest_token(),
            )),
            cache,
        )
    }

    pub fn with_providers(
        unsplash: Arc<dyn ImageSearchProvider>,
        pinterest: Arc<dyn ImageSearchProvider>,
        cache: KitchenCache,
    ) -> Self {
        Self {
            unsplash,
            pinterest,
            cache,
        }
    }

    /// Search one provider. A blank query finds nothing without asking the provider.
    pub async fn search(
        &self,
        provider: ImageProvider,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ImageResult>, ImageSearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(vec![]);
        }
        let limit = clamp_limit(limit);
        let key = CacheQuery::ImageSearch {
            provider,
            query: query.to_lowercase(),
            limit,
        };
        match self.cache.get_value_or_guard_async(&key).await {
            Ok(CacheValue::ImageResults { results }) => Ok(results),
            Ok(_) => unreachable!(),
            Err(guard) => {
                let source = match provider {
                    ImageProvider::Unsplash => &self.unsplash,
                    ImageProvider::Pinterest => &self.pinterest,
                };
                let results = source.search(query, limit).await?;
                tracing::debug!(%provider, query, count = results.len(), "Image search");
                guard
                    .insert(CacheValue::ImageResults {
                        results: results.clone(),
                    })
                    .unwrap_or_default();
                Ok(results)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::response::IntoResponse;
    use serde_json::json;

    use super::*;
    use crate::cache::new_cache;

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
        last_limit: AtomicUsize,
    }

    #[async_trait]
    impl ImageSearchProvider for Counting {
        async fn search(
            &self,
            query: &str,
            limit: usize,
        ) -> Result<Vec<ImageResult>, ImageSearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.last_limit.store(limit, Ordering::SeqCst);
            Ok(vec![ImageResult {
                id: "1".into(),
                title: query.into(),
                image_url: "https://img/1.jpg".into(),
                thumbnail_url: "https://img/1-small.jpg".into(),
                link: "https://img/1".into(),
                alt_text: String::new(),
                author: None,
            }])
        }
    }

    struct Unconfigured;

    #[async_trait]
    impl ImageSearchProvider for Unconfigured {
        async fn search(&self, _: &str, _: usize) -> Result<Vec<ImageResult>, ImageSearchError> {
            Err(ImageSearchError::MissingCredential {
                provider: ImageProvider::Pinterest,
                variable: "PINTEREST_ACCESS_TOKEN",
            })
        }
    }

    #[test]
    fn limits_are_clamped() {
        assert_eq!(clamp_limit(None), 12);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(100)), 30);
        assert_eq!(clamp_limit(Some(5)), 5);
    }

    #[test]
    fn providers_parse_from_the_path() {
        assert_eq!("unsplash".parse::<ImageProvider>().unwrap(), ImageProvider::Unsplash);
        assert!("flickr".parse::<ImageProvider>().is_err());
    }

    #[tokio::test]
    async fn repeated_searches_hit_the_cache() {
        let unsplash = Arc::new(Counting::default());
        let search =
            ImageSearch::with_providers(unsplash.clone(), Arc::new(Unconfigured), new_cache());

        let first = search
            .search(ImageProvider::Unsplash, "Lasagna", Some(99))
            .await
            .unwrap();
        let second = search
            .search(ImageProvider::Unsplash, " lasagna ", Some(30))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(unsplash.calls.load(Ordering::SeqCst), 1);
        assert_eq!(unsplash.last_limit.load(Ordering::SeqCst), 30);

        assert!(search
            .search(ImageProvider::Unsplash, "   ", None)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(unsplash.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let search = ImageSearch::with_providers(
            Arc::new(Counting::default()),
            Arc::new(Unconfigured),
            new_cache(),
        );
        for _ in 0..2 {
            let error = search
                .search(ImageProvider::Pinterest, "pie", None)
                .await
                .unwrap_err();
            assert!(matches!(error, ImageSearchError::MissingCredential { .. }));
        }
    }

    #[test]
    fn provider_errors_keep_their_status() {
        let error: WebError = ImageSearchError::Provider {
            provider: ImageProvider::Unsplash,
            status: 401,
            details: json!({ "errors": ["OAuth error: The access token is invalid"] }),
        }
        .into();
        assert_eq!(error.into_response().status(), StatusCode::UNAUTHORIZED);

        let missing: WebError = ImageSearchError::MissingCredential {
            provider: ImageProvider::Unsplash,
            variable: "UNSPLASH_ACCESS_KEY",
        }
        .into();
        assert_eq!(
            missing.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
