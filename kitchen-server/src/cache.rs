use quick_cache::sync::Cache;
use quick_cache::Weighter;
use std::sync::Arc;

use crate::images::{ImageProvider, ImageResult};

pub type KitchenCache = Arc<Cache<CacheQuery, CacheValue, ValueWeighter>>;

pub fn new_cache() -> KitchenCache {
    Arc::new(Cache::with_weighter(1_000, 8 << 20, ValueWeighter))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheQuery {
    ImageSearch {
        provider: ImageProvider,
        query: String,
        limit: usize,
    },
    /// Rendered notes of one revision of a recipe.
    NotesHtml { recipe_id: i64, revision: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    ImageResults { results: Vec<ImageResult> },
    Html { html: String },
}

#[derive(Clone)]
pub struct ValueWeighter;

impl Weighter<CacheQuery, CacheValue> for ValueWeighter {
    fn weight(&self, _key: &CacheQuery, val: &CacheValue) -> u64 {
        match val {
            CacheValue::ImageResults { results } => results
                .iter()
                .map(|r| {
                    r.id.len()
                        + r.title.len()
                        + r.image_url.len()
                        + r.thumbnail_url.len()
                        + r.link.len()
                        + r.alt_text.len()
                        + r.author.as_ref().map_or(0, String::len)
                })
                .sum::<usize>()
                .max(1) as u64,
            CacheValue::Html { html } => html.len().max(1) as u64,
        }
    }
}
