// Automatic tagging: match a fresh image embedding against tag embeddings,
// routed through the virtual main-category vectors.

use std::collections::{HashMap, HashSet};

use crate::config::PlatformConfig;
use crate::database::queries::{EmbeddingRepo, TagRepo, TagVector};
use crate::error::CoreResult;

/// How many main categories a single image can route into.
const MAX_MAIN_CATEGORIES: usize = 2;

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[derive(Clone)]
pub struct TaggingService {
    embeddings: EmbeddingRepo,
    tags: TagRepo,
}

impl TaggingService {
    pub fn new(embeddings: EmbeddingRepo, tags: TagRepo) -> Self {
        Self { embeddings, tags }
    }

    /// Match the image vector against this model's tag vectors and persist
    /// the resulting links. Returns the linked tag ids.
    pub async fn tag_image(
        &self,
        image_id: i64,
        image_vector: &[f32],
        model_name: &str,
        config: &PlatformConfig,
    ) -> CoreResult<Vec<i64>> {
        let vectors = self.embeddings.tag_vectors(model_name).await?;
        let matched = select_tags(
            image_vector,
            &vectors,
            config.tag_threshold,
            config.tag_top_k,
        );
        if !matched.is_empty() {
            self.tags.link_image_tags(image_id, &matched).await?;
            tracing::debug!("Linked image {} to {} tag(s)", image_id, matched.len());
        }
        Ok(matched)
    }
}

/// Pure tag selection: route through category router vectors, then keep the
/// best `top_k` per subcategory above the threshold, deduplicated.
pub fn select_tags(
    image_vector: &[f32],
    vectors: &[TagVector],
    threshold: f32,
    top_k: usize,
) -> Vec<i64> {
    // Route through the virtual main-category vectors when any exist.
    let routers: Vec<(&TagVector, f32)> = vectors
        .iter()
        .filter(|v| v.is_category_router())
        .map(|v| (v, cosine_similarity(image_vector, &v.vector)))
        .collect();

    let allowed_categories: Option<HashSet<&str>> = if routers.is_empty() {
        None
    } else {
        let mut scored: Vec<(&TagVector, f32)> = routers
            .into_iter()
            .filter(|(_, sim)| *sim >= threshold)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        Some(
            scored
                .into_iter()
                .take(MAX_MAIN_CATEGORIES)
                .map(|(v, _)| v.name.as_str())
                .collect(),
        )
    };

    // Score ordinary tags, grouped per subcategory.
    let mut by_subcategory: HashMap<&str, Vec<(i64, f32)>> = HashMap::new();
    for vector in vectors.iter().filter(|v| !v.is_category_router()) {
        if let Some(allowed) = &allowed_categories {
            let category = vector.main_category.as_deref().unwrap_or("");
            if !allowed.contains(category) {
                continue;
            }
        }
        let similarity = cosine_similarity(image_vector, &vector.vector);
        if similarity < threshold {
            continue;
        }
        by_subcategory
            .entry(vector.sub_category_id.as_deref().unwrap_or(""))
            .or_default()
            .push((vector.tag_id, similarity));
    }

    // Top-k per subcategory, deduplicated, best match first.
    let mut selected: Vec<(i64, f32)> = Vec::new();
    let mut seen: HashSet<i64> = HashSet::new();
    for candidates in by_subcategory.values_mut() {
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
        for (tag_id, similarity) in candidates.iter().take(top_k) {
            if seen.insert(*tag_id) {
                selected.push((*tag_id, *similarity));
            }
        }
    }
    selected.sort_by(|a, b| b.1.total_cmp(&a.1));
    selected.into_iter().map(|(tag_id, _)| tag_id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::MAIN_CATEGORY_ROUTER;

    fn tag(id: i64, main: &str, sub: &str, vector: Vec<f32>) -> TagVector {
        TagVector {
            tag_id: id,
            name: format!("tag-{}", id),
            main_category: Some(main.to_string()),
            sub_category_id: Some(sub.to_string()),
            vector,
        }
    }

    fn router(id: i64, name: &str, vector: Vec<f32>) -> TagVector {
        TagVector {
            tag_id: id,
            name: name.to_string(),
            main_category: None,
            sub_category_id: Some(MAIN_CATEGORY_ROUTER.to_string()),
            vector,
        }
    }

    #[test]
    fn test_cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_router_excludes_other_categories() {
        // Image points along x: routes into "nature", not "urban".
        let vectors = vec![
            router(1, "nature", vec![1.0, 0.0]),
            router(2, "urban", vec![0.0, 1.0]),
            tag(10, "nature", "plants", vec![0.9, 0.1]),
            tag(20, "urban", "buildings", vec![0.9, 0.05]),
        ];
        let selected = select_tags(&[1.0, 0.0], &vectors, 0.2, 3);
        assert_eq!(selected, vec![10]);
    }

    #[test]
    fn test_top_k_limits_each_subcategory() {
        let vectors = vec![
            tag(1, "nature", "plants", vec![1.0, 0.0]),
            tag(2, "nature", "plants", vec![0.95, 0.05]),
            tag(3, "nature", "plants", vec![0.9, 0.1]),
            tag(4, "nature", "animals", vec![0.8, 0.2]),
        ];
        let selected = select_tags(&[1.0, 0.0], &vectors, 0.2, 2);
        // Two best from "plants", plus the single "animals" match.
        assert_eq!(selected.len(), 3);
        assert!(selected.contains(&1));
        assert!(selected.contains(&2));
        assert!(selected.contains(&4));
        assert!(!selected.contains(&3));
    }

    #[test]
    fn test_threshold_filters_weak_matches() {
        let vectors = vec![tag(1, "nature", "plants", vec![0.0, 1.0])];
        assert!(select_tags(&[1.0, 0.0], &vectors, 0.5, 3).is_empty());
    }

    #[test]
    fn test_without_routers_all_categories_compete() {
        let vectors = vec![
            tag(1, "nature", "plants", vec![1.0, 0.0]),
            tag(2, "urban", "buildings", vec![0.9, 0.1]),
        ];
        let selected = select_tags(&[1.0, 0.0], &vectors, 0.2, 3);
        assert_eq!(selected.len(), 2);
    }
}
