//! Context builder for retrieval-grounded generation

use super::retrieval::RankedDocument;

/// Format ranked documents into a generation context, stopping once the
/// character budget is exhausted. Lower-scoring documents are dropped
/// silently when the budget runs out: callers must not assume all of
/// top_k appears in the context.
pub fn build_context(documents: &[RankedDocument], budget_chars: usize) -> String {
    if documents.is_empty() {
        return "No relevant articles were found in the database.".to_string();
    }

    let mut parts: Vec<String> = Vec::new();
    let mut total_chars = 0usize;

    for (i, doc) in documents.iter().enumerate() {
        let date = doc
            .published_at
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "Unknown date".to_string());
        let tags = doc.tags.join(", ");

        let entry = format!(
            "---\nArticle {}: {}\nDate: {} | Relevance: {:.4}\nTags: {}\n\n{}\n",
            i + 1,
            doc.title,
            date,
            doc.score,
            tags,
            doc.body_text
        );

        if total_chars + entry.chars().count() > budget_chars {
            break;
        }
        total_chars += entry.chars().count();
        parts.push(entry);
    }

    format!(
        "Retrieved {} relevant articles:\n\n{}",
        parts.len(),
        parts.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: i64, body_len: usize) -> RankedDocument {
        RankedDocument {
            document_id: id,
            title: format!("Doc {id}"),
            url: format!("https://example.com/{id}"),
            published_at: None,
            body_text: "x".repeat(body_len),
            tags: vec!["malware".to_string()],
            score: 1.0 / id as f32,
        }
    }

    #[test]
    fn test_empty_input() {
        let context = build_context(&[], 1000);
        assert!(context.contains("No relevant articles"));
    }

    #[test]
    fn test_budget_drops_low_ranked_documents() {
        let docs = vec![hit(1, 400), hit(2, 400), hit(3, 400)];
        let context = build_context(&docs, 1000);
        assert!(context.starts_with("Retrieved 2 relevant articles"));
        assert!(context.contains("Doc 1"));
        assert!(context.contains("Doc 2"));
        assert!(!context.contains("Doc 3"));
    }

    #[test]
    fn test_all_fit_within_budget() {
        let docs = vec![hit(1, 50), hit(2, 50)];
        let context = build_context(&docs, 10_000);
        assert!(context.starts_with("Retrieved 2 relevant articles"));
    }
}
