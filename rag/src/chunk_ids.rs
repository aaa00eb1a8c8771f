//! Deterministic chunk identity.
//!
//! Every chunk gets `"{source}:{page}:{sequence_in_page}"`, where the sequence
//! counts chunks within a contiguous run of the same `(source, page)`. The IDs
//! double as idempotency keys for the vector index: ingesting the same
//! unmodified document twice yields the same IDs.
//!
//! Precondition: the input must be grouped contiguously by `(source, page)`.
//! A page that reappears after a different page restarts at sequence 0 and
//! collides with its earlier chunks. The splitter in `document_processor`
//! always emits page-contiguous output.

use crate::models::Chunk;

pub fn assign_ids(chunks: &mut [Chunk]) {
    let mut last_page_key: Option<String> = None;
    let mut running_index = 0usize;

    for chunk in chunks.iter_mut() {
        let page_key = chunk.page_key();

        if last_page_key.as_deref() == Some(page_key.as_str()) {
            running_index += 1;
        } else {
            running_index = 0;
        }

        chunk.sequence_in_page = running_index;
        chunk.id = format!("{}:{}", page_key, running_index);
        last_page_key = Some(page_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn chunks(layout: &[(&str, usize)]) -> Vec<Chunk> {
        layout
            .iter()
            .enumerate()
            .map(|(i, (source, page))| Chunk::new(format!("text {}", i), *source, *page))
            .collect()
    }

    #[test]
    fn sequences_restart_on_each_page() {
        let mut batch = chunks(&[("a.pdf", 0), ("a.pdf", 0), ("a.pdf", 1), ("b.pdf", 1), ("b.pdf", 1)]);
        assign_ids(&mut batch);

        let ids: Vec<&str> = batch.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a.pdf:0:0", "a.pdf:0:1", "a.pdf:1:0", "b.pdf:1:0", "b.pdf:1:1"]);
        assert_eq!(
            batch.iter().map(|c| c.sequence_in_page).collect::<Vec<_>>(),
            vec![0, 1, 0, 0, 1]
        );
    }

    #[test]
    fn contiguous_input_yields_unique_ids() {
        let mut layout = Vec::new();
        for page in 0..4 {
            for _ in 0..=page {
                layout.push(("doc.pdf", page));
            }
        }
        let mut batch = chunks(&layout);
        assign_ids(&mut batch);

        let unique: HashSet<&str> = batch.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(unique.len(), batch.len());
    }

    #[test]
    fn reassigning_is_stable() {
        let mut first = chunks(&[("a.pdf", 0), ("a.pdf", 0), ("a.pdf", 2)]);
        assign_ids(&mut first);
        let mut second = first.clone();
        assign_ids(&mut second);

        assert_eq!(first, second);
    }

    #[test]
    fn empty_batch_is_fine() {
        let mut batch: Vec<Chunk> = Vec::new();
        assign_ids(&mut batch);
        assert!(batch.is_empty());
    }

    // Non-contiguous pages are outside the contract: the revisited page
    // restarts at 0 and reuses an ID. Pinned so a change here is deliberate.
    #[test]
    fn non_contiguous_page_collides() {
        let mut batch = chunks(&[("a.pdf", 0), ("a.pdf", 1), ("a.pdf", 0)]);
        assign_ids(&mut batch);

        assert_eq!(batch[0].id, "a.pdf:0:0");
        assert_eq!(batch[2].id, "a.pdf:0:0");
    }
}
