use super::estimate_token_count as estimate_token_count_impl;
use super::*;
use crate::SupportError;

fn doc(source: &str, text: &str) -> Document {
    Document::new(Some(source.to_string()), text)
}

fn config(max_chunk_size: usize, overlap: usize) -> ChunkingConfig {
    ChunkingConfig::new(max_chunk_size, overlap).expect("chunking config should be valid")
}

fn create_faq_text() -> String {
    let mut text = String::new();
    for i in 0..12 {
        text.push_str(&format!(
            "Q: Question number {i}?\nA: This is the answer to question {i}. It spans two sentences.\n\n"
        ));
    }
    text
}

fn assert_overlap_invariant(chunks: &[Chunk], overlap: usize) {
    for pair in chunks.windows(2) {
        let tail: String = pair[0]
            .text
            .chars()
            .skip(pair[0].text.chars().count() - overlap)
            .collect();
        let head: String = pair[1].text.chars().take(overlap).collect();
        assert_eq!(tail, head, "chunks {} and {} do not overlap", pair[0].id, pair[1].id);
    }
}

#[test]
fn estimate_token_count() {
    assert_eq!(estimate_token_count_impl("hello world"), 2);
    assert_eq!(estimate_token_count_impl("This is a test."), 5);
    assert_eq!(estimate_token_count_impl(""), 0);
}

#[test]
fn small_document_is_single_chunk() {
    let chunks = chunk_documents(&[doc("faq.txt", "Hello, world!")], &config(100, 10))
        .expect("chunking should succeed");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].id, "faq.txt#0");
    assert_eq!(chunks[0].text, "Hello, world!");
    assert_eq!(chunks[0].start, 0);
}

#[test]
fn empty_and_whitespace_documents_produce_no_chunks() {
    let chunks = chunk_documents(&[doc("a.txt", ""), doc("b.txt", "  \n\n ")], &config(100, 10))
        .expect("chunking should succeed");
    assert!(chunks.is_empty());
}

#[test]
fn overlap_must_be_smaller_than_max_size() {
    let result = chunk_documents(
        &[doc("a.txt", "text")],
        &ChunkingConfig {
            max_chunk_size: 50,
            overlap: 50,
        },
    );
    assert!(matches!(result, Err(SupportError::Configuration(_))));

    assert!(ChunkingConfig::new(10, 20).is_err());
    assert!(ChunkingConfig::new(0, 0).is_err());
}

#[test]
fn chunks_respect_max_size() {
    let text = create_faq_text();
    let chunks =
        chunk_documents(&[doc("faq.txt", &text)], &config(120, 20)).expect("should chunk");

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(
            chunk.text.chars().count() <= 120,
            "chunk {} is {} chars",
            chunk.id,
            chunk.text.chars().count()
        );
    }
}

#[test]
fn adjacent_chunks_share_exact_overlap() {
    let text = create_faq_text();
    let chunks =
        chunk_documents(&[doc("faq.txt", &text)], &config(150, 25)).expect("should chunk");

    assert!(chunks.len() > 2);
    assert_overlap_invariant(&chunks, 25);
}

#[test]
fn chunks_reassemble_the_document() {
    let text = create_faq_text();
    let chunks =
        chunk_documents(&[doc("faq.txt", &text)], &config(150, 25)).expect("should chunk");

    let mut rebuilt: String = chunks[0].text.clone();
    for chunk in &chunks[1..] {
        rebuilt.extend(chunk.text.chars().skip(25));
    }
    assert_eq!(rebuilt, text);

    for chunk in &chunks {
        let expected: String = text.chars().skip(chunk.start).take(chunk.text.chars().count()).collect();
        assert_eq!(chunk.text, expected);
    }
}

#[test]
fn prefers_paragraph_boundaries() {
    let text = "First paragraph has some words.\n\nSecond paragraph has more words in it.";
    let chunks = chunk_documents(&[doc("a.txt", text)], &config(50, 5)).expect("should chunk");

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].text, "First paragraph has some words.\n\n");
    assert!(chunks[1].text.ends_with("more words in it."));
}

#[test]
fn falls_back_to_sentence_then_word_boundaries() {
    let text = "One short sentence. Another sentence follows here without breaks";
    let chunks = chunk_documents(&[doc("a.txt", text)], &config(40, 4)).expect("should chunk");
    assert_eq!(chunks[0].text, "One short sentence. ");

    let words = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
    let chunks = chunk_documents(&[doc("b.txt", words)], &config(20, 3)).expect("should chunk");
    for chunk in &chunks[..chunks.len() - 1] {
        assert!(chunk.text.ends_with(' '), "{:?} should end at a word", chunk.text);
    }
}

#[test]
fn hard_splits_text_without_boundaries() {
    let text = "x".repeat(95);
    let chunks = chunk_documents(&[doc("a.txt", &text)], &config(30, 10)).expect("should chunk");

    assert!(chunks.iter().all(|c| c.text.chars().count() <= 30));
    assert_eq!(chunks[0].text.len(), 30);
    assert_overlap_invariant(&chunks, 10);
}

#[test]
fn multibyte_text_is_split_on_characters() {
    let text = "┌──────────────────┐\n│ Hello world      │\n└──────────────────┘".repeat(4);
    let chunks = chunk_documents(&[doc("a.txt", &text)], &config(30, 5)).expect("should chunk");

    assert!(chunks.len() > 1);
    assert!(chunks.iter().all(|c| c.text.chars().count() <= 30));
    assert_overlap_invariant(&chunks, 5);
}

#[test]
fn chunking_is_deterministic() {
    let documents = vec![doc("a.txt", &create_faq_text()), doc("b.txt", "Alpha\n\nBeta\n\nGamma")];
    let c1 = chunk_documents(&documents, &config(80, 10)).expect("should chunk");
    let c2 = chunk_documents(&documents, &config(80, 10)).expect("should chunk");
    assert_eq!(c1, c2);
}

#[test]
fn chunk_indices_restart_per_document() {
    let documents = vec![doc("a.txt", &create_faq_text()), doc("b.txt", &create_faq_text())];
    let chunks = chunk_documents(&documents, &config(200, 20)).expect("should chunk");

    let b_chunks: Vec<&Chunk> = chunks
        .iter()
        .filter(|c| c.source.as_deref() == Some("b.txt"))
        .collect();
    assert_eq!(b_chunks[0].chunk_index, 0);
    assert_eq!(b_chunks[0].id, "b.txt#0");
    for (i, chunk) in b_chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i);
    }
}

#[test]
fn documents_without_source_get_generic_ids() {
    let chunks = chunk_documents(&[Document::new(None, "Some text")], &config(100, 10))
        .expect("should chunk");
    assert_eq!(chunks[0].id, "document#0");
    assert_eq!(chunks[0].source, None);
}
