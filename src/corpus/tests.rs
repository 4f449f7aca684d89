use super::*;
use tempfile::TempDir;

#[test]
fn loads_only_text_files_in_name_order() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(temp_dir.path().join("b_shipping.txt"), "Shipping takes 5 days.")
        .expect("should write file");
    fs::write(temp_dir.path().join("a_returns.TXT"), "Returns within 30 days.")
        .expect("should write file");
    fs::write(temp_dir.path().join("notes.md"), "# ignored").expect("should write file");
    fs::create_dir(temp_dir.path().join("nested.txt")).expect("should create dir");

    let documents = load_documents(temp_dir.path()).expect("should load documents");

    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].source.as_deref(), Some("a_returns.TXT"));
    assert_eq!(documents[1].source.as_deref(), Some("b_shipping.txt"));
    assert_eq!(documents[1].text, "Shipping takes 5 days.");
}

#[test]
fn missing_directory_is_a_configuration_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let result = load_documents(&temp_dir.path().join("missing"));
    assert!(matches!(result, Err(SupportError::Configuration(_))));
}

#[test]
fn sample_corpus_is_seeded_once() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let corpus_dir = temp_dir.path().join("product_docs");

    assert!(ensure_sample_corpus(&corpus_dir).expect("should seed corpus"));
    assert!(!ensure_sample_corpus(&corpus_dir).expect("should skip existing corpus"));

    let documents = load_documents(&corpus_dir).expect("should load seeded corpus");
    assert_eq!(documents.len(), 1);
    assert!(documents[0].text.contains("within 30 days of purchase"));
}
