use super::protocol::{ErrorBody, Reply, Request};
use super::*;
use crate::conversation::SessionMode;
use crate::corpus::Document;
use crate::embeddings::{ChunkingConfig, chunk_documents};
use crate::escalation::EscalationClassifier;
use crate::retrieval::Retriever;
use crate::testing::{KeywordEmbedder, ScriptedGenerator};
use tempfile::TempDir;

fn faq_index(embedder: &KeywordEmbedder) -> VectorIndex {
    let documents = vec![Document::new(
        Some("sample_faq.txt".to_string()),
        "Q: What is our return policy?\nA: Items can be returned within 30 days of purchase with receipt.",
    )];
    let chunks = chunk_documents(&documents, &ChunkingConfig::default()).expect("chunking");
    VectorIndex::build(chunks, embedder).expect("build should succeed")
}

fn service() -> SupportService {
    let embedder = Arc::new(KeywordEmbedder::new());
    let index = faq_index(&embedder);
    let orchestrator = AnswerOrchestrator::new(
        EscalationClassifier::rule_based_default().expect("default rules"),
        Retriever::new(embedder, 3),
        Arc::new(ScriptedGenerator::quoting()),
    );
    SupportService::new(orchestrator, index)
}

#[tokio::test]
async fn sessions_are_created_and_ended() {
    let service = service();
    let first = service.start_session().await;
    let second = service.start_session().await;

    assert_ne!(first, second);
    assert_eq!(service.session_count().await, 2);

    service.end_session(&first).await.expect("end should succeed");
    assert_eq!(service.session_count().await, 1);
    assert!(matches!(
        service.end_session(&first).await,
        Err(SupportError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn query_answers_and_updates_session() {
    let service = service();
    let session_id = service.start_session().await;

    let response = service
        .query(&session_id, "What is your return policy?".to_string())
        .await
        .expect("query should succeed");

    assert!(!response.escalate);
    assert!(response.response.contains("30 days"));
    let snapshot = service.session_snapshot(&session_id).await.expect("snapshot");
    assert_eq!(snapshot.turns().len(), 2);
}

#[tokio::test]
async fn unknown_session_is_reported() {
    let service = service();
    let result = service.query("missing", "hello".to_string()).await;
    assert!(matches!(result, Err(SupportError::SessionNotFound(_))));
}

#[tokio::test]
async fn escalation_flow_through_the_service() {
    let service = service();
    let session_id = service.start_session().await;

    let response = service
        .query(&session_id, "Let me speak to human support".to_string())
        .await
        .expect("query should succeed");
    assert!(response.escalate);

    service
        .agent_reply(&session_id, "An agent is here.")
        .await
        .expect("agent reply should succeed");
    service.resume(&session_id).await.expect("resume should succeed");

    let snapshot = service.session_snapshot(&session_id).await.expect("snapshot");
    assert_eq!(snapshot.mode(), SessionMode::Automated);
    assert_eq!(snapshot.turns().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn independent_sessions_run_concurrently() {
    let service = Arc::new(service());
    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            let session_id = service.start_session().await;
            for _ in 0..3 {
                service
                    .query(&session_id, "What is your return policy?".to_string())
                    .await
                    .expect("query should succeed");
            }
            service.session_snapshot(&session_id).await.expect("snapshot")
        }));
    }

    for handle in handles {
        let session = handle.await.expect("task should not panic");
        assert_eq!(session.turns().len(), 6);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn turns_within_a_session_are_serialised() {
    let service = Arc::new(service());
    let session_id = service.start_session().await;

    let mut handles = Vec::new();
    for i in 0..6 {
        let service = Arc::clone(&service);
        let session_id = session_id.clone();
        handles.push(tokio::spawn(async move {
            service
                .query(&session_id, format!("return question {}", i))
                .await
        }));
    }
    for handle in handles {
        handle
            .await
            .expect("task should not panic")
            .expect("query should succeed");
    }

    let snapshot = service.session_snapshot(&session_id).await.expect("snapshot");
    assert_eq!(snapshot.turns().len(), 12);
    for pair in snapshot.turns().chunks(2) {
        assert_eq!(pair[0].role, crate::conversation::Role::User);
        assert_eq!(pair[1].role, crate::conversation::Role::Assistant);
    }
}

#[tokio::test]
async fn swap_index_replaces_retrieval_source() {
    let service = service();
    let session_id = service.start_session().await;

    let old = service.swap_index(VectorIndex::empty("keyword-test")).await;
    assert_eq!(old.len(), 1);
    assert!(service.index().await.is_empty());

    let response = service
        .query(&session_id, "What is your return policy?".to_string())
        .await
        .expect("query should succeed");
    assert!(!response.response.contains("30 days"));
}

#[test]
fn start_refuses_without_an_index() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = crate::config::Config::load_from(temp_dir.path()).expect("default config");

    let result = SupportService::start(
        &config,
        Arc::new(KeywordEmbedder::new()),
        Arc::new(ScriptedGenerator::quoting()),
    );
    assert!(matches!(result, Err(SupportError::IndexUnavailable(_))));
}

#[test]
fn start_loads_persisted_index() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = crate::config::Config::load_from(temp_dir.path()).expect("default config");
    let embedder = Arc::new(KeywordEmbedder::new());
    faq_index(&embedder)
        .persist(&config.index_path())
        .expect("persist should succeed");

    let service = SupportService::start(&config, embedder, Arc::new(ScriptedGenerator::quoting()))
        .expect("service should start");
    let index = tokio::runtime::Runtime::new()
        .expect("runtime")
        .block_on(service.index());
    assert_eq!(index.len(), 1);
}

#[test]
fn requests_parse_from_tagged_json() {
    let request: Request = serde_json::from_str(r#"{"type":"start_session"}"#).expect("parse");
    assert_eq!(request, Request::StartSession);

    let request: Request =
        serde_json::from_str(r#"{"type":"query","session_id":"abc","query":"hi"}"#).expect("parse");
    assert_eq!(
        request,
        Request::Query {
            session_id: "abc".to_string(),
            query: "hi".to_string()
        }
    );

    let request: Request =
        serde_json::from_str(r#"{"type":"agent_reply","session_id":"abc","agent_reply":"hello"}"#)
            .expect("parse");
    assert_eq!(
        request,
        Request::AgentReply {
            session_id: "abc".to_string(),
            text: "hello".to_string()
        }
    );

    assert!(serde_json::from_str::<Request>(r#"{"type":"shutdown"}"#).is_err());
}

#[test]
fn replies_serialize_to_flat_objects() {
    let error = SupportError::InvalidTransition {
        action: "resume automated support",
        mode: SessionMode::Automated,
    };
    assert_eq!(
        serde_json::to_value(Reply::from(&error)).expect("serialize"),
        serde_json::json!({
            "error": {
                "kind": "invalid_transition",
                "message": "Invalid transition: cannot resume automated support while session is automated"
            }
        })
    );
    assert_eq!(
        serde_json::to_value(Reply::ack()).expect("serialize"),
        serde_json::json!({ "ok": true })
    );
}

#[tokio::test]
async fn serve_processes_one_reply_per_line() {
    let service = Arc::new(service());
    let session_id = service.start_session().await;
    let input = format!(
        "{}\n\n{}\nnot json\n{}\n",
        serde_json::json!({ "type": "query", "session_id": session_id, "query": "I need a manager" }),
        serde_json::json!({ "type": "query", "session_id": session_id, "query": "hello?" }),
        serde_json::json!({ "type": "resume", "session_id": "unknown" }),
    );

    let mut output = Vec::new();
    serve(
        Arc::clone(&service),
        tokio::io::BufReader::new(input.as_bytes()),
        &mut output,
    )
    .await
    .expect("serve should succeed");

    let replies: Vec<Reply> = String::from_utf8(output)
        .expect("utf8 output")
        .lines()
        .map(|line| serde_json::from_str(line).expect("reply is json"))
        .collect();

    assert_eq!(replies.len(), 4);
    assert!(matches!(&replies[0], Reply::Answer(r) if r.escalate));
    assert!(
        matches!(&replies[1], Reply::Answer(r) if r.escalate && r.response == service.orchestrator().pending_message())
    );
    assert!(matches!(
        &replies[2],
        Reply::Error { error: ErrorBody { kind, .. } } if kind == "invalid_request"
    ));
    assert!(matches!(
        &replies[3],
        Reply::Error { error: ErrorBody { kind, .. } } if kind == "session_not_found"
    ));
}
