//! End-to-end chat through a session built from YAML configuration, using
//! the offline sample backend.

use dungeonmind_core::{
    CharacterError, ChatRequest, ConversationHistory, DungeonMindConfig, GameSession,
    HistoryStore, ServiceFactory, SessionConfig, SessionError, TurnRole,
};

const CONFIG: &str = r#"
backends:
  samplev1:
    provider: sample
history:
  trigger_threshold: 6
  retain_recent: 2
"#;

fn factory() -> ServiceFactory {
    ServiceFactory::new(DungeonMindConfig::from_yaml_str(CONFIG).unwrap())
}

#[tokio::test]
async fn test_history_stays_bounded_while_log_grows() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("chat_log.json");
    let config = SessionConfig::new("samplev1").with_log_path(&log_path);
    let mut session = GameSession::from_config(&factory(), &config, None)
        .await
        .unwrap();

    let mut history = ConversationHistory::new();
    for i in 0..10 {
        let response = session
            .chat(ChatRequest::new(format!("action {i}"), history))
            .await
            .unwrap();
        assert_eq!(
            response.assistant_message,
            format!("(Local AI) You said: action {i}")
        );
        assert!(response.conversation_history.non_system_count() <= 6);
        history = response.conversation_history;
    }

    assert!(history.system_count() >= 1);
    assert_eq!(history.last().unwrap().role(), TurnRole::Assistant);

    // Every player message and every reply but the last is on disk.
    let stored = HistoryStore::load(&log_path).await.unwrap();
    assert_eq!(stored.log().len(), 19);
    assert_eq!(stored.log().non_system_count(), 19);
}

#[tokio::test]
async fn test_unknown_backend() {
    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig::new("gpt-9").with_log_path(dir.path().join("log.json"));

    let result = GameSession::from_config(&factory(), &config, None).await;
    assert!(matches!(result, Err(SessionError::Config(_))));
}

#[tokio::test]
async fn test_start_campaign_requires_world() {
    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig::new("samplev1").with_log_path(dir.path().join("log.json"));
    let mut session = GameSession::from_config(&factory(), &config, None)
        .await
        .unwrap();

    assert!(!session.has_campaigns());
    assert!(matches!(
        session.start_campaign("anything").await,
        Err(SessionError::NoWorld)
    ));
}

#[tokio::test]
async fn test_character_creation_rejects_non_json_reply() {
    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig::new("samplev1").with_log_path(dir.path().join("log.json"));
    let session = GameSession::from_config(&factory(), &config, None)
        .await
        .unwrap();

    // The sample backend echoes the player instead of answering in JSON.
    let result = session.create_character("a tiefling warlock").await;
    assert!(matches!(
        result,
        Err(SessionError::Character(CharacterError::InvalidJson { ref llm_output, .. }))
            if llm_output == "(Local AI) You said: a tiefling warlock"
    ));
}
