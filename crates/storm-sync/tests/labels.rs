mod common;

use std::sync::Arc;
use std::time::Duration;

use common::FakeTransport;
use storm_sync::{LabelChange, LabelEditor, LabelSuggestion, LabelSuggestionEngine};

fn setup(corpus: &[&str], current: &str) -> (Arc<FakeTransport>, LabelEditor, LabelSuggestionEngine) {
    let transport = Arc::new(FakeTransport::new());
    *transport.corpus.lock().unwrap() = corpus.iter().map(|s| s.to_string()).collect();
    let editor = LabelEditor::new(transport.clone(), Duration::from_millis(200));
    let engine = LabelSuggestionEngine::new(transport.corpus.lock().unwrap().clone(), current);
    (transport, editor, engine)
}

#[tokio::test(start_paused = true)]
async fn test_new_label_is_created_then_assigned() {
    let (transport, editor, engine) = setup(&["movies", "music"], "music");
    engine.set_query("docs");
    let choice = engine
        .suggestions()
        .into_iter()
        .find(|s| s.is_new)
        .unwrap();

    let started = tokio::time::Instant::now();
    let change = editor.apply("h1", &engine, &choice).await.unwrap();

    assert_eq!(change, LabelChange::Assigned("docs".to_string()));
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(*transport.created.lock().unwrap(), vec!["docs".to_string()]);
    assert_eq!(
        *transport.assigned.lock().unwrap(),
        vec![("h1".to_string(), "docs".to_string())]
    );

    // Corpus now has the label and it is the current one.
    assert_eq!(engine.current(), "docs");
    assert_eq!(
        engine.suggestions(),
        vec![LabelSuggestion::clear()]
    );
    engine.set_query("");
    assert_eq!(
        engine.suggestions(),
        vec![
            LabelSuggestion::existing("movies"),
            LabelSuggestion::existing("music"),
            LabelSuggestion::clear(),
        ]
    );
}

#[tokio::test]
async fn test_existing_label_assigned_without_create() {
    let (transport, editor, engine) = setup(&["movies", "music"], "");
    let change = editor
        .apply("h1", &engine, &LabelSuggestion::existing("movies"))
        .await
        .unwrap();

    assert_eq!(change, LabelChange::Assigned("movies".to_string()));
    assert!(transport.created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_clear_and_unchanged() {
    let (transport, editor, engine) = setup(&["movies"], "movies");

    let unchanged = editor
        .apply("h1", &engine, &LabelSuggestion::existing("movies"))
        .await
        .unwrap();
    assert_eq!(unchanged, LabelChange::Unchanged);
    assert!(transport.assigned.lock().unwrap().is_empty());

    let cleared = editor
        .apply("h1", &engine, &LabelSuggestion::clear())
        .await
        .unwrap();
    assert_eq!(cleared, LabelChange::Cleared);
    assert_eq!(engine.current(), "");
    assert_eq!(
        *transport.assigned.lock().unwrap(),
        vec![("h1".to_string(), String::new())]
    );
}

#[tokio::test]
async fn test_delete_refreshes_corpus() {
    let (transport, editor, engine) = setup(&["movies", "music"], "");
    editor.delete("music", &engine).await.unwrap();

    assert_eq!(*transport.deleted.lock().unwrap(), vec!["music".to_string()]);
    assert_eq!(engine.suggestions(), vec![LabelSuggestion::existing("movies")]);

    editor.create("tv", &engine).await.unwrap();
    assert_eq!(
        engine.suggestions(),
        vec![
            LabelSuggestion::existing("movies"),
            LabelSuggestion::existing("tv"),
        ]
    );
}
