//! Fetch path: cache hits, concurrent loads, throttling and failure handling

mod common;

use common::{config, lang, langs, within, ScriptedProvider};
use oddsfeed::application::{FetchError, OddsFeed};
use oddsfeed::domain::{DtoSource, EntityDto, Urn};
use oddsfeed::infrastructure::ExceptionHandlingStrategy;
use std::sync::Arc;
use std::time::Duration;

fn feed(provider: &Arc<ScriptedProvider>, strategy: ExceptionHandlingStrategy) -> OddsFeed {
    OddsFeed::new(config(strategy), provider.clone()).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disjoint_language_loads_never_duplicate_fetches() {
    let provider = Arc::new(ScriptedProvider::with_delay(Duration::from_millis(30)));
    let feed = feed(&provider, ExceptionHandlingStrategy::Catch);
    let id = Urn::new("sr", "match", 1001);

    let first = langs(&["en", "de"]);
    let second = langs(&["fr", "it"]);
    let (a, b) = within(async {
        tokio::join!(feed.entity_in(&id, &first), feed.entity_in(&id, &second))
    })
    .await;
    let (a, b) = (a.unwrap(), b.unwrap());

    verbose_println!("calls: {:?}", provider.calls());
    assert_eq!(provider.calls_for("fetch_summary"), 4);
    assert_eq!(a.loaded_languages().len(), 4);
    assert_eq!(b.loaded_languages().len(), 4);
    assert_eq!(a, b);

    let item = feed.cache().get(&id).unwrap();
    assert_eq!(item.loaded_languages().len(), 4);
    for language in first.iter().chain(second.iter()) {
        assert_eq!(item.name(language), Some(format!("sr:match:1001 ({language})").as_str()));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_language_fetches_once() {
    let provider = Arc::new(ScriptedProvider::with_delay(Duration::from_millis(30)));
    let feed = feed(&provider, ExceptionHandlingStrategy::Catch);
    let id = Urn::new("sr", "match", 1002);
    let en = langs(&["en"]);

    let results = within(async {
        tokio::join!(
            feed.entity_in(&id, &en),
            feed.entity_in(&id, &en),
            feed.entity_in(&id, &en)
        )
    })
    .await;

    for item in [results.0, results.1, results.2] {
        assert!(item.unwrap().loaded_languages().contains(&lang("en")));
    }
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_cache_hit_after_load() {
    let provider = Arc::new(ScriptedProvider::new());
    let feed = feed(&provider, ExceptionHandlingStrategy::Catch);
    let id = Urn::new("sr", "match", 1003);

    feed.entity(&id).await.unwrap();
    assert_eq!(provider.call_count(), 3);

    feed.entity(&id).await.unwrap();
    feed.entity_in(&id, &langs(&["de"])).await.unwrap();
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_gate_bounds_parallel_fetches() {
    let provider = Arc::new(ScriptedProvider::with_delay(Duration::from_millis(40)));
    let mut config = config(ExceptionHandlingStrategy::Catch);
    config.concurrency.gate_size = 2;
    let feed = Arc::new(OddsFeed::new(config, provider.clone()).unwrap());

    let mut tasks = Vec::new();
    for n in 0..6 {
        let feed = Arc::clone(&feed);
        tasks.push(tokio::spawn(async move {
            feed.entity_in(&Urn::new("sr", "match", 2000 + n), &langs(&["en"]))
                .await
                .map(|item| item.loaded_languages().len())
        }));
    }
    for task in tasks {
        assert_eq!(within(task).await.unwrap().unwrap(), 1);
    }

    verbose_println!("max in flight: {}", provider.max_in_flight());
    assert_eq!(provider.call_count(), 6);
    assert!(provider.max_in_flight() <= 2);
}

#[tokio::test]
async fn test_summary_and_fixture_languages_are_independent() {
    let provider = Arc::new(ScriptedProvider::new());
    let feed = feed(&provider, ExceptionHandlingStrategy::Catch);
    let id = Urn::new("sr", "match", 1004);
    let en = lang("en");

    provider.script(
        &id,
        &en,
        EntityDto {
            name: Some("Arsenal vs Chelsea".to_string()),
            ..EntityDto::default()
        },
    );
    feed.entity_in(&id, &[en.clone()]).await.unwrap();
    assert_eq!(provider.calls_for("fetch_fixture"), 0);

    let item = feed.fixture(&id).await.unwrap();
    assert_eq!(provider.calls_for("fetch_fixture"), 3);
    assert_eq!(item.fixture_languages().len(), 3);
    assert_eq!(item.loaded_languages().len(), 1);
    assert_eq!(
        item.missing_languages(&langs(&["en", "de"]), DtoSource::Summary),
        langs(&["de"])
    );
    assert_eq!(item.name(&en), Some("Arsenal vs Chelsea"));
    assert_eq!(item.name(&lang("de")), Some("sr:match:1004 (de)"));
}

#[tokio::test]
async fn test_catch_returns_stub_on_failure() {
    let provider = Arc::new(ScriptedProvider::failing());
    let feed = feed(&provider, ExceptionHandlingStrategy::Catch);
    let id = Urn::new("sr", "match", 1005);

    let item = feed.entity(&id).await.unwrap();
    assert!(item.loaded_languages().is_empty());
    assert_eq!(item.id(), &id);
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test]
async fn test_throw_propagates_first_failure() {
    let provider = Arc::new(ScriptedProvider::failing());
    let feed = feed(&provider, ExceptionHandlingStrategy::Throw);
    let id = Urn::new("sr", "match", 1006);

    match feed.entity(&id).await {
        Err(FetchError::Provider { operation, id: failed, language, .. }) => {
            assert_eq!(operation, "fetch_summary");
            assert_eq!(failed, id);
            assert_eq!(language, lang("en"));
        }
        other => panic!("expected provider error, got {other:?}"),
    }
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_tournament_schedule_creates_event_stubs() {
    let provider = Arc::new(ScriptedProvider::new());
    let feed = feed(&provider, ExceptionHandlingStrategy::Catch);
    let tournament = Urn::new("sr", "tournament", 17);
    let events = vec![Urn::new("sr", "match", 1), Urn::new("sr", "match", 2)];
    provider.script_schedule(&tournament, events.clone());

    assert_eq!(feed.tournament_schedule(&tournament).await.unwrap(), events);
    assert_eq!(feed.tournament_schedule(&tournament).await.unwrap(), events);
    assert_eq!(provider.calls_for("fetch_schedule"), 1);

    for event in &events {
        assert!(feed.cache().contains(event));
    }
}
