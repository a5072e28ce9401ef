use std::collections::HashSet;
use std::sync::Arc;

use shortener::errors::ShortenerError;
use shortener::services::{
    CorrelationItem, DebounceSettings, DeletionDebouncer, ShortenOutcome, ShortenService,
};
use shortener::storage::{MemoryStorage, Repository};
use shortener::utils::{ALPHABET, RandomCodeGenerator};

fn service_with(repo: Arc<dyn Repository>) -> ShortenService {
    let debouncer = DeletionDebouncer::spawn(repo.clone(), DebounceSettings::default());
    ShortenService::new(repo, RandomCodeGenerator::default(), debouncer)
}

fn service() -> ShortenService {
    service_with(Arc::new(MemoryStorage::new()))
}

fn item(id: &str, url: &str) -> CorrelationItem {
    CorrelationItem {
        correlation_id: id.to_string(),
        original_url: url.to_string(),
    }
}

#[tokio::test]
async fn test_shorten_then_restore_round_trips() {
    let svc = service();
    let outcome = svc.shorten("https://example.com/some/long/path", "u1").await.unwrap();

    let alias = outcome.alias().to_string();
    assert!(outcome.is_created());
    assert_eq!(alias.len(), 5);
    assert!(alias.bytes().all(|b| ALPHABET.contains(&b)));
    assert_eq!(
        svc.restore_origin(&alias).await.unwrap(),
        "https://example.com/some/long/path"
    );
}

#[tokio::test]
async fn test_shorten_twice_returns_existing_alias() {
    let svc = service();
    let first = svc.shorten("http://dup.example", "u1").await.unwrap();
    let second = svc.shorten("http://dup.example", "u1").await.unwrap();

    assert_eq!(
        second,
        ShortenOutcome::AlreadyExists {
            alias: first.alias().to_string(),
            original: "http://dup.example".to_string(),
        }
    );

    let err = second.into_result().unwrap_err();
    assert!(err.is_informational());
    assert_eq!(err.existing_alias(), Some(first.alias()));
}

#[tokio::test]
async fn test_restore_unknown_alias_is_not_found() {
    let svc = service();
    assert!(matches!(
        svc.restore_origin("QQQQQ").await,
        Err(ShortenerError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_restore_deleted_alias_is_url_deleted() {
    let repo: Arc<dyn Repository> = Arc::new(MemoryStorage::new());
    let svc = service_with(repo.clone());
    let alias = svc
        .shorten("http://gone.example", "u1")
        .await
        .unwrap()
        .alias()
        .to_string();

    repo.batch_delete(vec![alias.clone()], "u1").await.unwrap();

    match svc.restore_origin(&alias).await {
        Err(ShortenerError::UrlDeleted { alias: a, original }) => {
            assert_eq!(a, alias);
            assert_eq!(original, "http://gone.example");
        }
        other => panic!("expected UrlDeleted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_batch_outputs_follow_input_order() {
    let svc = service();
    let outputs = svc
        .shorten_batch(vec![item("c1", "http://a"), item("c2", "http://b")], "u1")
        .await
        .unwrap();

    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0].correlation_id, "c1");
    assert_eq!(outputs[1].correlation_id, "c2");
    assert!(outputs.iter().all(|o| !o.short_alias.is_empty()));

    assert_eq!(svc.restore_origin(&outputs[0].short_alias).await.unwrap(), "http://a");
    assert_eq!(svc.restore_origin(&outputs[1].short_alias).await.unwrap(), "http://b");
}

#[tokio::test]
async fn test_batch_with_known_url_fails_entirely() {
    let svc = service();
    svc.shorten("http://a", "u1").await.unwrap();

    let result = svc
        .shorten_batch(vec![item("c1", "http://new"), item("c2", "http://a")], "u1")
        .await;
    assert!(result.is_err());
    assert_eq!(svc.show_all("u1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_show_all_without_records() {
    let svc = service();
    assert!(matches!(
        svc.show_all("nobody").await,
        Err(ShortenerError::NoRecordsForOwner(_))
    ));
    // 匿名记录不会出现在任何列表里
    svc.shorten("http://anon", "").await.unwrap();
    assert!(matches!(
        svc.show_all("").await,
        Err(ShortenerError::NoRecordsForOwner(_))
    ));
}

#[tokio::test]
async fn test_show_all_lists_owner_records_only() {
    let svc = service();
    svc.shorten("http://a", "u1").await.unwrap();
    svc.shorten("http://b", "u1").await.unwrap();
    svc.shorten("http://c", "u2").await.unwrap();

    let originals: Vec<String> = svc
        .show_all("u1")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.original)
        .collect();
    assert_eq!(originals, vec!["http://a", "http://b"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_shorten_loses_no_writes() {
    let svc = Arc::new(service());
    let mut handles = Vec::new();
    for i in 0..64 {
        let svc = svc.clone();
        handles.push(tokio::spawn(async move {
            let owner = format!("owner-{}", i);
            svc.shorten(&format!("http://site-{}.example", i), &owner).await
        }));
    }

    let mut aliases = HashSet::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => {
                assert!(outcome.is_created());
                aliases.insert(outcome.alias().to_string());
            }
            // 随机短码碰撞是唯一允许的失败
            Err(e) => assert!(matches!(e, ShortenerError::AliasConflict(_))),
        }
    }

    for alias in &aliases {
        assert!(svc.restore_origin(alias).await.is_ok());
    }
    assert!(aliases.len() >= 60);
}
