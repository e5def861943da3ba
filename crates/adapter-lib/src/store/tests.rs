use super::*;
use crate::error::{AdapterError, ErrorClass};
use crate::labels::LabelSet;
use crate::models::{GroupResource, ObjectCoordinate};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn pods_identity(metric: &str) -> MetricIdentity {
    MetricIdentity::new(GroupResource::new("", "pods"), true, metric.to_string())
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn labels(raw: &str) -> LabelSet {
    LabelSet::from_selector_str(raw).unwrap()
}

fn selector(raw: &str) -> Selector {
    Selector::parse(raw).unwrap()
}

fn setup() -> (MetricStore, Arc<StaticObjectLister>) {
    let lister = Arc::new(StaticObjectLister::new());
    (MetricStore::new(lister.clone()), lister)
}

fn add_pod(lister: &StaticObjectLister, name: &str, app: &str) {
    lister.add_object(GroupResource::new("", "pods"), "default", name, labels(&format!("app={}", app)));
}

#[tokio::test]
async fn test_last_write_wins() {
    let (store, _) = setup();
    let identity = pods_identity("qps");
    let pod = ObjectCoordinate::new("default", "a");

    store.upsert(identity.clone(), pod.clone(), 5.0, labels("path=root"), at(0)).await;
    store.upsert(identity.clone(), pod.clone(), 7.0, labels("path=api,code=200"), at(1)).await;

    let record = store
        .get_by_name(&identity, &pod, &Selector::everything())
        .await
        .unwrap();
    assert_eq!(record.value, 7.0);
    assert_eq!(record.labels, labels("path=api,code=200"));
    assert_eq!(record.timestamp, at(1));
    assert_eq!(store.len().await, 1);

    // The first write's labels no longer match
    assert_err!(store.get_by_name(&identity, &pod, &selector("path=root")).await);
}

#[tokio::test]
async fn test_get_by_name_missing_record() {
    let (store, _) = setup();
    let identity = pods_identity("qps");

    let err = store
        .get_by_name(&identity, &ObjectCoordinate::new("default", "ghost"), &Selector::everything())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AdapterError::MetricNotFound {
            resource: GroupResource::new("", "pods"),
            metric: "qps".to_string(),
            object: "ghost".to_string(),
        }
    );
}

#[tokio::test]
async fn test_metric_label_mismatch_is_not_found() {
    let (store, _) = setup();
    let identity = pods_identity("qps");
    let pod = ObjectCoordinate::new("default", "a");
    store.upsert(identity.clone(), pod.clone(), 1.0, labels("env=prod"), at(0)).await;

    let found = store.get_by_name(&identity, &pod, &selector("env=prod")).await;
    assert_eq!(found.unwrap().labels.get("env"), Some("prod"));

    let err = store
        .get_by_name(&identity, &pod, &selector("env=dev"))
        .await
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::NotFound);
    assert!(matches!(err, AdapterError::MetricNotFoundForSelector { .. }));
}

#[tokio::test]
async fn test_selector_query_skips_objects_without_values() {
    let (store, lister) = setup();
    let identity = pods_identity("qps");
    for name in ["a", "b", "c"] {
        add_pod(&lister, name, "web");
    }
    add_pod(&lister, "d", "db");

    store.upsert(identity.clone(), ObjectCoordinate::new("default", "a"), 1.0, LabelSet::new(), at(0)).await;
    store.upsert(identity.clone(), ObjectCoordinate::new("default", "c"), 3.0, LabelSet::new(), at(0)).await;
    store.upsert(identity.clone(), ObjectCoordinate::new("default", "d"), 4.0, LabelSet::new(), at(0)).await;

    let records = store
        .get_by_selector(&identity, "default", &selector("app=web"), &Selector::everything())
        .await
        .unwrap();

    let names: Vec<&str> = records.iter().map(|r| r.coordinate.name.as_str()).collect();
    assert_eq!(names, vec!["a", "c"]);
}

#[tokio::test]
async fn test_selector_query_applies_metric_selector() {
    let (store, lister) = setup();
    let identity = pods_identity("qps");
    add_pod(&lister, "a", "web");
    add_pod(&lister, "b", "web");

    store.upsert(identity.clone(), ObjectCoordinate::new("default", "a"), 1.0, labels("path=root"), at(0)).await;
    store.upsert(identity.clone(), ObjectCoordinate::new("default", "b"), 2.0, labels("path=api"), at(0)).await;

    let records = store
        .get_by_selector(&identity, "default", &Selector::everything(), &selector("path=api"))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].coordinate.name, "b");
    assert_eq!(records[0].value, 2.0);
}

#[tokio::test]
async fn test_selector_query_lister_failure_is_transient() {
    let (store, lister) = setup();
    let identity = pods_identity("qps");
    lister.set_failure(Some("forbidden".into()));

    let err = store
        .get_by_selector(&identity, "default", &Selector::everything(), &Selector::everything())
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Transient);
    assert_eq!(lister.calls(), 1);
}

#[tokio::test]
async fn test_selector_query_on_empty_namespace_is_empty() {
    let (store, lister) = setup();
    add_pod(&lister, "a", "web");

    let records = store
        .get_by_selector(&pods_identity("qps"), "other", &Selector::everything(), &Selector::everything())
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_known_identities_are_distinct() {
    let (store, _) = setup();
    let qps = pods_identity("qps");
    let latency = pods_identity("latency");
    let nodes = MetricIdentity::new(GroupResource::new("", "nodes"), false, "qps".to_string());

    for name in ["a", "b"] {
        store.upsert(qps.clone(), ObjectCoordinate::new("default", name), 1.0, LabelSet::new(), at(0)).await;
        store.upsert(latency.clone(), ObjectCoordinate::new("default", name), 1.0, LabelSet::new(), at(0)).await;
    }
    store.upsert(nodes.clone(), ObjectCoordinate::cluster_scoped("node-1"), 1.0, LabelSet::new(), at(0)).await;
    store.upsert(nodes.clone(), ObjectCoordinate::cluster_scoped("node-2"), 1.0, LabelSet::new(), at(0)).await;

    let identities = store.list_known_identities().await;
    assert_eq!(identities.len(), 3);
    assert!(identities.contains(&qps));
    assert!(identities.contains(&latency));
    assert!(identities.contains(&nodes));
    assert_eq!(store.len().await, 6);
}

#[tokio::test]
async fn test_two_upserts_sharing_an_identity_count_once() {
    let (store, _) = setup();
    let writes = [
        (pods_identity("qps"), ObjectCoordinate::new("default", "a")),
        (pods_identity("qps"), ObjectCoordinate::new("default", "b")),
        (pods_identity("latency"), ObjectCoordinate::new("default", "a")),
        (pods_identity("errors"), ObjectCoordinate::new("default", "a")),
        (
            MetricIdentity::new(GroupResource::new("", "nodes"), false, "temperature".to_string()),
            ObjectCoordinate::cluster_scoped("node-1"),
        ),
    ];

    for (identity, coordinate) in writes {
        store.upsert(identity, coordinate, 1.0, LabelSet::new(), at(0)).await;
    }

    assert_eq!(store.list_known_identities().await.len(), 4);
}

#[tokio::test]
async fn test_namespaced_and_cluster_identities_are_separate() {
    let (store, _) = setup();
    let namespaced = MetricIdentity::new(GroupResource::new("", "namespaces"), true, "qps".to_string());
    let cluster = MetricIdentity::new(GroupResource::new("", "namespaces"), false, "qps".to_string());
    let coordinate = ObjectCoordinate::cluster_scoped("default");

    store.upsert(namespaced.clone(), coordinate.clone(), 1.0, LabelSet::new(), at(0)).await;

    assert_ok!(store.get_by_name(&namespaced, &coordinate, &Selector::everything()).await);
    assert_err!(store.get_by_name(&cluster, &coordinate, &Selector::everything()).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_and_readers() {
    let lister = Arc::new(StaticObjectLister::new());
    for i in 0..8 {
        add_pod(&lister, &format!("pod-{}", i), "web");
    }
    let store = Arc::new(MetricStore::new(lister));
    let identity = pods_identity("qps");

    let writers: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            let identity = identity.clone();
            tokio::spawn(async move {
                let pod = ObjectCoordinate::new("default", format!("pod-{}", i));
                for n in 0..50 {
                    store.upsert(identity.clone(), pod.clone(), n as f64, LabelSet::new(), at(n)).await;
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            let identity = identity.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    let records = store
                        .get_by_selector(&identity, "default", &Selector::everything(), &Selector::everything())
                        .await
                        .unwrap();
                    assert!(records.len() <= 8);
                    for record in records {
                        // Value and timestamp are always written together
                        assert_eq!(record.timestamp, at(record.value as i64));
                    }
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.await.unwrap();
    }

    let records = store
        .get_by_selector(&identity, "default", &Selector::everything(), &Selector::everything())
        .await
        .unwrap();
    assert_eq!(records.len(), 8);
    assert!(records.iter().all(|r| r.value == 49.0));
}
