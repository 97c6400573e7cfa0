//! Listing tests: filters, visibility, and cursor pagination.

use chrono::{DateTime, Utc};
use palladio::registry::domain::{ServerStatus, StatusChange};
use palladio::registry::ports::{ServerFilter, StoreError};
use palladio::registry::services::RegistryServiceError;
use rstest::rstest;

use crate::in_memory::helpers::{harness, Harness};
use crate::test_helpers::{descriptor, descriptor_with_remote};

async fn seed(harness: &Harness, names: &[(&str, &str)]) {
    for (name, version) in names {
        harness
            .service
            .publish(descriptor(name, version))
            .await
            .expect("seed publish");
        harness.clock.advance_seconds(1);
    }
}

#[rstest]
#[tokio::test]
async fn include_deleted_toggles_visibility(harness: Harness) {
    seed(
        &harness,
        &[("io.github.u/alpha", "1.0.0"), ("io.github.u/beta", "1.0.0")],
    )
    .await;
    harness
        .service
        .set_version_status(
            "io.github.u/alpha",
            "1.0.0",
            StatusChange {
                status: ServerStatus::Deleted,
                message: None,
            },
        )
        .await
        .expect("delete alpha");

    let visible = harness
        .service
        .list_servers(&ServerFilter::default(), None, 0)
        .await
        .expect("default listing");
    let names: Vec<&str> = visible.servers.iter().map(|r| r.name()).collect();
    assert_eq!(names, ["io.github.u/beta"]);

    let everything = harness
        .service
        .list_servers(
            &ServerFilter {
                include_deleted: true,
                ..ServerFilter::default()
            },
            None,
            0,
        )
        .await
        .expect("listing with deleted");
    assert_eq!(everything.servers.len(), 2);
}

#[rstest]
#[tokio::test]
async fn updated_since_is_a_strict_lower_bound(harness: Harness) {
    harness
        .service
        .publish(descriptor("io.github.u/early", "1.0.0"))
        .await
        .expect("early");
    let cutoff: DateTime<Utc> = {
        let record = harness
            .service
            .get_server_by_name("io.github.u/early", false)
            .await
            .expect("read early");
        record.meta().updated_at
    };

    harness.clock.advance_seconds(60);
    harness
        .service
        .publish(descriptor("io.github.u/late", "1.0.0"))
        .await
        .expect("late");

    let page = harness
        .service
        .list_servers(
            &ServerFilter {
                updated_since: Some(cutoff),
                include_deleted: true,
                ..ServerFilter::default()
            },
            None,
            0,
        )
        .await
        .expect("incremental listing");

    let names: Vec<&str> = page.servers.iter().map(|r| r.name()).collect();
    assert_eq!(names, ["io.github.u/late"], "rows at the cutoff are excluded");
}

#[rstest]
#[tokio::test]
async fn substring_search_is_case_insensitive(harness: Harness) {
    seed(
        &harness,
        &[
            ("io.github.u/weather-tool", "1.0.0"),
            ("io.github.u/calendar", "1.0.0"),
        ],
    )
    .await;

    let page = harness
        .service
        .list_servers(
            &ServerFilter {
                substring_name: Some("WEATHER".to_owned()),
                ..ServerFilter::default()
            },
            None,
            0,
        )
        .await
        .expect("search");

    let names: Vec<&str> = page.servers.iter().map(|r| r.name()).collect();
    assert_eq!(names, ["io.github.u/weather-tool"]);
}

#[rstest]
#[tokio::test]
async fn latest_and_exact_version_filters(harness: Harness) {
    seed(
        &harness,
        &[
            ("io.github.u/s", "1.0.0"),
            ("io.github.u/s", "2.0.0"),
            ("io.github.u/other", "1.0.0"),
        ],
    )
    .await;

    let latest = harness
        .service
        .list_servers(
            &ServerFilter {
                is_latest: Some(true),
                ..ServerFilter::default()
            },
            None,
            0,
        )
        .await
        .expect("latest filter");
    assert_eq!(latest.servers.len(), 2);
    assert!(latest.servers.iter().all(|r| r.meta().is_latest));

    let exact = harness
        .service
        .list_servers(
            &ServerFilter {
                name: Some("io.github.u/s".to_owned()),
                version: Some("1.0.0".to_owned()),
                ..ServerFilter::default()
            },
            None,
            0,
        )
        .await
        .expect("exact filter");
    assert_eq!(exact.servers.len(), 1);
    assert_eq!(exact.servers[0].version(), "1.0.0");
}

#[rstest]
#[tokio::test]
async fn remote_url_filter_matches_exactly(harness: Harness) {
    harness
        .service
        .publish(descriptor_with_remote(
            "io.github.u/hosted",
            "1.0.0",
            "https://endpoint.example/mcp",
        ))
        .await
        .expect("publish hosted");
    harness
        .service
        .publish(descriptor("io.github.u/local", "1.0.0"))
        .await
        .expect("publish local");

    let page = harness
        .service
        .list_servers(
            &ServerFilter::by_remote_url("https://endpoint.example/mcp"),
            None,
            0,
        )
        .await
        .expect("remote filter");

    let names: Vec<&str> = page.servers.iter().map(|r| r.name()).collect();
    assert_eq!(names, ["io.github.u/hosted"]);
}

#[rstest]
#[tokio::test]
async fn cursor_pages_never_overlap_and_terminate(harness: Harness) {
    let names: Vec<String> = (0..5)
        .map(|i| format!("io.github.u/server-{i}"))
        .collect();
    for name in &names {
        harness
            .service
            .publish(descriptor(name, "1.0.0"))
            .await
            .expect("seed publish");
        harness.clock.advance_seconds(1);
    }

    let mut seen: Vec<String> = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0;
    loop {
        let page = harness
            .service
            .list_servers(&ServerFilter::default(), cursor.as_deref(), 2)
            .await
            .expect("page");
        for record in &page.servers {
            let key = format!("{}@{}", record.name(), record.version());
            assert!(!seen.contains(&key), "row {key} emitted twice");
            seen.push(key);
        }
        pages += 1;
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    assert_eq!(pages, 3, "5 rows at limit 2 take 3 pages");
    assert_eq!(seen.len(), names.len());
}

#[rstest]
#[tokio::test]
async fn non_positive_limit_falls_back_to_the_default(harness: Harness) {
    seed(
        &harness,
        &[
            ("io.github.u/a", "1.0.0"),
            ("io.github.u/b", "1.0.0"),
            ("io.github.u/c", "1.0.0"),
        ],
    )
    .await;

    let page = harness
        .service
        .list_servers(&ServerFilter::default(), None, -1)
        .await
        .expect("default limit");
    assert_eq!(page.servers.len(), 3);
    assert_eq!(page.next_cursor, None);
}

#[rstest]
#[tokio::test]
async fn foreign_cursor_tokens_are_invalid(harness: Harness) {
    let result = harness
        .service
        .list_servers(&ServerFilter::default(), Some("not-a-cursor"), 10)
        .await;
    assert!(matches!(
        result,
        Err(RegistryServiceError::Store(StoreError::Invalid(_)))
    ));
}
