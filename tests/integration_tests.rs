//! Integration tests for mnemo
//!
//! These drive the CLI end-to-end against temporary cache roots.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

use mnemo::cache::compute_id;
use mnemo::context::{Message, Role};

/// Helper to create a mnemo Command
fn mnemo() -> Command {
    cargo_bin_cmd!("mnemo")
}

/// Helper to create a temporary cache root
fn create_temp_cache() -> TempDir {
    TempDir::new().unwrap()
}

fn store(cache: &TempDir, level: &str, content: &str, tags: &[&str]) {
    let mut cmd = mnemo();
    cmd.arg("store")
        .arg("--cache-dir")
        .arg(cache.path())
        .arg("--level")
        .arg(level);
    for tag in tags {
        cmd.arg("--tag").arg(tag);
    }
    cmd.arg(content).assert().success();
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_mnemo_help() {
        mnemo().arg("--help").assert().success();
    }

    #[test]
    fn test_mnemo_version() {
        mnemo().arg("--version").assert().success();
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        let cache = create_temp_cache();
        mnemo()
            .arg("store")
            .arg("--cache-dir")
            .arg(cache.path())
            .arg("--level")
            .arg("hot")
            .arg("content")
            .assert()
            .failure();
    }
}

// =============================================================================
// Cache Flow Tests
// =============================================================================

mod cache_flow {
    use super::*;

    #[test]
    fn test_store_then_get() {
        let cache = create_temp_cache();
        let content = "hello from the cache";
        store(&cache, "raw", content, &["greeting"]);

        let id = compute_id(content);
        mnemo()
            .arg("get")
            .arg("--cache-dir")
            .arg(cache.path())
            .arg("--level")
            .arg("raw")
            .arg(&id)
            .assert()
            .success()
            .stdout(predicate::str::contains(content))
            .stdout(predicate::str::contains("greeting"));
    }

    #[test]
    fn test_store_prints_the_content_id() {
        let cache = create_temp_cache();
        let content = "identified content";
        let id = compute_id(content);

        mnemo()
            .arg("store")
            .arg("--cache-dir")
            .arg(cache.path())
            .arg(content)
            .assert()
            .success()
            .stdout(predicate::str::contains(&id));
    }

    #[test]
    fn test_store_is_idempotent() {
        let cache = create_temp_cache();
        store(&cache, "raw", "same content twice", &[]);
        store(&cache, "raw", "same content twice", &[]);

        mnemo()
            .arg("stats")
            .arg("--cache-dir")
            .arg(cache.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("Total entries: 1"));
    }

    #[test]
    fn test_tag_conjunction_returns_exact_matches() {
        let cache = create_temp_cache();
        store(&cache, "raw", "only a", &["a"]);
        store(&cache, "raw", "both a and b", &["a", "b"]);
        store(&cache, "raw", "only b", &["b"]);

        mnemo()
            .arg("tags")
            .arg("--cache-dir")
            .arg(cache.path())
            .arg("--level")
            .arg("raw")
            .arg("a")
            .arg("b")
            .assert()
            .success()
            .stdout(predicate::str::contains(compute_id("both a and b")))
            .stdout(predicate::str::contains(compute_id("only a")).not())
            .stdout(predicate::str::contains(compute_id("only b")).not());
    }

    #[test]
    fn test_search_finds_similar_entries() {
        let cache = create_temp_cache();
        store(&cache, "raw", "how to parse json in rust", &[]);
        store(&cache, "raw", "gardening tips for spring", &[]);

        mnemo()
            .arg("search")
            .arg("--cache-dir")
            .arg(cache.path())
            .arg("--level")
            .arg("raw")
            .arg("how to parse json in rust?")
            .assert()
            .success()
            .stdout(predicate::str::contains(compute_id("how to parse json in rust")))
            .stdout(predicate::str::contains(compute_id("gardening tips for spring")).not());
    }

    #[test]
    fn test_hierarchy_lists_parent_and_child() {
        let cache = create_temp_cache();
        let parent = "the raw model response";
        store(&cache, "raw", parent, &[]);
        let parent_id = compute_id(parent);

        let child = "a structured extraction";
        mnemo()
            .arg("store")
            .arg("--cache-dir")
            .arg(cache.path())
            .arg("--level")
            .arg("structured")
            .arg("--parent")
            .arg(&parent_id)
            .arg(child)
            .assert()
            .success();

        mnemo()
            .arg("hierarchy")
            .arg("--cache-dir")
            .arg(cache.path())
            .arg("--level")
            .arg("raw")
            .arg(&parent_id)
            .assert()
            .success()
            .stdout(predicate::str::contains(&parent_id))
            .stdout(predicate::str::contains(compute_id(child)));
    }

    #[test]
    fn test_cleanup_zero_age_empties_the_cache() {
        let cache = create_temp_cache();
        store(&cache, "raw", "soon gone", &["t"]);
        store(&cache, "summary", "also gone", &["t"]);

        mnemo()
            .arg("cleanup")
            .arg("--cache-dir")
            .arg(cache.path())
            .arg("--max-age-days")
            .arg("0")
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed 2 entries"));

        mnemo()
            .arg("stats")
            .arg("--cache-dir")
            .arg(cache.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("Total entries: 0"));
    }

    #[test]
    fn test_invalidate_then_get_reports_absent() {
        let cache = create_temp_cache();
        let content = "to be removed";
        store(&cache, "raw", content, &[]);
        let id = compute_id(content);

        mnemo()
            .arg("invalidate")
            .arg("--cache-dir")
            .arg(cache.path())
            .arg(&id)
            .assert()
            .success();

        mnemo()
            .arg("get")
            .arg("--cache-dir")
            .arg(cache.path())
            .arg(&id)
            .assert()
            .success()
            .stdout(predicate::str::contains("Not found"));
    }
}

// =============================================================================
// Context Optimization Tests
// =============================================================================

mod optimize {
    use super::*;

    fn write_messages(dir: &TempDir, messages: &[Message]) -> std::path::PathBuf {
        let path = dir.path().join("messages.json");
        std::fs::write(&path, serde_json::to_string(messages).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_optimize_empty_history() {
        let dir = create_temp_cache();
        let path = write_messages(&dir, &[]);

        mnemo()
            .arg("optimize")
            .arg(&path)
            .arg("--max-tokens")
            .arg("1000")
            .assert()
            .success()
            .stdout(predicate::str::contains("\"total_tokens\": 0"));
    }

    #[test]
    fn test_optimize_respects_the_budget() {
        let dir = create_temp_cache();
        let messages: Vec<Message> = (0..20)
            .map(|i| Message::new(Role::User, format!("message {} {}", i, "pad ".repeat(100))))
            .collect();
        let path = write_messages(&dir, &messages);

        let output = mnemo()
            .arg("optimize")
            .arg(&path)
            .arg("--max-tokens")
            .arg("500")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        let window: serde_json::Value = serde_json::from_slice(&output).unwrap();
        let total = window["total_tokens"].as_u64().unwrap();
        assert!(total <= 500, "window used {} tokens", total);
        assert!(!window["messages"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_optimize_uses_the_model_catalog_budget() {
        let dir = create_temp_cache();
        let messages = vec![Message::new(Role::User, "short history")];
        let path = write_messages(&dir, &messages);

        mnemo()
            .arg("optimize")
            .arg(&path)
            .arg("--model")
            .arg("claude-3-5-haiku")
            .assert()
            .success()
            .stdout(predicate::str::contains("short history"));
    }

    #[test]
    fn test_optimize_unknown_model_fails() {
        let dir = create_temp_cache();
        let path = write_messages(&dir, &[]);

        mnemo()
            .arg("optimize")
            .arg(&path)
            .arg("--model")
            .arg("not-a-model")
            .assert()
            .failure()
            .stderr(predicate::str::contains("not-a-model"));
    }
}
