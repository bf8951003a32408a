//! CLI command implementations.

use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};

use mnemo::cache::{CacheEntry, CacheLevel, CacheStore};
use mnemo::config::MnemoToml;
use mnemo::context::{ContextOptimizer, Message};
use mnemo::provider::registry::ModelRegistry;

use super::Cli;

fn load_config(cli: &Cli) -> Result<MnemoToml> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("mnemo.toml"));
    MnemoToml::load_or_default(&path)
}

fn build_registry(config: &MnemoToml) -> ModelRegistry {
    let mut registry = ModelRegistry::with_defaults();
    registry.merge(config.models.clone());
    registry
}

fn open_store(cli: &Cli, config: &MnemoToml) -> CacheStore {
    let root = cli.cache_dir.clone().unwrap_or_else(|| config.cache_root());
    let registry = build_registry(config);
    let cost = registry.cost_per_token(&config.cache.model);
    CacheStore::new(root).with_model(config.cache.model.clone(), cost)
}

fn parse_level(level: &str) -> Result<CacheLevel> {
    level.parse()
}

fn print_entry(entry: &CacheEntry) {
    println!(
        "{} {} [{}]",
        style(&entry.id).cyan(),
        entry.level,
        entry.tags.iter().cloned().collect::<Vec<_>>().join(", ")
    );
    if let Some(parent) = &entry.parent_id {
        println!("  parent: {}", parent);
    }
    println!("  created: {}", entry.metadata.created_at.to_rfc3339());
    if let Some(tokens) = entry.metadata.tokens_used {
        println!("  tokens: {}", tokens);
    }
    if let Some(cost) = entry.metadata.cost {
        println!("  cost: ${:.6}", cost);
    }
    println!("{}", entry.content);
}

pub async fn cmd_store(
    cli: &Cli,
    level: &str,
    tags: &[String],
    parent: Option<&str>,
    tokens: Option<u32>,
    content: Option<&str>,
) -> Result<()> {
    let level = parse_level(level)?;
    let config = load_config(cli)?;
    let store = open_store(cli, &config);

    let content = match content {
        Some(content) => content.to_string(),
        None => {
            use tokio::io::AsyncReadExt;
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read content from stdin")?;
            buf
        }
    };

    let entry = store
        .store(level, &content, tags, parent.map(|p| p.to_string()), tokens)
        .await?;
    println!("Stored {} at level {}", style(&entry.id).cyan(), level);
    Ok(())
}

pub async fn cmd_get(cli: &Cli, level: &str, id: &str) -> Result<()> {
    let level = parse_level(level)?;
    let config = load_config(cli)?;
    let store = open_store(cli, &config);

    match store.get(id, level).await {
        Some(entry) => print_entry(&entry),
        None => println!("Not found: {} at level {}", id, level),
    }
    Ok(())
}

pub async fn cmd_search(
    cli: &Cli,
    level: &str,
    threshold: Option<f32>,
    tags: &[String],
    query: &str,
) -> Result<()> {
    let level = parse_level(level)?;
    let config = load_config(cli)?;
    let store = open_store(cli, &config);

    let threshold = threshold.unwrap_or(config.cache.search_threshold);
    let tag_filter = (!tags.is_empty()).then_some(tags);
    let hits = store.search(query, level, tag_filter, threshold).await;

    if hits.is_empty() {
        println!("No entries above threshold {:.2}", threshold);
        return Ok(());
    }
    for hit in hits {
        println!(
            "{:.3}  {}  {}",
            hit.score,
            style(&hit.entry.id).cyan(),
            first_line(&hit.entry.content)
        );
    }
    Ok(())
}

pub async fn cmd_tags(cli: &Cli, level: &str, tags: &[String]) -> Result<()> {
    let level = parse_level(level)?;
    let config = load_config(cli)?;
    let store = open_store(cli, &config);

    let entries = store.find_by_tags(tags, level).await;
    if entries.is_empty() {
        println!("No entries carry all of: {}", tags.join(", "));
        return Ok(());
    }
    for entry in entries {
        println!(
            "{}  {}",
            style(&entry.id).cyan(),
            first_line(&entry.content)
        );
    }
    Ok(())
}

pub async fn cmd_hierarchy(cli: &Cli, level: &str, id: &str) -> Result<()> {
    let level = parse_level(level)?;
    let config = load_config(cli)?;
    let store = open_store(cli, &config);

    let chain = store.hierarchy(id, level).await;
    if chain.is_empty() {
        println!("Not found: {} at level {}", id, level);
        return Ok(());
    }
    for entry in &chain {
        let marker = if entry.id == id { ">" } else { " " };
        println!(
            "{} {} {}  {}",
            marker,
            entry.level,
            style(&entry.id).cyan(),
            first_line(&entry.content)
        );
    }
    Ok(())
}

pub async fn cmd_invalidate(cli: &Cli, level: &str, id: &str) -> Result<()> {
    let level = parse_level(level)?;
    let config = load_config(cli)?;
    let store = open_store(cli, &config);

    store.invalidate(id, level).await?;
    println!("Invalidated {} at level {}", id, level);
    Ok(())
}

pub async fn cmd_cleanup(cli: &Cli, max_age_days: Option<u32>) -> Result<()> {
    let config = load_config(cli)?;
    let store = open_store(cli, &config);

    let days = max_age_days.unwrap_or(config.cache.max_age_days);
    let report = store.cleanup(chrono::Duration::days(i64::from(days))).await;

    println!("{}", report.summary());
    for (level, removed) in &report.removed {
        println!("  {}: {} removed", level, removed);
    }
    for (level, failure) in &report.failures {
        println!("  {}: {}", level, style(failure).red());
    }
    Ok(())
}

pub async fn cmd_stats(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let store = open_store(cli, &config);

    let stats = store.stats().await;
    println!("Cache at {}", store.root().display());
    println!();
    println!("{:<12} {:>8} {:>12} {:>6}", "level", "entries", "bytes", "tags");
    for level in &stats.levels {
        println!(
            "{:<12} {:>8} {:>12} {:>6}",
            level.level.to_string(),
            level.entries,
            level.content_bytes,
            level.tags
        );
    }
    println!();
    println!("Total entries: {}", stats.total_entries());
    Ok(())
}

pub async fn cmd_optimize(
    cli: &Cli,
    file: &Path,
    max_tokens: Option<usize>,
    model: Option<&str>,
) -> Result<()> {
    let config = load_config(cli)?;
    let registry = build_registry(&config);

    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read message file {}", file.display()))?;
    let messages: Vec<Message> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse messages from {}", file.display()))?;

    let budget = match (max_tokens, model) {
        (Some(budget), _) => budget,
        (None, Some(model)) => registry.context_budget(model)?,
        (None, None) => registry.context_budget(&config.cache.model)?,
    };

    // The CLI carries no provider credentials, so optimization runs
    // without the summarization stage.
    let optimizer = ContextOptimizer::new(config.context.clone());
    let window = optimizer.optimize(&messages, budget).await;

    eprintln!(
        "{} of {} messages kept, {} / {} tokens",
        window.len(),
        messages.len(),
        window.total_tokens,
        budget
    );
    println!("{}", serde_json::to_string_pretty(&window)?);
    Ok(())
}

fn first_line(content: &str) -> &str {
    content.lines().next().unwrap_or("")
}
