//! Shared fixtures for facade tests.
#![allow(dead_code)]

use async_trait::async_trait;
use giotto::{GiottoConfig, GiottoResult, MediaProvider, RawMedia};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const OUTLINE: &str = r#"
title = "The Keeper"
premise = "A lighthouse keeper finds a map"

[[characters]]
name = "Mara Vance"
description = "Lighthouse keeper, sixty, weathered"

[[chapters]]
title = "Fog"
summary = "A map washes ashore."

[[chapters.scenes]]
description = "Mara lifts the map from the surf"
characters = ["Mara Vance"]

[[chapters.scenes]]
description = "The lamp room at midnight"
characters = ["Mara Vance"]

[[chapters]]
title = "Tide"
summary = "Mara rows out to the marked rock."
"#;

/// Jobs produced by [`OUTLINE`]: 2 drafts, 1 portrait, 3 panels, 3 clips, 2 assemblies.
pub const OUTLINE_JOBS: usize = 11;

/// Config writing every file under `dir`.
pub fn config(dir: &Path) -> GiottoConfig {
    GiottoConfig::default()
        .with_base_dir(dir.join("runs"))
        .with_database_path(dir.join("db").join("giotto.db"))
}

pub fn write_outline(dir: &Path) -> PathBuf {
    let path = dir.join("outline.toml");
    std::fs::write(&path, OUTLINE).unwrap();
    path
}

pub fn write_fixtures(dir: &Path) -> PathBuf {
    let fixtures = dir.join("fixtures");
    std::fs::create_dir_all(&fixtures).unwrap();
    std::fs::write(fixtures.join(giotto::PORTRAIT_FIXTURE), b"portrait").unwrap();
    std::fs::write(fixtures.join(giotto::PANEL_FIXTURE), b"panel").unwrap();
    std::fs::write(fixtures.join(giotto::CLIP_FIXTURE), b"clip").unwrap();
    fixtures
}

/// Media provider returning the prompt as bytes.
#[derive(Default)]
pub struct EchoMedia {
    calls: AtomicUsize,
}

impl EchoMedia {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaProvider for EchoMedia {
    async fn generate(&self, prompt: &str, _reference: Option<&Path>) -> GiottoResult<RawMedia> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RawMedia::new(prompt.as_bytes().to_vec(), "image/png"))
    }

    fn provider_name(&self) -> &str {
        "echo"
    }
}
