//! Counting fakes for pipeline tests.

#![allow(dead_code)]

use async_trait::async_trait;
use giotto_core::{
    ChapterDraft, ChapterOutline, CharacterSheet, JobType, Scene, Story, StoryInputs,
};
use giotto_database::SqliteStore;
use giotto_error::{GenerationError, GenerationErrorKind, GiottoResult};
use giotto_interface::{MediaProvider, RawMedia, StoryProducer};
use giotto_pipeline::{
    AssemblyHandler, ChapterHandler, MediaHandler, Orchestrator, OrchestratorConfig, StageWorker,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Story producer that counts calls and fails chapters on demand.
#[derive(Default)]
pub struct FakeProducer {
    outline_calls: AtomicUsize,
    outline_fails: AtomicBool,
    chapter_calls: Mutex<BTreeMap<u32, usize>>,
    failing: Mutex<BTreeSet<u32>>,
}

impl FakeProducer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_chapter(&self, n: u32) {
        self.failing.lock().unwrap().insert(n);
    }

    pub fn heal_chapter(&self, n: u32) {
        self.failing.lock().unwrap().remove(&n);
    }

    pub fn set_outline_fails(&self, fails: bool) {
        self.outline_fails.store(fails, Ordering::SeqCst);
    }

    pub fn outline_calls(&self) -> usize {
        self.outline_calls.load(Ordering::SeqCst)
    }

    pub fn chapter_calls(&self, n: u32) -> usize {
        self.chapter_calls.lock().unwrap().get(&n).copied().unwrap_or(0)
    }

    pub fn total_chapter_calls(&self) -> usize {
        self.chapter_calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl StoryProducer for FakeProducer {
    async fn outline(&self, inputs: &StoryInputs) -> GiottoResult<Story> {
        self.outline_calls.fetch_add(1, Ordering::SeqCst);
        if self.outline_fails.load(Ordering::SeqCst) {
            return Err(GenerationError::new(GenerationErrorKind::Provider {
                status_code: 503,
                message: "outline unavailable".into(),
            })
            .into());
        }
        let chapters = (1..=*inputs.chapter_count())
            .map(|n| ChapterOutline::new(n, format!("Chapter {}", n), format!("Summary {}", n)))
            .collect::<Vec<_>>();
        Ok(Story::builder()
            .title("The Keeper")
            .premise(inputs.premise().clone())
            .characters(vec![CharacterSheet::new("Mara Vance", "lighthouse keeper")])
            .chapters(chapters)
            .build()
            .unwrap())
    }

    async fn write_chapter(
        &self,
        _story: &Story,
        chapter: &ChapterOutline,
    ) -> GiottoResult<ChapterDraft> {
        let n = *chapter.number();
        *self.chapter_calls.lock().unwrap().entry(n).or_default() += 1;
        tokio::time::sleep(Duration::from_millis(5)).await;
        if self.failing.lock().unwrap().contains(&n) {
            return Err(GenerationError::new(GenerationErrorKind::Provider {
                status_code: 503,
                message: format!("chapter {} unavailable", n),
            })
            .into());
        }
        Ok(ChapterDraft::new(
            n,
            chapter.title(),
            format!("Text of chapter {}", n),
            vec![Scene::new(1, format!("Scene of chapter {}", n), vec!["Mara Vance".into()])],
        ))
    }

    fn producer_name(&self) -> &str {
        "fake"
    }
}

/// Media provider that counts calls and tracks how many run at once.
#[derive(Default)]
pub struct FakeMedia {
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeMedia {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaProvider for FakeMedia {
    async fn generate(&self, prompt: &str, _reference: Option<&Path>) -> GiottoResult<RawMedia> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(RawMedia::new(prompt.as_bytes().to_vec(), "image/png"))
    }

    fn provider_name(&self) -> &str {
        "fake-media"
    }
}

pub fn open_store(dir: &Path) -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open(dir.join("giotto.db")).unwrap())
}

pub fn base_dir(dir: &Path) -> PathBuf {
    dir.join("runs")
}

/// Orchestrator with every stage wired to the fakes.
pub fn orchestrator(
    store: Arc<SqliteStore>,
    producer: Arc<FakeProducer>,
    media: Arc<FakeMedia>,
    config: OrchestratorConfig,
) -> Orchestrator<SqliteStore, FakeProducer> {
    Orchestrator::new(store, Arc::clone(&producer), config)
        .with_stage(
            JobType::Plot,
            StageWorker::new(ChapterHandler::new(producer)).with_concurrency(3),
        )
        .with_stage(
            JobType::Character,
            StageWorker::new(MediaHandler::new(Arc::clone(&media), JobType::Character)),
        )
        .with_stage(
            JobType::Image,
            StageWorker::new(MediaHandler::new(Arc::clone(&media), JobType::Image))
                .with_concurrency(2),
        )
        .with_stage(
            JobType::Video,
            StageWorker::new(MediaHandler::new(media, JobType::Video)).with_concurrency(2),
        )
        .with_stage(JobType::PostProduction, StageWorker::new(AssemblyHandler::new()))
}
