//! Offline story producer reading a hand-written TOML outline.
//!
//! ```toml
//! title = "The Keeper"
//!
//! [[characters]]
//! name = "Mara Vance"
//! description = "Lighthouse keeper, sixty, weathered"
//!
//! [[chapters]]
//! title = "Fog"
//! summary = "A map washes ashore."
//!
//! [[chapters.scenes]]
//! description = "Mara lifts the map from the surf"
//! characters = ["Mara Vance"]
//! ```
//!
//! Chapter numbers default to their position. When a drafts directory is
//! configured, `{dir}/ch01.json` is used verbatim as the draft of chapter 1.

use async_trait::async_trait;
use giotto_core::{
    ChapterDraft, ChapterOutline, CharacterSheet, Scene, Story, StoryInputs, chapter_key,
};
use giotto_error::{
    ConfigError, GiottoResult, JsonError, StorageError, StorageErrorKind,
};
use giotto_interface::StoryProducer;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Deserialize)]
struct OutlineFile {
    title: String,
    #[serde(default)]
    premise: Option<String>,
    #[serde(default)]
    characters: Vec<CharacterEntry>,
    #[serde(default)]
    chapters: Vec<ChapterEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct CharacterEntry {
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChapterEntry {
    #[serde(default)]
    number: Option<u32>,
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    scenes: Vec<SceneEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct SceneEntry {
    description: String,
    #[serde(default)]
    characters: Vec<String>,
}

/// [`StoryProducer`] backed by an outline file instead of a model.
#[derive(Debug, Clone)]
pub struct OutlineFileProducer {
    outline: OutlineFile,
    drafts_dir: Option<PathBuf>,
}

impl OutlineFileProducer {
    /// Load an outline from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> GiottoResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!("{}: {}", path.display(), e)))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse an outline from TOML text.
    pub fn from_toml_str(raw: &str) -> GiottoResult<Self> {
        let outline: OutlineFile = toml::from_str(raw)
            .map_err(|e| ConfigError::new(format!("Invalid outline: {}", e)))?;
        debug!(
            chapters = outline.chapters.len(),
            characters = outline.characters.len(),
            "Outline parsed"
        );
        Ok(Self {
            outline,
            drafts_dir: None,
        })
    }

    /// Prefer pre-written chapter drafts from `dir` when present.
    pub fn with_drafts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.drafts_dir = Some(dir.into());
        self
    }

    fn entry(&self, number: u32) -> Option<&ChapterEntry> {
        self.outline
            .chapters
            .iter()
            .enumerate()
            .find(|(i, c)| c.number.unwrap_or(*i as u32 + 1) == number)
            .map(|(_, c)| c)
    }

    async fn read_draft(&self, number: u32) -> GiottoResult<Option<ChapterDraft>> {
        let Some(dir) = &self.drafts_dir else {
            return Ok(None);
        };
        let path = dir.join(format!("{}.json", chapter_key(number)));
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
                .into());
            }
        };
        let draft = serde_json::from_slice(&raw)
            .map_err(|e| JsonError::in_file(&path, e))?;
        Ok(Some(draft))
    }
}

#[async_trait]
impl StoryProducer for OutlineFileProducer {
    async fn outline(&self, inputs: &StoryInputs) -> GiottoResult<Story> {
        let limit = match *inputs.chapter_count() {
            0 => usize::MAX,
            n => n as usize,
        };
        let chapters = self
            .outline
            .chapters
            .iter()
            .enumerate()
            .take(limit)
            .map(|(i, c)| {
                ChapterOutline::new(c.number.unwrap_or(i as u32 + 1), &c.title, &c.summary)
            })
            .collect::<Vec<_>>();
        let characters = self
            .outline
            .characters
            .iter()
            .map(|c| CharacterSheet::new(&c.name, &c.description))
            .collect::<Vec<_>>();

        Story::builder()
            .title(self.outline.title.clone())
            .premise(
                self.outline
                    .premise
                    .clone()
                    .unwrap_or_else(|| inputs.premise().clone()),
            )
            .characters(characters)
            .chapters(chapters)
            .build()
            .map_err(|e| ConfigError::new(format!("Incomplete outline: {}", e)).into())
    }

    async fn write_chapter(
        &self,
        story: &Story,
        chapter: &ChapterOutline,
    ) -> GiottoResult<ChapterDraft> {
        let number = *chapter.number();
        if let Some(draft) = self.read_draft(number).await? {
            return Ok(draft);
        }

        let entry = self.entry(number);
        let scenes = match entry {
            Some(entry) if !entry.scenes.is_empty() => entry
                .scenes
                .iter()
                .zip(1..)
                .map(|(s, id)| Scene::new(id, &s.description, s.characters.clone()))
                .collect(),
            _ => vec![Scene::new(
                1,
                chapter.summary(),
                story.characters().iter().map(|c| c.name().clone()).collect(),
            )],
        };
        let text = entry
            .and_then(|e| e.text.clone())
            .unwrap_or_else(|| chapter.summary().clone());

        Ok(ChapterDraft::new(number, chapter.title(), text, scenes))
    }

    fn producer_name(&self) -> &str {
        "outline-file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTLINE: &str = r#"
title = "The Keeper"

[[characters]]
name = "Mara Vance"
description = "keeper"

[[chapters]]
title = "Fog"
summary = "A map washes ashore."

[[chapters.scenes]]
description = "Mara lifts the map"
characters = ["Mara Vance"]

[[chapters]]
title = "Storm"
summary = "The light fails."
"#;

    #[tokio::test]
    async fn outline_truncates_to_requested_chapters() {
        let producer = OutlineFileProducer::from_toml_str(OUTLINE).unwrap();
        let story = producer
            .outline(&StoryInputs::new("a map", 1))
            .await
            .unwrap();
        assert_eq!(story.chapters().len(), 1);
        assert_eq!(story.premise(), "a map");
        assert_eq!(story.characters()[0].slug(), "mara-vance");
    }

    #[tokio::test]
    async fn chapters_without_scenes_get_one_from_the_summary() {
        let producer = OutlineFileProducer::from_toml_str(OUTLINE).unwrap();
        let story = producer
            .outline(&StoryInputs::new("a map", 2))
            .await
            .unwrap();

        let first = producer
            .write_chapter(&story, story.chapter(1).unwrap())
            .await
            .unwrap();
        assert_eq!(first.scenes()[0].description(), "Mara lifts the map");

        let second = producer
            .write_chapter(&story, story.chapter(2).unwrap())
            .await
            .unwrap();
        assert_eq!(second.scenes().len(), 1);
        assert_eq!(second.scenes()[0].characters(), &vec!["Mara Vance".to_string()]);
    }

    #[tokio::test]
    async fn drafts_dir_overrides_synthesis() {
        let dir = tempfile::tempdir().unwrap();
        let draft = ChapterDraft::new(1, "Fog", "Written by hand.", vec![]);
        std::fs::write(
            dir.path().join("ch01.json"),
            serde_json::to_vec(&draft).unwrap(),
        )
        .unwrap();

        let producer = OutlineFileProducer::from_toml_str(OUTLINE)
            .unwrap()
            .with_drafts_dir(dir.path());
        let story = producer.outline(&StoryInputs::new("a map", 2)).await.unwrap();
        let loaded = producer
            .write_chapter(&story, story.chapter(1).unwrap())
            .await
            .unwrap();
        assert_eq!(loaded, draft);
    }

    #[test]
    fn malformed_outline_is_config_error() {
        let err = OutlineFileProducer::from_toml_str("title = ").unwrap_err();
        assert!(err.to_string().contains("Invalid outline"));
    }
}
