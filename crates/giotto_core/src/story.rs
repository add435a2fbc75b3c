//! Story artifacts exchanged with the narrative producer.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Upstream artifact: the outline every later stage expands from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct Story {
    /// Working title
    title: String,
    /// One-paragraph premise
    premise: String,
    /// Cast, in order of appearance
    #[builder(default)]
    #[serde(default)]
    characters: Vec<CharacterSheet>,
    /// Chapter outlines, numbered from 1
    #[builder(default)]
    #[serde(default)]
    chapters: Vec<ChapterOutline>,
}

impl Story {
    /// Start building a story.
    pub fn builder() -> StoryBuilder {
        StoryBuilder::default()
    }

    /// Find a chapter outline by number.
    pub fn chapter(&self, number: u32) -> Option<&ChapterOutline> {
        self.chapters.iter().find(|c| c.number == number)
    }

    /// Find a character by name or slug.
    pub fn character(&self, name: &str) -> Option<&CharacterSheet> {
        let wanted = slug(name);
        self.characters.iter().find(|c| c.slug() == wanted)
    }
}

/// A member of the cast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct CharacterSheet {
    /// Display name
    name: String,
    /// Visual description used for the reference portrait
    description: String,
}

impl CharacterSheet {
    /// Create a character sheet.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    /// File-safe key used as the job correlation and portrait name.
    pub fn slug(&self) -> String {
        slug(&self.name)
    }
}

/// Outline of one chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct ChapterOutline {
    /// 1-based chapter number
    number: u32,
    /// Chapter title
    title: String,
    /// What happens in the chapter
    summary: String,
}

impl ChapterOutline {
    /// Create a chapter outline.
    pub fn new(number: u32, title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            number,
            title: title.into(),
            summary: summary.into(),
        }
    }

    /// Correlation key of the chapter, e.g. `ch03`.
    pub fn key(&self) -> String {
        chapter_key(self.number)
    }
}

/// Chapter prose and its scene breakdown, written by the plot stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct ChapterDraft {
    /// 1-based chapter number
    number: u32,
    /// Chapter title
    title: String,
    /// Full prose
    text: String,
    /// Scenes to illustrate, in reading order
    #[serde(default)]
    scenes: Vec<Scene>,
}

impl ChapterDraft {
    /// Create a chapter draft.
    pub fn new(
        number: u32,
        title: impl Into<String>,
        text: impl Into<String>,
        scenes: Vec<Scene>,
    ) -> Self {
        Self {
            number,
            title: title.into(),
            text: text.into(),
            scenes,
        }
    }
}

/// One illustrated beat of a chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct Scene {
    /// Scene number as written by the producer; job keys use the scene's
    /// position in the draft instead
    id: u32,
    /// What the panel shows
    description: String,
    /// Names of the characters on panel
    #[serde(default)]
    characters: Vec<String>,
}

impl Scene {
    /// Create a scene.
    pub fn new(id: u32, description: impl Into<String>, characters: Vec<String>) -> Self {
        Self {
            id,
            description: description.into(),
            characters,
        }
    }
}

/// Inputs to a new run, persisted so a resume can retry the outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_", into)]
pub struct StoryInputs {
    /// What the story is about
    premise: String,
    /// Number of chapters to outline
    chapter_count: u32,
    /// Optional art or prose style hint
    #[serde(default)]
    style: Option<String>,
}

impl StoryInputs {
    /// Create inputs without a style hint.
    pub fn new(premise: impl Into<String>, chapter_count: u32) -> Self {
        Self {
            premise: premise.into(),
            chapter_count,
            style: None,
        }
    }
}

/// Correlation key of a chapter.
pub fn chapter_key(number: u32) -> String {
    format!("ch{:02}", number)
}

/// Correlation key of the scene at 1-based `position` within `chapter`.
///
/// ```
/// assert_eq!(giotto_core::scene_key(3, 2), "ch03_s02");
/// ```
pub fn scene_key(chapter: u32, position: u32) -> String {
    format!("{}_s{:02}", chapter_key(chapter), position)
}

/// Lowercase, dash-separated form of a name.
///
/// ```
/// assert_eq!(giotto_core::slug("Mara  Vance!"), "mara-vance");
/// ```
pub fn slug(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_keys_nest_under_chapter_keys() {
        assert_eq!(scene_key(3, 2), "ch03_s02");
        assert_eq!(ChapterOutline::new(12, "t", "s").key(), "ch12");
    }

    #[test]
    fn characters_are_found_by_slug() {
        let story = Story::builder()
            .title("The Keeper")
            .premise("A lighthouse keeper finds a map")
            .characters(vec![CharacterSheet::new("Mara Vance", "weathered, red coat")])
            .build()
            .unwrap();
        assert!(story.character("mara-vance").is_some());
        assert!(story.character("Mara Vance").is_some());
        assert!(story.character("Tomas").is_none());
    }

    #[test]
    fn drafts_without_scenes_deserialize() {
        let draft: ChapterDraft =
            serde_json::from_str(r#"{"number":1,"title":"Fog","text":"..."}"#).unwrap();
        assert!(draft.scenes().is_empty());
    }
}
