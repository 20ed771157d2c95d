//! Scenes and compositions.
//!
//! A composition is the ordered list of timed scenes plus the global
//! presentation settings. It is owned by the editor (the composition
//! source); the capture engine only ever reads a frozen snapshot.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default scene length in seconds.
pub const DEFAULT_SCENE_DURATION_SECS: f64 = 5.0;

/// One timed unit of a composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    /// Stable identifier, unique within a composition and kept across reorders.
    #[serde(default = "new_scene_id")]
    pub id: String,

    /// Rank within the composition (lower plays first).
    #[serde(default)]
    pub order: u32,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub content: String,

    /// Display time in seconds.
    #[serde(default = "default_duration")]
    pub duration: f64,
}

impl Scene {
    /// Create a scene with a fresh id and the default duration.
    pub fn new(order: u32, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: new_scene_id(),
            order,
            title: title.into(),
            content: content.into(),
            duration: DEFAULT_SCENE_DURATION_SECS,
        }
    }

    /// Builder-style duration override.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration = secs;
        self
    }

    /// Duration as a `Duration`. Negative or non-finite values count as zero;
    /// values too large to represent saturate at `Duration::MAX`.
    pub fn play_time(&self) -> Duration {
        if self.duration.is_finite() && self.duration > 0.0 {
            Duration::try_from_secs_f64(self.duration).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }
}

/// Frame shape of the rendered composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Widescreen,
    #[serde(rename = "9:16")]
    Vertical,
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "1:1")]
    Square,
}

/// How one scene hands over to the next during playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    None,
    #[default]
    Fade,
    Slide,
}

/// Global presentation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PresentationSettings {
    pub aspect_ratio: AspectRatio,

    /// Background color as hex string (for example `#111827`).
    pub background_color: String,

    pub text_color: String,

    pub font_family: String,

    pub transition: Transition,

    /// Keys this model does not know about, kept so they survive a round trip.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for PresentationSettings {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::Widescreen,
            background_color: "#111827".to_string(),
            text_color: "#f9fafb".to_string(),
            font_family: "Inter".to_string(),
            transition: Transition::Fade,
            extra: serde_json::Map::new(),
        }
    }
}

/// The full set of scenes plus settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Composition {
    #[serde(default)]
    pub scenes: Vec<Scene>,

    #[serde(default)]
    pub settings: PresentationSettings,
}

impl Composition {
    pub fn new(scenes: Vec<Scene>, settings: PresentationSettings) -> Self {
        Self { scenes, settings }
    }

    /// Scenes in playback order. Equal ranks keep their list position.
    pub fn ordered_scenes(&self) -> Vec<&Scene> {
        let mut scenes: Vec<&Scene> = self.scenes.iter().collect();
        scenes.sort_by_key(|s| s.order);
        scenes
    }

    /// Sum of all scene durations, saturating at `Duration::MAX`.
    pub fn total_duration(&self) -> Duration {
        self.scenes
            .iter()
            .map(Scene::play_time)
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

/// The editor-side owner of the composition.
///
/// The capture engine reads one [`snapshot`](Self::snapshot) when a session
/// starts and never observes later edits. Loading a project document goes
/// through [`replace`](Self::replace); there is no merge.
pub trait CompositionSource {
    /// An owned copy of the current composition.
    fn snapshot(&self) -> Composition;

    /// Replace the whole composition.
    fn replace(&mut self, composition: Composition);
}

impl CompositionSource for Composition {
    fn snapshot(&self) -> Composition {
        self.clone()
    }

    fn replace(&mut self, composition: Composition) {
        *self = composition;
    }
}

fn new_scene_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_duration() -> f64 {
    DEFAULT_SCENE_DURATION_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_duration_sums_scenes() {
        let composition = Composition::new(
            vec![
                Scene::new(0, "Intro", "Hello").with_duration(4.0),
                Scene::new(1, "Body", "World").with_duration(6.5),
            ],
            PresentationSettings::default(),
        );
        assert_eq!(composition.total_duration(), Duration::from_millis(10_500));
    }

    #[test]
    fn test_invalid_durations_count_as_zero() {
        let composition = Composition::new(
            vec![
                Scene::new(0, "a", "").with_duration(-3.0),
                Scene::new(1, "b", "").with_duration(f64::NAN),
                Scene::new(2, "c", "").with_duration(2.0),
            ],
            PresentationSettings::default(),
        );
        assert_eq!(composition.total_duration(), Duration::from_secs(2));
    }

    #[test]
    fn test_huge_durations_saturate() {
        let single: Composition =
            serde_json::from_str(r#"{"scenes":[{"duration":1e20}]}"#).unwrap();
        assert_eq!(single.total_duration(), Duration::MAX);

        let pair: Composition =
            serde_json::from_str(r#"{"scenes":[{"duration":1e19},{"duration":1e19}]}"#).unwrap();
        assert_eq!(pair.total_duration(), Duration::MAX);
    }

    #[test]
    fn test_ordered_scenes_sorts_by_rank_stably() {
        let composition = Composition::new(
            vec![
                Scene::new(2, "third", ""),
                Scene::new(0, "first", ""),
                Scene::new(2, "fourth", ""),
                Scene::new(1, "second", ""),
            ],
            PresentationSettings::default(),
        );
        let titles: Vec<&str> = composition
            .ordered_scenes()
            .iter()
            .map(|s| s.title.as_str())
            .collect();
        assert_eq!(titles, ["first", "second", "third", "fourth"]);
    }

    #[test]
    fn test_scene_defaults_when_fields_missing() {
        let scene: Scene = serde_json::from_str(r#"{"title":"Only a title"}"#).unwrap();
        assert_eq!(scene.duration, DEFAULT_SCENE_DURATION_SECS);
        assert_eq!(scene.order, 0);
        assert!(!scene.id.is_empty());
    }

    #[test]
    fn test_new_scenes_get_distinct_ids() {
        let a = Scene::new(0, "a", "");
        let b = Scene::new(1, "b", "");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_settings_keep_unknown_keys() {
        let json = r##"{"aspectRatio":"9:16","backgroundColor":"#000","watermark":"corner"}"##;
        let settings: PresentationSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.aspect_ratio, AspectRatio::Vertical);
        assert_eq!(settings.text_color, "#f9fafb");
        assert_eq!(
            settings.extra.get("watermark"),
            Some(&serde_json::Value::String("corner".to_string()))
        );

        let back = serde_json::to_value(&settings).unwrap();
        assert_eq!(back["watermark"], "corner");
        assert_eq!(back["aspectRatio"], "9:16");
    }

    #[test]
    fn test_replace_swaps_whole_composition() {
        let mut current = Composition::new(
            vec![Scene::new(0, "old", "")],
            PresentationSettings::default(),
        );
        let incoming = Composition::default();
        current.replace(incoming.clone());
        assert_eq!(current, incoming);
    }
}
