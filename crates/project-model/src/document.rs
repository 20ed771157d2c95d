//! Portable project documents.
//!
//! A project document is a versioned JSON snapshot of a composition:
//!
//! ```json
//! { "version": "1.0", "scenes": [...], "settings": {...}, "exportedAt": "..." }
//! ```
//!
//! Reading a document only requires well-formed JSON whose values fit the
//! scene and settings shapes. The `version` field is recorded but never
//! checked; there is no upgrade or rejection of older documents.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use slidecast_common::artifact::ArtifactSink;
use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_common::notify::Notifier;

use crate::export::sanitize_filename;
use crate::scene::{Composition, CompositionSource, PresentationSettings, Scene};

/// Version stamped on every document written by this crate.
pub const DOCUMENT_VERSION: &str = "1.0";

/// MIME type of a serialized project document.
pub const DOCUMENT_MIME_TYPE: &str = "application/json";

/// The serialized form of a composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDocument {
    pub version: String,
    pub scenes: Vec<Scene>,
    pub settings: PresentationSettings,

    /// Export timestamp (RFC 3339).
    pub exported_at: String,
}

impl ProjectDocument {
    /// Pretty-printed JSON text.
    pub fn to_json(&self) -> SlidecastResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Consume the document, keeping only the composition.
    pub fn into_composition(self) -> Composition {
        Composition::new(self.scenes, self.settings)
    }
}

/// Snapshot a composition into a document stamped with the current version
/// and time.
pub fn serialize(composition: &Composition) -> ProjectDocument {
    ProjectDocument {
        version: DOCUMENT_VERSION.to_string(),
        scenes: composition.scenes.clone(),
        settings: composition.settings.clone(),
        exported_at: chrono::Utc::now().to_rfc3339(),
    }
}

/// Rebuild a composition from document text.
///
/// Fails with `InvalidDocument` if the text is not a JSON object, or if
/// `scenes`/`settings` hold values that cannot be read as such. Missing
/// fields fall back to an empty scene list and default settings.
pub fn deserialize(text: &str) -> SlidecastResult<Composition> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| SlidecastError::invalid_document(format!("not valid JSON: {e}")))?;

    let serde_json::Value::Object(mut fields) = value else {
        return Err(SlidecastError::invalid_document(
            "expected a JSON object at the top level",
        ));
    };

    if let Some(version) = fields.get("version").and_then(serde_json::Value::as_str) {
        tracing::debug!(version, "Reading project document");
    }

    let scenes = match fields.remove("scenes") {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(value) => serde_json::from_value(value)
            .map_err(|e| SlidecastError::invalid_document(format!("unreadable scenes: {e}")))?,
    };

    let settings = match fields.remove("settings") {
        None | Some(serde_json::Value::Null) => PresentationSettings::default(),
        Some(value) => serde_json::from_value(value)
            .map_err(|e| SlidecastError::invalid_document(format!("unreadable settings: {e}")))?,
    };

    Ok(Composition::new(scenes, settings))
}

/// Read and parse a document from disk.
pub fn read_project_file(path: impl AsRef<Path>) -> SlidecastResult<Composition> {
    let text = std::fs::read_to_string(path.as_ref())?;
    deserialize(&text)
}

/// Filename for a project document: `{filename}_project.json`.
pub fn project_filename(filename: &str) -> String {
    format!("{}_project.json", sanitize_filename(filename))
}

/// Serialize the source's current composition and hand it to `sink`.
pub fn export_project(
    source: &impl CompositionSource,
    filename: &str,
    sink: &dyn ArtifactSink,
    notifier: &dyn Notifier,
) -> SlidecastResult<PathBuf> {
    let name = project_filename(filename);
    let result = serialize(&source.snapshot())
        .to_json()
        .and_then(|json| sink.save(&name, DOCUMENT_MIME_TYPE, json.as_bytes()));

    match &result {
        Ok(path) => {
            tracing::info!(path = %path.display(), "Project exported");
            notifier.show_success(&format!("Project saved as {name}"));
        }
        Err(e) => {
            tracing::warn!(error = %e, "Project export failed");
            notifier.show_error(&format!("Could not save project: {e}"));
        }
    }
    result
}

/// Parse `text` and, only on success, replace the target's composition.
pub fn import_project(
    target: &mut impl CompositionSource,
    text: &str,
    notifier: &dyn Notifier,
) -> SlidecastResult<()> {
    match deserialize(text) {
        Ok(composition) => {
            tracing::info!(scenes = composition.scenes.len(), "Project imported");
            target.replace(composition);
            notifier.show_success("Project loaded");
            Ok(())
        }
        Err(e) => {
            tracing::warn!(error = %e, "Project import rejected");
            notifier.show_error(&format!("Could not load project: {e}"));
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use slidecast_common::artifact::DownloadDirSink;

    #[derive(Default)]
    struct RecordingNotifier {
        successes: Mutex<Vec<String>>,
        errors: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn show_success(&self, message: &str) {
            self.successes.lock().unwrap().push(message.to_string());
        }

        fn show_error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    fn sample_composition() -> Composition {
        let mut settings = PresentationSettings::default();
        settings.background_color = "#000000".to_string();
        settings
            .extra
            .insert("logo".to_string(), serde_json::json!({"corner": "top-left"}));
        Composition::new(
            vec![
                Scene::new(0, "Welcome", "Slidecast demo").with_duration(3.0),
                Scene::new(1, "Agenda", "One\nTwo\nThree"),
            ],
            settings,
        )
    }

    #[test]
    fn test_round_trip_preserves_scenes_and_settings() {
        let original = sample_composition();
        let json = serialize(&original).to_json().unwrap();
        let restored = deserialize(&json).unwrap();
        assert_eq!(restored.scenes, original.scenes);
        assert_eq!(restored.settings, original.settings);
    }

    #[test]
    fn test_document_uses_camel_case_keys() {
        let value = serde_json::to_value(serialize(&sample_composition())).unwrap();
        assert_eq!(value["version"], DOCUMENT_VERSION);
        assert!(value.get("exportedAt").is_some());
        assert!(value["settings"].get("backgroundColor").is_some());
    }

    #[test]
    fn test_unparseable_text_is_invalid_document() {
        let err = deserialize("{ scenes: oops").unwrap_err();
        assert!(matches!(err, SlidecastError::InvalidDocument { .. }));
    }

    #[test]
    fn test_non_object_is_invalid_document() {
        let err = deserialize("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, SlidecastError::InvalidDocument { .. }));
    }

    #[test]
    fn test_wrong_scene_shape_is_invalid_document() {
        let err = deserialize(r#"{"scenes": "not a list"}"#).unwrap_err();
        assert!(matches!(err, SlidecastError::InvalidDocument { .. }));
    }

    #[test]
    fn test_version_is_not_validated() {
        let json = r#"{"version":"99.7-future","scenes":[{"id":"s1","order":0,"title":"T","content":"","duration":2}]}"#;
        let composition = deserialize(json).unwrap();
        assert_eq!(composition.scenes.len(), 1);
        assert_eq!(composition.scenes[0].id, "s1");
        assert_eq!(composition.settings, PresentationSettings::default());
    }

    #[test]
    fn test_import_failure_leaves_composition_untouched() {
        let mut current = sample_composition();
        let before = current.clone();
        let notifier = RecordingNotifier::default();

        let result = import_project(&mut current, "definitely not json", &notifier);

        assert!(result.is_err());
        assert_eq!(current, before);
        assert_eq!(notifier.errors.lock().unwrap().len(), 1);
        assert!(notifier.successes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_import_replaces_without_merging() {
        let mut current = sample_composition();
        let notifier = RecordingNotifier::default();
        let incoming = r#"{"version":"1.0","scenes":[{"title":"Solo"}],"settings":{}}"#;

        import_project(&mut current, incoming, &notifier).unwrap();

        assert_eq!(current.scenes.len(), 1);
        assert_eq!(current.scenes[0].title, "Solo");
        assert_eq!(current.settings, PresentationSettings::default());
        assert_eq!(notifier.successes.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_export_then_read_back_from_disk() {
        let dir = std::env::temp_dir().join("slidecast_test_project_export");
        let _ = std::fs::remove_dir_all(&dir);
        let sink = DownloadDirSink::new(&dir);
        let notifier = RecordingNotifier::default();
        let composition = sample_composition();

        let path = export_project(&composition, "Team Sync!", &sink, &notifier).unwrap();
        assert_eq!(path, dir.join("Team_Sync__project.json"));

        let loaded = read_project_file(&path).unwrap();
        assert_eq!(loaded.scenes, composition.scenes);
        assert_eq!(notifier.successes.lock().unwrap().len(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }
}
