use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// The single document tracking one song's progress through the wizard.
///
/// Persisted as camelCase JSON so session files written by older builds
/// (including the single-cover-image shape) stay readable through
/// [`migrate`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationState {
    pub topic: String,
    pub expanded_topic: String,
    pub style: Option<String>,
    pub instruments: Vec<String>,
    pub title: String,
    pub lyrics: String,
    pub cover_image_prompts: Vec<String>,
    pub cover_image_urls: Vec<String>,
    pub selected_cover_image_index: Option<usize>,
    pub thinking_message: String,
    pub report_introduction: String,
    /// Lyrics as they were when report content was last generated. Used to
    /// detect that the introduction/translation have gone stale.
    pub report_lyrics_snapshot: String,
    pub translated_lyrics: String,
    pub language: String,
    pub language2: String,
}

impl Default for GenerationState {
    fn default() -> Self {
        Self {
            topic: String::new(),
            expanded_topic: String::new(),
            style: None,
            instruments: Vec::new(),
            title: String::new(),
            lyrics: String::new(),
            cover_image_prompts: Vec::new(),
            cover_image_urls: Vec::new(),
            selected_cover_image_index: None,
            thinking_message: "AI is thinking...".to_string(),
            report_introduction: String::new(),
            report_lyrics_snapshot: String::new(),
            translated_lyrics: String::new(),
            language: "English".to_string(),
            language2: "English".to_string(),
        }
    }
}

impl GenerationState {
    pub fn set_topic(&mut self, topic: impl Into<String>) {
        self.topic = topic.into();
    }

    pub fn set_expanded_topic(&mut self, expanded: impl Into<String>) {
        self.expanded_topic = expanded.into();
    }

    /// Replacing the style invalidates the instrument selection: instrument
    /// names are only meaningful within the style they were picked for.
    pub fn set_style(&mut self, style: Option<String>) {
        self.style = style;
        self.instruments.clear();
    }

    pub fn set_instruments(&mut self, instruments: Vec<String>) {
        self.instruments = instruments;
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_lyrics(&mut self, lyrics: impl Into<String>) {
        self.lyrics = lyrics.into();
    }

    pub fn add_cover_image_prompt(&mut self, prompt: impl Into<String>) {
        self.cover_image_prompts.push(prompt.into());
    }

    /// Appends a cover and makes it the current selection.
    pub fn add_cover_image_url(&mut self, url: impl Into<String>) {
        self.selected_cover_image_index = Some(self.cover_image_urls.len());
        self.cover_image_urls.push(url.into());
    }

    pub fn set_cover_image_urls(&mut self, urls: Vec<String>) {
        self.cover_image_urls = urls;
    }

    pub fn set_cover_image_prompts(&mut self, prompts: Vec<String>) {
        self.cover_image_prompts = prompts;
    }

    pub fn set_selected_cover_image_index(&mut self, index: Option<usize>) {
        self.selected_cover_image_index = index;
    }

    pub fn set_thinking_message(&mut self, message: impl Into<String>) {
        self.thinking_message = message.into();
    }

    pub fn set_report_introduction(&mut self, text: impl Into<String>) {
        self.report_introduction = text.into();
    }

    pub fn set_report_lyrics_snapshot(&mut self, text: impl Into<String>) {
        self.report_lyrics_snapshot = text.into();
    }

    pub fn set_translated_lyrics(&mut self, text: impl Into<String>) {
        self.translated_lyrics = text.into();
    }

    pub fn set_languages(&mut self, primary: impl Into<String>, secondary: impl Into<String>) {
        self.language = primary.into();
        self.language2 = secondary.into();
    }
}

/// Upgrades a raw persisted document to the current shape. Each step is
/// gated on presence/absence checks so running it on an already-current
/// document changes nothing.
pub fn migrate(raw: Value) -> Value {
    let mut map = match raw {
        Value::Object(map) => map,
        other => return other,
    };

    // Old sessions stored a single cover image; wrap it into the list form.
    if map.contains_key("coverImageUrl") && !map.contains_key("coverImageUrls") {
        if let Some(url) = map.remove("coverImageUrl") {
            map.insert("coverImageUrls".to_string(), Value::Array(vec![url]));
        }
    }
    if map.contains_key("coverImagePrompt") && !map.contains_key("coverImagePrompts") {
        if let Some(prompt) = map.remove("coverImagePrompt") {
            map.insert("coverImagePrompts".to_string(), Value::Array(vec![prompt]));
        }
    }

    // Documents written before selection existed get the most recent image
    // selected, matching what add_cover_image_url would have done.
    let cover_count = map
        .get("coverImageUrls")
        .and_then(Value::as_array)
        .map(|urls| urls.len())
        .unwrap_or(0);
    if cover_count > 0 && !map.contains_key("selectedCoverImageIndex") {
        map.insert(
            "selectedCoverImageIndex".to_string(),
            Value::from(cover_count - 1),
        );
    }

    Value::Object(map)
}

/// Owns the in-memory document and its backing file. Every mutation goes
/// through a named setter that replaces the document and immediately writes
/// it back out; a write failure is logged and the session continues on the
/// in-memory copy.
pub struct StateStore {
    state: GenerationState,
    path: PathBuf,
    is_loading: bool,
}

impl StateStore {
    /// Hydrates the store from `path` if a session file exists there,
    /// applying [`migrate`] first. Unreadable or malformed files fall back
    /// to the default document; initialization never fails.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = Self::read_state(&path).unwrap_or_default();
        Self {
            state,
            path,
            is_loading: false,
        }
    }

    fn read_state(path: &Path) -> Option<GenerationState> {
        if !path.exists() {
            return None;
        }
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Failed to read session state {}: {}", path.display(), e);
                return None;
            }
        };
        let raw: Value = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Malformed session state {}: {}", path.display(), e);
                return None;
            }
        };
        // Missing fields in the migrated document fall back to defaults via
        // the container-level serde default.
        match serde_json::from_value(migrate(raw)) {
            Ok(state) => Some(state),
            Err(e) => {
                log::warn!("Session state {} has unusable shape: {}", path.display(), e);
                None
            }
        }
    }

    fn persist(&self) {
        let content = match serde_json::to_string_pretty(&self.state) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Failed to serialize session state: {}", e);
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = fs::create_dir_all(parent) {
                    log::warn!("Failed to create session folder {}: {}", parent.display(), e);
                    return;
                }
            }
        }
        if let Err(e) = fs::write(&self.path, content) {
            log::warn!("Failed to write session state {}: {}", self.path.display(), e);
        }
    }

    pub fn state(&self) -> &GenerationState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Busy flag for the UI. Not persisted as busy-ness, but turning it on
    /// routes the message into the document's thinking text.
    pub fn set_is_loading(&mut self, loading: bool, message: Option<&str>) {
        self.is_loading = loading;
        if loading {
            self.set_thinking_message(message.unwrap_or("AI is thinking..."));
        }
    }

    pub fn set_topic(&mut self, topic: impl Into<String>) {
        self.state.set_topic(topic);
        self.persist();
    }

    pub fn set_expanded_topic(&mut self, expanded: impl Into<String>) {
        self.state.set_expanded_topic(expanded);
        self.persist();
    }

    pub fn set_style(&mut self, style: Option<String>) {
        self.state.set_style(style);
        self.persist();
    }

    pub fn set_instruments(&mut self, instruments: Vec<String>) {
        self.state.set_instruments(instruments);
        self.persist();
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.state.set_title(title);
        self.persist();
    }

    pub fn set_lyrics(&mut self, lyrics: impl Into<String>) {
        self.state.set_lyrics(lyrics);
        self.persist();
    }

    pub fn add_cover_image_prompt(&mut self, prompt: impl Into<String>) {
        self.state.add_cover_image_prompt(prompt);
        self.persist();
    }

    pub fn add_cover_image_url(&mut self, url: impl Into<String>) {
        self.state.add_cover_image_url(url);
        self.persist();
    }

    pub fn set_cover_image_urls(&mut self, urls: Vec<String>) {
        self.state.set_cover_image_urls(urls);
        self.persist();
    }

    pub fn set_cover_image_prompts(&mut self, prompts: Vec<String>) {
        self.state.set_cover_image_prompts(prompts);
        self.persist();
    }

    pub fn set_selected_cover_image_index(&mut self, index: Option<usize>) {
        self.state.set_selected_cover_image_index(index);
        self.persist();
    }

    pub fn set_thinking_message(&mut self, message: impl Into<String>) {
        self.state.set_thinking_message(message);
        self.persist();
    }

    pub fn set_report_introduction(&mut self, text: impl Into<String>) {
        self.state.set_report_introduction(text);
        self.persist();
    }

    pub fn set_report_lyrics_snapshot(&mut self, text: impl Into<String>) {
        self.state.set_report_lyrics_snapshot(text);
        self.persist();
    }

    pub fn set_translated_lyrics(&mut self, text: impl Into<String>) {
        self.state.set_translated_lyrics(text);
        self.persist();
    }

    pub fn set_languages(&mut self, primary: impl Into<String>, secondary: impl Into<String>) {
        self.state.set_languages(primary, secondary);
        self.persist();
    }

    /// Clears the session file and restores the empty document.
    pub fn reset(&mut self) {
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                log::warn!("Failed to remove session state {}: {}", self.path.display(), e);
            }
        }
        self.state = GenerationState::default();
    }
}
