use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Where bundles and standalone reports are written.
    #[serde(default = "default_output")]
    pub output_folder: String,

    /// Holds the persisted session document (state.json).
    #[serde(default = "default_session")]
    pub session_folder: String,

    /// Path to the style catalog document.
    #[serde(default = "default_styles_file")]
    pub styles_file: String,

    /// The duet the generated songs are written for. Profiles are optional
    /// markdown files; without them the configured descriptions are used.
    #[serde(default = "default_artists")]
    pub artists: Vec<ArtistConfig>,

    /// Optional markdown file for the report's closing artist chapter.
    #[serde(default)]
    pub about_file: Option<String>,

    pub llm: LlmConfig,

    #[serde(default)]
    pub image: ImageConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ArtistConfig {
    pub name: String,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: String, // "gemini", "ollama" or "openai"
    pub gemini: Option<GeminiConfig>,
    pub ollama: Option<OllamaConfig>,
    pub openai: Option<OpenAIConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImageConfig {
    #[serde(default = "default_image_model")]
    pub model: String,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    /// Falls back to the Gemini text key when unset.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            model: default_image_model(),
            aspect_ratio: default_aspect_ratio(),
            api_key: None,
        }
    }
}

fn default_output() -> String {
    "output".to_string()
}
fn default_session() -> String {
    "session".to_string()
}
fn default_styles_file() -> String {
    "music-styles.json".to_string()
}
fn default_image_model() -> String {
    "imagen-3.0-generate-002".to_string()
}
fn default_aspect_ratio() -> String {
    "3:4".to_string()
}

fn default_artists() -> Vec<ArtistConfig> {
    vec![
        ArtistConfig {
            name: "Miranda Noor".to_string(),
            profile: None,
            description: Some(
                "A young woman of mixed Indian and Dutch heritage, with deep espresso \
                 black hair with auburn highlights, and warm dark hazel eyes. She plays \
                 a bass guitar."
                    .to_string(),
            ),
        },
        ArtistConfig {
            name: "Annelies Brink".to_string(),
            profile: None,
            description: Some(
                "A young woman of Dutch heritage, with light brown, shoulder-length \
                 hair and blue almond-shaped eyes. She has a calm and creative presence."
                    .to_string(),
            ),
        },
    ]
}

impl Config {
    /// First-run configuration: Gemini for text and images, everything else
    /// on defaults. Saved as the initial config.yml.
    pub fn bootstrap(api_key: String) -> Self {
        Self {
            output_folder: default_output(),
            session_folder: default_session(),
            styles_file: default_styles_file(),
            artists: default_artists(),
            about_file: None,
            llm: LlmConfig {
                provider: "gemini".to_string(),
                gemini: Some(GeminiConfig {
                    api_key,
                    model: "gemini-2.5-flash".to_string(),
                }),
                ollama: None,
                openai: None,
            },
            image: ImageConfig::default(),
        }
    }

    pub fn load() -> Result<Self> {
        let path = Path::new("config.yml");
        if !path.exists() {
            anyhow::bail!("config.yml not found. Please create one.");
        }

        let content = fs::read_to_string(path).context("Failed to read config.yml")?;
        let config: Config =
            serde_yaml_ng::from_str(&content).context("Failed to parse config.yml")?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write("config.yml", content).context("Failed to write config.yml")?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)?;
        fs::create_dir_all(&self.session_folder)?;
        Ok(())
    }

    pub fn state_path(&self) -> PathBuf {
        Path::new(&self.session_folder).join("state.json")
    }

    /// The credential used for image generation. Kept alongside the text
    /// key in config.yml, never inside the session document.
    pub fn image_api_key(&self) -> Option<&str> {
        self.image
            .api_key
            .as_deref()
            .or_else(|| self.llm.gemini.as_ref().map(|g| g.api_key.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_yaml_fills_defaults() {
        let yaml = "
llm:
  provider: gemini
  gemini:
    api_key: test-key
    model: gemini-2.5-flash
";
        let config: Config = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.output_folder, "output");
        assert_eq!(config.styles_file, "music-styles.json");
        assert_eq!(config.image.model, "imagen-3.0-generate-002");
        assert_eq!(config.image.aspect_ratio, "3:4");
        assert_eq!(config.artists.len(), 2);
        assert_eq!(config.image_api_key(), Some("test-key"));
    }

    #[test]
    fn bootstrap_round_trips_through_yaml() {
        let config = Config::bootstrap("a-key".to_string());
        let yaml = serde_yaml_ng::to_string(&config).unwrap();
        let parsed: Config = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(parsed.llm.provider, "gemini");
        assert_eq!(parsed.image_api_key(), Some("a-key"));
    }

    #[test]
    fn image_key_overrides_text_key() {
        let yaml = "
llm:
  provider: gemini
  gemini:
    api_key: text-key
    model: gemini-2.5-flash
image:
  api_key: image-key
";
        let config: Config = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.image_api_key(), Some("image-key"));
    }
}
