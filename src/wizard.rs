use crate::bundle;
use crate::characters::{resolve_artists, Artist};
use crate::config::Config;
use crate::imagen::ImageClient;
use crate::llm::LlmClient;
use crate::report;
use crate::songwriter;
use crate::state::{GenerationState, StateStore};
use crate::styles::StyleCatalog;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Confirm, MultiSelect, Select, Text};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Topic,
    Languages,
    Style,
    Instruments,
    Lyrics,
    Cover,
    Collection,
}

/// Where to drop a returning user: the first wizard step whose output is
/// still missing from the persisted document.
pub fn first_incomplete_step(state: &GenerationState) -> Step {
    if state.topic.is_empty() {
        Step::Topic
    } else if state.style.is_none() {
        Step::Style
    } else if state.instruments.is_empty() {
        Step::Instruments
    } else if state.lyrics.is_empty() {
        Step::Lyrics
    } else if state.cover_image_urls.is_empty() {
        Step::Cover
    } else {
        Step::Collection
    }
}

/// Drives the whole creation flow: one step at a time, every choice
/// persisted as it is made, backend calls wrapped in a spinner and never
/// allowed to take the session down.
pub struct Wizard {
    config: Config,
    store: StateStore,
    catalog: StyleCatalog,
    llm: Box<dyn LlmClient>,
    imagen: Box<dyn ImageClient>,
    artists: Vec<Artist>,
    http: reqwest::Client,
}

impl Wizard {
    pub fn new(
        config: Config,
        store: StateStore,
        catalog: StyleCatalog,
        llm: Box<dyn LlmClient>,
        imagen: Box<dyn ImageClient>,
    ) -> Self {
        let artists = resolve_artists(&config.artists);
        Self {
            config,
            store,
            catalog,
            llm,
            imagen,
            artists,
            http: reqwest::Client::new(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut step = first_incomplete_step(self.store.state());
        if step != Step::Topic {
            println!("Resuming your session: \"{}\"", self.store.state().topic);
        }

        loop {
            let next = match step {
                Step::Topic => self.step_topic().await?,
                Step::Languages => self.step_languages()?,
                Step::Style => self.step_style().await?,
                Step::Instruments => self.step_instruments()?,
                Step::Lyrics => self.step_lyrics().await?,
                Step::Cover => self.step_cover().await?,
                Step::Collection => self.step_collection().await?,
            };
            match next {
                Some(next_step) => step = next_step,
                None => break,
            }
        }

        println!("See you next session.");
        Ok(())
    }

    fn spinner(&mut self, message: &str) -> ProgressBar {
        self.store.set_is_loading(true, Some(message));
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::default_spinner());
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    }

    fn finish_spinner(&mut self, bar: ProgressBar) {
        bar.finish_and_clear();
        self.store.set_is_loading(false, None);
    }

    async fn step_topic(&mut self) -> Result<Option<Step>> {
        println!("\n== What's the story? ==");
        let topic = Text::new("Song topic or keywords:")
            .with_initial_value(&self.store.state().topic.clone())
            .with_help_message("e.g. a lonely robot finding a friend, a summer rainstorm in the city")
            .prompt()?;
        if topic.trim().is_empty() {
            println!("A topic is needed to continue.");
            return Ok(Some(Step::Topic));
        }
        self.store.set_topic(topic.trim());

        if Confirm::new("Expand the topic into a richer story with AI?")
            .with_default(self.store.state().expanded_topic.is_empty())
            .prompt()?
        {
            let bar = self.spinner("Expanding your topic...");
            let result = songwriter::expand_topic(self.llm.as_ref(), &self.store.state().topic).await;
            self.finish_spinner(bar);
            match result {
                Ok(expanded) => {
                    println!("\n{}\n", expanded);
                    self.store.set_expanded_topic(expanded);
                }
                Err(e) => eprintln!("Failed to expand topic: {e}"),
            }
        }

        Ok(Some(Step::Languages))
    }

    fn step_languages(&mut self) -> Result<Option<Step>> {
        let primary = Text::new("Primary language of the song:")
            .with_initial_value(&self.store.state().language.clone())
            .prompt()?;
        let secondary = Text::new("Secondary language (same as primary if monolingual):")
            .with_initial_value(&self.store.state().language2.clone())
            .prompt()?;
        self.store.set_languages(primary.trim(), secondary.trim());
        Ok(Some(Step::Style))
    }

    async fn step_style(&mut self) -> Result<Option<Step>> {
        println!("\n== Find your sound ==");
        let keys = self.catalog.style_keys();
        if !self.catalog.loaded() || keys.is_empty() {
            println!("Style catalog is unavailable; enter a style by hand.");
            let style = Text::new("Music style:").prompt()?;
            self.store.set_style(Some(style.trim().to_string()));
            return Ok(Some(Step::Instruments));
        }

        const SUGGEST: &str = "(suggest one for my topic)";
        let mut options = vec![SUGGEST.to_string()];
        options.extend(keys.clone());
        let choice = Select::new("Pick a music style:", options).prompt()?;

        let style = if choice == SUGGEST {
            let topic = self.effective_topic();
            let bar = self.spinner("Listening for the right style...");
            let suggestion = songwriter::suggest_style(self.llm.as_ref(), &topic, &keys).await;
            self.finish_spinner(bar);
            match suggestion {
                Some(style) => {
                    println!("Suggested style: {style}");
                    style
                }
                None => {
                    println!("No usable suggestion came back; pick one yourself.");
                    Select::new("Pick a music style:", keys).prompt()?
                }
            }
        } else {
            choice
        };

        // Selecting a style resets any instruments picked for the old one.
        self.store.set_style(Some(style));
        Ok(Some(Step::Instruments))
    }

    fn step_instruments(&mut self) -> Result<Option<Step>> {
        let Some(style) = self.store.state().style.clone() else {
            return Ok(Some(Step::Style));
        };

        let Some(definition) = self.catalog.get(&style).cloned() else {
            let entered = Text::new("Instruments (comma separated):").prompt()?;
            let instruments: Vec<String> = entered
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            self.store.set_instruments(instruments);
            return Ok(Some(Step::Lyrics));
        };

        let labels: Vec<String> = definition
            .instruments
            .iter()
            .map(|i| format!("{} - {}", i.name, i.description))
            .collect();
        let defaults: Vec<usize> = definition
            .instruments
            .iter()
            .enumerate()
            .filter(|(_, i)| i.default)
            .map(|(index, _)| index)
            .collect();

        let picked = MultiSelect::new(&format!("Instruments for {style}:"), labels.clone())
            .with_default(&defaults)
            .prompt()?;

        let instruments: Vec<String> = definition
            .instruments
            .iter()
            .filter(|i| picked.iter().any(|label| label.starts_with(&format!("{} -", i.name))))
            .map(|i| i.name.clone())
            .collect();
        self.store.set_instruments(instruments);
        Ok(Some(Step::Lyrics))
    }

    async fn step_lyrics(&mut self) -> Result<Option<Step>> {
        println!("\n== Words and a name ==");
        if self.store.state().lyrics.is_empty() {
            self.generate_lyrics(LyricsMode::All).await;
        }

        loop {
            let state = self.store.state();
            println!("\nTitle: {}", if state.title.is_empty() { "(none)" } else { state.title.as_str() });
            if !state.lyrics.is_empty() {
                println!("\n{}\n", state.lyrics);
            }

            let action = Select::new(
                "Lyrics:",
                vec![
                    "Continue",
                    "Regenerate title and lyrics",
                    "Redo the title",
                    "Redo the lyrics",
                    "Back to instruments",
                    "Quit",
                ],
            )
            .prompt()?;

            match action {
                "Continue" => return Ok(Some(Step::Cover)),
                "Regenerate title and lyrics" => self.generate_lyrics(LyricsMode::All).await,
                "Redo the title" => self.generate_lyrics(LyricsMode::Title).await,
                "Redo the lyrics" => self.generate_lyrics(LyricsMode::Lyrics).await,
                "Back to instruments" => return Ok(Some(Step::Instruments)),
                _ => return Ok(None),
            }
        }
    }

    async fn generate_lyrics(&mut self, mode: LyricsMode) {
        // The busy flag is advisory; the wizard honors it at the trigger.
        if self.store.is_loading() {
            return;
        }
        let Some(style) = self.store.state().style.clone() else {
            eprintln!("Pick a style before generating lyrics.");
            return;
        };
        let topic = self.effective_topic();
        let instruments = self.store.state().instruments.clone();

        let message = match mode {
            LyricsMode::All => "Crafting title and lyrics...",
            LyricsMode::Title => "Rethinking the title...",
            LyricsMode::Lyrics => "Rewriting the lyrics...",
        };
        let bar = self.spinner(message);
        let result = songwriter::generate_title_and_lyrics(
            self.llm.as_ref(),
            &topic,
            &style,
            &instruments,
            &self.artists,
        )
        .await;
        self.finish_spinner(bar);

        match result {
            Ok(generated) => {
                if matches!(mode, LyricsMode::All | LyricsMode::Title) {
                    self.store.set_title(generated.title);
                }
                if matches!(mode, LyricsMode::All | LyricsMode::Lyrics) {
                    self.store.set_lyrics(generated.lyrics);
                }
            }
            Err(e) => eprintln!("Failed to generate content: {e}"),
        }
    }

    async fn step_cover(&mut self) -> Result<Option<Step>> {
        println!("\n== Album art ==");
        if self.store.state().cover_image_urls.is_empty() {
            self.generate_cover().await;
        }

        loop {
            let state = self.store.state();
            for (index, _) in state.cover_image_urls.iter().enumerate() {
                let marker = if state.selected_cover_image_index == Some(index) {
                    "*"
                } else {
                    " "
                };
                let prompt = state
                    .cover_image_prompts
                    .get(index)
                    .map(String::as_str)
                    .unwrap_or("(no prompt recorded)");
                println!(" {marker} Cover {}: {}", index + 1, snippet(prompt, 72));
            }

            let action = Select::new(
                "Cover art:",
                vec![
                    "Continue",
                    "Generate another cover",
                    "Select a different cover",
                    "Back to lyrics",
                    "Quit",
                ],
            )
            .prompt()?;

            match action {
                "Continue" => {
                    if self.store.state().selected_cover_image_index.is_none() {
                        println!("Select a cover before continuing.");
                        continue;
                    }
                    return Ok(Some(Step::Collection));
                }
                "Generate another cover" => self.generate_cover().await,
                "Select a different cover" => {
                    let count = self.store.state().cover_image_urls.len();
                    if count == 0 {
                        println!("No covers to select yet.");
                        continue;
                    }
                    let labels: Vec<String> =
                        (1..=count).map(|n| format!("Cover {n}")).collect();
                    let picked = Select::new("Which cover?", labels.clone()).prompt()?;
                    let index = labels.iter().position(|l| l == &picked);
                    self.store.set_selected_cover_image_index(index);
                }
                "Back to lyrics" => return Ok(Some(Step::Lyrics)),
                _ => return Ok(None),
            }
        }
    }

    async fn generate_cover(&mut self) {
        if self.store.is_loading() {
            return;
        }
        let topic = self.effective_topic();
        let style = self.store.state().style.clone();

        let bar = self.spinner("Generating image prompt...");
        let prompt_result = songwriter::generate_image_prompt(
            self.llm.as_ref(),
            &topic,
            style.as_deref(),
            &self.artists,
        )
        .await;
        let image_prompt = match prompt_result {
            Ok(prompt) => {
                self.store.add_cover_image_prompt(prompt.clone());
                prompt
            }
            Err(e) => {
                self.finish_spinner(bar);
                eprintln!("Failed to generate cover art: {e}");
                return;
            }
        };

        bar.set_message("Creating the cover image...");
        self.store
            .set_thinking_message("Creating the cover image...");
        let image_result = self.imagen.generate(&image_prompt).await;
        self.finish_spinner(bar);

        match image_result {
            Ok(url) => {
                self.store.add_cover_image_url(url);
                println!("Cover {} generated and selected.", self.store.state().cover_image_urls.len());
            }
            Err(e) => eprintln!("Failed to generate cover art: {e}"),
        }
    }

    async fn step_collection(&mut self) -> Result<Option<Step>> {
        println!("\n== Your collection ==");
        {
            let state = self.store.state();
            let style_line = std::iter::once(state.style.clone().unwrap_or_default())
                .chain(state.instruments.iter().cloned())
                .collect::<Vec<_>>()
                .join(", ");
            println!("Title: {}", if state.title.is_empty() { "(none)" } else { state.title.as_str() });
            println!("Style & instruments: {style_line}");
            println!("Covers: {}", state.cover_image_urls.len());
        }

        loop {
            let action = Select::new(
                "Collection:",
                vec![
                    "Download bundle (.zip)",
                    "Generate report (.md)",
                    "Save an HTML preview",
                    "Redo the report introduction",
                    "Back to cover art",
                    "Start a new session",
                    "Quit",
                ],
            )
            .prompt()?;

            match action {
                "Download bundle (.zip)" => {
                    let result = bundle::write_bundle(
                        &self.http,
                        self.store.state(),
                        &self.catalog,
                        Path::new(&self.config.output_folder),
                    )
                    .await;
                    match result {
                        Ok(path) => println!("Bundle written to {}", path.display()),
                        Err(e) => eprintln!("{e}"),
                    }
                }
                "Generate report (.md)" => {
                    self.refresh_report_content(false).await;
                    let about = self.about_content();
                    match bundle::write_report(
                        self.store.state(),
                        &self.catalog,
                        &about,
                        Path::new(&self.config.output_folder),
                    ) {
                        Ok(path) => println!("Report written to {}", path.display()),
                        Err(e) => eprintln!("{e}"),
                    }
                }
                "Save an HTML preview" => {
                    let which = Select::new(
                        "Which report?",
                        vec!["Collection report", "Chaptered report"],
                    )
                    .prompt()?;
                    // Preview HTML re-hydrates the cover placeholders into the
                    // actual data URLs so it renders on its own.
                    let body = if which == "Collection report" {
                        report::collection_preview_html(self.store.state(), &self.catalog)
                    } else {
                        self.refresh_report_content(false).await;
                        let about = self.about_content();
                        report::chaptered_preview_html(self.store.state(), &self.catalog, &about)
                    };
                    let state = self.store.state();
                    let title = if state.title.is_empty() {
                        "Untitled"
                    } else {
                        state.title.as_str()
                    };
                    let document =
                        report::html_document(&format!("Song Report: {title}"), &body);
                    let path = Path::new(&self.config.output_folder).join(format!(
                        "{}_preview.html",
                        bundle::slug(&state.title, "song_report")
                    ));
                    match fs::write(&path, document) {
                        Ok(()) => println!("Preview written to {}", path.display()),
                        Err(e) => eprintln!("Failed to write preview: {e}"),
                    }
                }
                "Redo the report introduction" => self.refresh_report_content(true).await,
                "Back to cover art" => return Ok(Some(Step::Cover)),
                "Start a new session" => {
                    if Confirm::new("Start a new session? All current progress will be lost.")
                        .with_default(false)
                        .prompt()?
                    {
                        self.store.reset();
                        return Ok(Some(Step::Topic));
                    }
                }
                _ => return Ok(None),
            }
        }
    }

    /// Regenerates the chaptered report's AI content when it is missing or
    /// the lyrics moved past the snapshot taken last time, or on demand.
    async fn refresh_report_content(&mut self, force: bool) {
        let state = self.store.state();
        let stale = report::report_is_stale(state);
        let needs_intro = force
            || (!state.title.is_empty() && (state.report_introduction.is_empty() || stale));
        let needs_translation = report::needs_translation(state)
            && !state.lyrics.is_empty()
            && (state.translated_lyrics.is_empty() || stale);

        if !needs_intro && !needs_translation {
            return;
        }

        if needs_translation {
            let lyrics = self.store.state().lyrics.clone();
            let bar = self.spinner("Translating the lyrics to English...");
            let result = songwriter::translate_lyrics(self.llm.as_ref(), &lyrics).await;
            self.finish_spinner(bar);
            match result {
                Ok(translation) => self.store.set_translated_lyrics(translation),
                Err(e) => eprintln!("Failed to translate lyrics: {e}"),
            }
        }

        if needs_intro {
            let (title, topic, lyrics) = {
                let state = self.store.state();
                (state.title.clone(), state.topic.clone(), state.lyrics.clone())
            };
            let bar = self.spinner("Writing the story behind the song...");
            let result =
                songwriter::generate_report_introduction(self.llm.as_ref(), &title, &topic, &lyrics)
                    .await;
            self.finish_spinner(bar);
            match result {
                Ok(introduction) => self.store.set_report_introduction(introduction),
                Err(e) => eprintln!("Failed to generate the introduction: {e}"),
            }
        }

        let lyrics = self.store.state().lyrics.clone();
        self.store.set_report_lyrics_snapshot(lyrics);
    }

    fn about_content(&self) -> String {
        if let Some(path) = &self.config.about_file {
            match fs::read_to_string(path) {
                Ok(content) => return content,
                Err(e) => log::warn!("Failed to read about file {}: {}", path, e),
            }
        }
        self.artists
            .iter()
            .map(|artist| format!("**{}**: {}", artist.name, artist.description))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn effective_topic(&self) -> String {
        let state = self.store.state();
        if state.expanded_topic.is_empty() {
            state.topic.clone()
        } else {
            state.expanded_topic.clone()
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum LyricsMode {
    All,
    Title,
    Lyrics,
}

fn snippet(text: &str, max: usize) -> String {
    let mut out: String = text.chars().take(max).collect();
    if text.chars().count() > max {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_lands_on_first_missing_step() {
        let mut state = GenerationState::default();
        assert_eq!(first_incomplete_step(&state), Step::Topic);

        state.topic = "rain".to_string();
        assert_eq!(first_incomplete_step(&state), Step::Style);

        state.style = Some("Jazz".to_string());
        assert_eq!(first_incomplete_step(&state), Step::Instruments);

        state.instruments = vec!["Piano".to_string()];
        assert_eq!(first_incomplete_step(&state), Step::Lyrics);

        state.lyrics = "la".to_string();
        assert_eq!(first_incomplete_step(&state), Step::Cover);

        state.cover_image_urls = vec!["data:,".to_string()];
        assert_eq!(first_incomplete_step(&state), Step::Collection);
    }

    #[test]
    fn snippet_truncates_long_prompts() {
        assert_eq!(snippet("short", 10), "short");
        assert_eq!(snippet("0123456789abc", 10), "0123456789...");
    }
}
