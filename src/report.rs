use crate::markdown;
use crate::state::GenerationState;
use crate::styles::StyleCatalog;

pub const NO_LYRICS: &str = "No lyrics generated.";
pub const NO_INSTRUMENTS: &str = "No instruments selected.";
pub const NO_DESCRIPTION: &str = "No description available.";
pub const NO_INTRODUCTION: &str = "No introduction available.";
pub const NO_ABOUT: &str = "Artist information not available.";

/// The collection report that travels inside the zip bundle. Total over all
/// states: every missing field degrades to a fixed fallback line, never a
/// panic. Cover images are referenced by the `cover-N.png` convention so the
/// markdown works next to the bundle's real image files.
pub fn collection_markdown(state: &GenerationState, catalog: &StyleCatalog) -> String {
    let title = if state.title.is_empty() {
        "Untitled"
    } else {
        state.title.as_str()
    };

    let covers: Vec<String> = state
        .cover_image_urls
        .iter()
        .enumerate()
        .map(|(index, _)| format!("![Cover Art {n}](cover-{n}.png)", n = index + 1))
        .collect();

    let lyrics = if state.lyrics.is_empty() {
        NO_LYRICS
    } else {
        state.lyrics.as_str()
    };

    let document = format!(
        "# {title}\n\n\
         ## Style & Instruments\n\
         **Style:** {style}\n\
         {style_note}\
         ### Instruments\n\
         {instruments}\n\
         ---\n\
         ## Lyrics\n\
         ```\n\
         {lyrics}\n\
         ```\n\
         ---\n\
         ## Cover Art\n\
         {covers}\n",
        style = state.style.as_deref().unwrap_or("N/A"),
        style_note = style_note(state, catalog),
        instruments = instrument_lines(state, catalog),
        covers = covers.join("\n\n"),
    );

    normalize_indentation(&document)
}

/// HTML for previewing the collection report in-session: cover placeholders
/// are re-hydrated to the actual in-memory image URLs.
pub fn collection_preview_html(state: &GenerationState, catalog: &StyleCatalog) -> String {
    markdown::render(
        &collection_markdown(state, catalog),
        Some(&state.cover_image_urls),
    )
}

/// HTML for the zip bundle: placeholders stay relative filenames because the
/// real images sit next to report.html in the archive.
pub fn collection_bundle_html(state: &GenerationState, catalog: &StyleCatalog) -> String {
    let body = markdown::render(&collection_markdown(state, catalog), None);
    let title = if state.title.is_empty() {
        "Untitled"
    } else {
        state.title.as_str()
    };
    html_document(&format!("Song Report: {title}"), &body)
}

/// The extended report with narrative chapters. Optional chapters consume
/// the running counter so numbering stays contiguous whichever chapters are
/// present.
pub fn chaptered_markdown(state: &GenerationState, catalog: &StyleCatalog, about: &str) -> String {
    let title = if state.title.is_empty() {
        "Untitled"
    } else {
        state.title.as_str()
    };
    let introduction = if state.report_introduction.is_empty() {
        NO_INTRODUCTION
    } else {
        state.report_introduction.as_str()
    };
    let lyrics = if state.lyrics.is_empty() {
        NO_LYRICS
    } else {
        state.lyrics.as_str()
    };
    let about = if about.is_empty() { NO_ABOUT } else { about };

    let karaoke = plain_lyrics(&state.lyrics);
    let karaoke_panel = format!(
        "<div style=\"font-size: 1.25rem; line-height: 1.75rem; white-space: pre-wrap;\">{}</div>",
        karaoke.replace('\n', "<br />")
    );

    let mut chapter = 5;
    let translation_chapter = if has_translation(state) {
        let languages = if bilingual(state) {
            format!("{}, {}", state.language, state.language2)
        } else {
            state.language.clone()
        };
        let section = format!(
            "---\n\n\
             ## Chapter {chapter}: English Translation\n\
             **Original Language(s):** {languages}\n\
             ### Translated Lyrics\n\
             ```\n\
             {translated}\n\
             ```\n",
            translated = state.translated_lyrics,
        );
        chapter += 1;
        section
    } else {
        String::new()
    };

    let document = format!(
        "# Song Report: {title}\n\n\
         ## Chapter 1: The Story Behind the Song\n\
         {introduction}\n\n\
         ---\n\n\
         ## Chapter 2: Musical Blueprint\n\
         **Style: {style}**\n\
         {style_note}\
         ### Instruments\n\
         {instruments}\n\n\
         ---\n\n\
         ## Chapter 3: The Libretto\n\
         **Title:** {title}\n\
         ### Formatted Lyrics\n\
         ```\n\
         {lyrics}\n\
         ```\n\n\
         ---\n\n\
         ## Chapter 4: The Karaoke Session\n\
         ### Karaoke Lyrics\n\
         {karaoke_panel}\n\
         {translation_chapter}\
         ---\n\n\
         ## Chapter {chapter}: About the Artists\n\
         {about}\n",
        style = state.style.as_deref().unwrap_or("N/A"),
        style_note = style_note(state, catalog),
        instruments = instrument_lines(state, catalog),
    );

    normalize_indentation(&document)
}

pub fn chaptered_preview_html(
    state: &GenerationState,
    catalog: &StyleCatalog,
    about: &str,
) -> String {
    markdown::render(
        &chaptered_markdown(state, catalog, about),
        Some(&state.cover_image_urls),
    )
}

fn style_note(state: &GenerationState, catalog: &StyleCatalog) -> String {
    state
        .style
        .as_deref()
        .and_then(|key| catalog.get(key))
        .map(|definition| format!("> *{}*\n", definition.description))
        .unwrap_or_default()
}

fn instrument_lines(state: &GenerationState, catalog: &StyleCatalog) -> String {
    if state.instruments.is_empty() {
        return NO_INSTRUMENTS.to_string();
    }

    let style_info = state.style.as_deref().and_then(|key| catalog.get(key));
    state
        .instruments
        .iter()
        .map(|name| {
            let description = style_info
                .and_then(|info| info.instruments.iter().find(|i| &i.name == name))
                .map(|i| i.description.as_str())
                .unwrap_or(NO_DESCRIPTION);
            format!("- **{name}:** {description}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Strips performance markup from lyrics, leaving only singable text:
/// bracketed stage directions, parenthetical ad-libs and asterisk sound
/// effects go, blank lines collapse.
pub fn plain_lyrics(lyrics: &str) -> String {
    let stripped = strip_spans(&strip_spans(&strip_spans(lyrics, '[', ']'), '(', ')'), '*', '*');
    stripped
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Removes non-nested `open...close` spans; an unclosed opener is left in
/// place, matching lazy regex behavior.
fn strip_spans(text: &str, open: char, close: char) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(open) {
        match rest[start + open.len_utf8()..].find(close) {
            Some(len) => {
                out.push_str(&rest[..start]);
                rest = &rest[start + open.len_utf8() + len + close.len_utf8()..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

fn bilingual(state: &GenerationState) -> bool {
    !state.language.eq_ignore_ascii_case(&state.language2)
}

/// A translation chapter is warranted when at least one declared language
/// is not English.
pub fn needs_translation(state: &GenerationState) -> bool {
    let primary_english = state.language.eq_ignore_ascii_case("english");
    let secondary_english = state.language2.eq_ignore_ascii_case("english");
    !primary_english || (bilingual(state) && !secondary_english)
}

pub fn has_translation(state: &GenerationState) -> bool {
    needs_translation(state) && !state.translated_lyrics.is_empty()
}

/// Report content goes stale whenever the lyrics move past the snapshot
/// taken at the last generation.
pub fn report_is_stale(state: &GenerationState) -> bool {
    state.lyrics != state.report_lyrics_snapshot
}

/// Minimal standalone HTML shell around a rendered report body.
pub fn html_document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         <meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         <title>{title}</title>\n\
         <style>\n\
         body {{ font-family: sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; color: #222; }}\n\
         pre {{ background: #f2f2f2; padding: 1rem; border-radius: 6px; white-space: pre-wrap; }}\n\
         blockquote {{ border-left: 4px solid #ccc; margin-left: 0; padding-left: 1rem; color: #555; }}\n\
         img {{ max-width: 100%; border-radius: 8px; }}\n\
         </style>\n\
         </head>\n\
         <body>\n\
         {body}\n\
         </body>\n\
         </html>\n"
    )
}

fn normalize_indentation(document: &str) -> String {
    document
        .trim()
        .lines()
        .map(str::trim_start)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::styles::StyleGroup;

    fn jazz_catalog() -> StyleCatalog {
        let json = r#"[
            {
                "name": "Classic",
                "description": "Timeless forms",
                "styles": {
                    "Jazz": {
                        "description": "Smooth",
                        "instruments": [
                            { "name": "Piano", "description": "Keys" }
                        ]
                    }
                }
            }
        ]"#;
        let groups: Vec<StyleGroup> = serde_json::from_str(json).unwrap();
        StyleCatalog::from_groups(groups)
    }

    fn rain_state() -> GenerationState {
        GenerationState {
            title: "Rain".to_string(),
            lyrics: "[Verse]\nFalling down".to_string(),
            style: Some("Jazz".to_string()),
            instruments: vec!["Piano".to_string()],
            cover_image_urls: vec!["blob://1".to_string()],
            selected_cover_image_index: Some(0),
            ..GenerationState::default()
        }
    }

    #[test]
    fn collection_markdown_end_to_end() {
        let md = collection_markdown(&rain_state(), &jazz_catalog());
        assert!(md.contains("# Rain"));
        assert!(md.contains("**Style:** Jazz"));
        assert!(md.contains("> *Smooth*"));
        assert!(md.contains("- **Piano:** Keys"));
        assert!(md.contains("cover-1.png"));
        assert!(md.contains("[Verse]\nFalling down"));
    }

    #[test]
    fn collection_preview_rehydrates_cover_urls() {
        let html = collection_preview_html(&rain_state(), &jazz_catalog());
        assert_eq!(html.matches("<img").count(), 1);
        assert!(html.contains("src=\"blob://1\""));
        assert!(!html.contains("src=\"cover-1.png\""));
    }

    #[test]
    fn bundle_html_keeps_relative_filenames() {
        let html = collection_bundle_html(&rain_state(), &jazz_catalog());
        assert!(html.contains("src=\"cover-1.png\""));
        assert!(html.contains("<!DOCTYPE html>"));
        assert!(html.contains("<title>Song Report: Rain</title>"));
    }

    #[test]
    fn renderers_are_total_on_empty_state() {
        let state = GenerationState::default();
        let catalog = StyleCatalog::default();

        let md = collection_markdown(&state, &catalog);
        assert!(md.contains("# Untitled"));
        assert!(md.contains("**Style:** N/A"));
        assert!(md.contains(NO_INSTRUMENTS));
        assert!(md.contains(NO_LYRICS));

        let chaptered = chaptered_markdown(&state, &catalog, "");
        assert!(chaptered.contains(NO_INTRODUCTION));
        assert!(chaptered.contains(NO_ABOUT));

        // HTML rendering terminates and carries the fallbacks through.
        assert!(collection_preview_html(&state, &catalog).contains(NO_LYRICS));
        assert!(chaptered_preview_html(&state, &catalog, "").contains(NO_INTRODUCTION));
    }

    #[test]
    fn unknown_instrument_gets_fallback_description() {
        let mut state = rain_state();
        state.instruments.push("Theremin".to_string());
        let md = collection_markdown(&state, &jazz_catalog());
        assert!(md.contains("- **Theremin:** No description available."));
    }

    #[test]
    fn plain_lyrics_strips_performance_markup() {
        let lyrics = "[Verse 1]\nHello there (oohs)\n*thunder clap*\n\n[Chorus]\nStill here";
        assert_eq!(plain_lyrics(lyrics), "Hello there\nStill here");
    }

    #[test]
    fn plain_lyrics_keeps_unclosed_markers() {
        assert_eq!(plain_lyrics("a [b\nc"), "a [b\nc");
    }

    #[test]
    fn translation_needed_only_for_non_english() {
        let mut state = GenerationState::default();
        assert!(!needs_translation(&state));

        state.language = "Dutch".to_string();
        assert!(needs_translation(&state));

        state.language = "English".to_string();
        state.language2 = "Hindi".to_string();
        assert!(needs_translation(&state));

        state.language2 = "ENGLISH".to_string();
        assert!(!needs_translation(&state));
    }

    #[test]
    fn translation_chapter_keeps_numbering_contiguous() {
        let mut state = rain_state();
        let catalog = jazz_catalog();

        let without = chaptered_markdown(&state, &catalog, "about text");
        assert!(without.contains("## Chapter 5: About the Artists"));
        assert!(!without.contains("English Translation"));

        state.language = "Dutch".to_string();
        state.translated_lyrics = "Falling down, translated".to_string();
        let with = chaptered_markdown(&state, &catalog, "about text");
        assert!(with.contains("## Chapter 5: English Translation"));
        assert!(with.contains("**Original Language(s):** Dutch"));
        assert!(with.contains("## Chapter 6: About the Artists"));
    }

    #[test]
    fn untranslated_non_english_song_omits_chapter() {
        let mut state = rain_state();
        state.language = "Dutch".to_string();
        let md = chaptered_markdown(&state, &jazz_catalog(), "");
        assert!(!md.contains("English Translation"));
    }

    #[test]
    fn staleness_follows_lyrics_snapshot() {
        let mut state = rain_state();
        assert!(report_is_stale(&state));

        state.report_lyrics_snapshot = state.lyrics.clone();
        assert!(!report_is_stale(&state));

        state.lyrics = "new words".to_string();
        assert!(report_is_stale(&state));
    }

    #[test]
    fn karaoke_panel_passes_through_html_render() {
        let state = rain_state();
        let html = chaptered_preview_html(&state, &jazz_catalog(), "");
        assert!(html.contains("<div style="));
        assert!(!html.contains("<p><div"));
        assert!(html.contains("Falling down"));
    }
}
