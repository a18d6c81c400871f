use crate::characters::Artist;
use crate::llm::{LlmClient, TextRequest};
use anyhow::{anyhow, Result};
use serde_json::Value;

/// Result of the combined title-and-lyrics call.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleAndLyrics {
    pub title: String,
    pub lyrics: String,
}

/// Expands the user's topic into the story the song will be based on.
pub async fn expand_topic(llm: &dyn LlmClient, topic: &str) -> Result<String> {
    let prompt = format!(
        "Expand the following user-provided topic or keywords into a rich, descriptive \
         paragraph of about 300-500 words. This will be used as the basis for a song. \
         Focus on imagery, emotion, and potential narrative arcs. Do not write lyrics, \
         just the underlying story and mood. User topic: \"{topic}\""
    );
    let request = TextRequest::new(prompt).with_system("You are a creative muse.");
    let text = llm.generate(&request).await?;
    Ok(text.trim().to_string())
}

/// Asks the model to pick the best-fitting style from the catalog. An
/// answer outside the catalog is logged and treated as "no suggestion",
/// never as a failure.
pub async fn suggest_style(
    llm: &dyn LlmClient,
    topic: &str,
    all_styles: &[String],
) -> Option<String> {
    let prompt = format!(
        "From the following list of music styles, which one best fits the song topic \
         provided below?\n\
         Your answer must be ONLY the style name, exactly as it appears in the list. \
         Do not add any other words, punctuation, or explanations.\n\n\
         Available Styles:\n{}\n\nSong Topic:\n\"{}\"\n",
        all_styles.join(", "),
        topic
    );

    let request = TextRequest::new(prompt).with_temperature(0.1);
    match llm.generate(&request).await {
        Ok(answer) => {
            let suggested = answer.trim().to_string();
            if all_styles.contains(&suggested) {
                Some(suggested)
            } else {
                log::warn!("Suggested style not in catalog: {:?}", suggested);
                None
            }
        }
        Err(e) => {
            log::error!("Style suggestion failed: {}", e);
            None
        }
    }
}

/// Generates the title and full lyrics in one call under a strict JSON
/// contract. Malformed or incomplete responses are logged with the raw
/// payload and surfaced as a data-format error the caller can show as-is.
pub async fn generate_title_and_lyrics(
    llm: &dyn LlmClient,
    topic: &str,
    style: &str,
    instruments: &[String],
    artists: &[Artist],
) -> Result<TitleAndLyrics> {
    let performer_names: Vec<&str> = artists.iter().map(|a| a.name.as_str()).collect();
    let part_tags: Vec<String> = performer_names
        .iter()
        .map(|name| format!("[{name}]"))
        .collect();
    let theme = if topic.is_empty() {
        "An uplifting song about friendship and creativity."
    } else {
        topic
    };

    let prompt = format!(
        "Write lyrics for a song to be performed by a female duet ({performers}).\n\
         The song is in the style of: {style}.\n\
         It should feature the following instruments: {instruments}.\n\
         The song's theme is based on this story:\n---\n{theme}\n---\n\
         Your task is to generate a suitable song title and the full song lyrics. To \
         ensure the song fits within typical generation limits (around 2-3 minutes \
         including instrumentals), please create a concise song structure.\n\
         For example, a good structure would be: [Intro], [Verse 1], [Chorus], \
         [Verse 2], [Chorus], [Bridge], [Instrumental Solo], [Chorus], [Outro].\n\
         Avoid overly long verses or too many repeating sections.\n\n\
         Follow these strict formatting rules:\n\
         - Use tags like [Intro], [Verse], [Chorus], [Bridge], [Outro], etc., to \
         structure the song.\n\
         - Indicate non-lyrical vocalizations like (oohs), (aahs).\n\
         - Use [Spoken Word] for spoken parts.\n\
         - Use *sound effect* for sound effects, like *thunder clap*.\n\
         - Clearly label parts for each singer: {part_tags}, or [Duet].\n\n\
         All musical or performance instructions MUST be enclosed in [] brackets. Do \
         NOT write descriptive sentences about the music within the lyrics. The lyrics \
         should only contain the words to be sung and the bracketed instructions.\n\n\
         Output a JSON object with two keys: \"title\" and \"lyrics\".\n\
         Do not include any other text or explanation outside of the JSON object.",
        performers = performer_names.join(" and "),
        instruments = instruments.join(", "),
        part_tags = part_tags.join(", "),
    );

    let request = TextRequest::new(prompt)
        .with_system("You are an expert songwriter. Return only valid JSON.")
        .expect_json();
    let response = llm.generate(&request).await?;
    parse_title_and_lyrics(&response)
}

/// Applies the JSON contract to a raw model response.
pub fn parse_title_and_lyrics(response: &str) -> Result<TitleAndLyrics> {
    let cleaned = strip_code_blocks(response);
    let parsed: Value = serde_json::from_str(&cleaned).map_err(|e| {
        log::error!("Unparseable title/lyrics payload ({}): {}", e, cleaned);
        anyhow!("AI returned invalid data format. Please try again.")
    })?;

    let title = parsed.get("title").and_then(Value::as_str);
    let lyrics = parsed.get("lyrics").and_then(Value::as_str);
    match (title, lyrics) {
        (Some(title), Some(lyrics)) => Ok(TitleAndLyrics {
            title: title.to_string(),
            lyrics: lyrics.to_string(),
        }),
        _ => {
            log::error!("Title/lyrics payload missing fields: {}", cleaned);
            Err(anyhow!(
                "AI returned data with missing title or lyrics. Please try again."
            ))
        }
    }
}

/// Builds the cover-art prompt for the image backend, weaving the duet's
/// descriptions, the song theme and the musical style into one scene.
pub async fn generate_image_prompt(
    llm: &dyn LlmClient,
    topic: &str,
    style: Option<&str>,
    artists: &[Artist],
) -> Result<String> {
    let subject_lines: Vec<String> = artists
        .iter()
        .map(|artist| format!("- **{}'s Description:** {}", artist.name, artist.description))
        .collect();
    let theme = if topic.is_empty() {
        "Two female musicians creating music together"
    } else {
        topic
    };

    let prompt = format!(
        "Create a single, detailed, high-quality image prompt for a \
         song's cover art.\n\n\
         **Core Subject:** The image MUST feature a female music duet (two young \
         women), performing together.\n{subjects}\n\n\
         **Overall Theme & Background:** The song's theme is: \"{theme}\". The \
         background and environment of the image must subtly reflect this theme. Do \
         not just put the topic in the background, but integrate it into the scene.\n\n\
         **Musical Style:** The music style is: {style}. Their clothing, expressions, \
         and the overall mood of the image should reflect this musical style.\n\n\
         **Instructions:**\n\
         - Combine all these elements into one cohesive, artistic scene.\n\
         - Describe their appearances based on the descriptions, their clothing, their \
         emotional expressions, and their interaction with each other.\n\
         - Use descriptive keywords that text-to-image models understand well: \
         cinematic composition, dramatic or soft lighting, photorealistic detail, \
         sharp focus, and an emotionally resonant mood.\n\n\
         Output only the final prompt as a single line of text. Do not include any \
         other explanations.",
        subjects = subject_lines.join("\n"),
        style = style.unwrap_or("Pop"),
    );

    let request = TextRequest::new(prompt)
        .with_system("You are an expert prompt engineer for text-to-image models.");
    let text = llm.generate(&request).await?;
    Ok(text.trim().to_string())
}

/// Writes the report's narrative opening chapter.
pub async fn generate_report_introduction(
    llm: &dyn LlmClient,
    title: &str,
    topic: &str,
    lyrics: &str,
) -> Result<String> {
    let prompt = format!(
        "Write the opening chapter of a report about a newly created song.\n\
         Song title: \"{title}\"\n\
         The song grew out of this idea: \"{topic}\"\n\
         Lyrics:\n---\n{lyrics}\n---\n\
         Write two to three warm, engaging paragraphs telling the story behind the \
         song: where the idea came from, what the lyrics explore, and what mood the \
         listener can expect. Plain prose only, no headings, no lists."
    );
    let request = TextRequest::new(prompt).with_system("You are a music journalist.");
    let text = llm.generate(&request).await?;
    Ok(text.trim().to_string())
}

/// Translates lyrics to English for the report's translation chapter,
/// keeping the structural bracket tags untouched.
pub async fn translate_lyrics(llm: &dyn LlmClient, lyrics: &str) -> Result<String> {
    let prompt = format!(
        "Translate the following song lyrics to English. Keep all bracketed structure \
         tags like [Verse] or [Chorus] exactly as they are, and keep the line breaks. \
         Output only the translated lyrics.\n---\n{lyrics}"
    );
    let text = llm.generate(&TextRequest::new(prompt)).await?;
    Ok(text.trim().to_string())
}

/// Models frequently wrap JSON answers in markdown fences; peel them off.
pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    if s.starts_with("```json") {
        s.trim_start_matches("```json")
            .trim_end_matches("```")
            .trim()
            .to_string()
    } else if s.starts_with("```") {
        s.trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
            .to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct ScriptedLlm {
        responses: Mutex<Vec<String>>,
        requests: Mutex<Vec<TextRequest>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().map(String::from).collect()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn generate(&self, request: &TextRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| anyhow!("no scripted response left"))
        }
    }

    #[test]
    fn strip_code_blocks_variants() {
        assert_eq!(strip_code_blocks("json"), "json");
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("  ```json  \n  {}  \n  ```  "), "{}");
    }

    #[test]
    fn parse_title_and_lyrics_success() {
        let parsed =
            parse_title_and_lyrics(r#"{"title": "Rain", "lyrics": "[Verse]\nFalling down"}"#)
                .unwrap();
        assert_eq!(parsed.title, "Rain");
        assert_eq!(parsed.lyrics, "[Verse]\nFalling down");
    }

    #[test]
    fn parse_title_and_lyrics_strips_fences() {
        let parsed =
            parse_title_and_lyrics("```json\n{\"title\": \"Rain\", \"lyrics\": \"la\"}\n```")
                .unwrap();
        assert_eq!(parsed.title, "Rain");
    }

    #[test]
    fn parse_title_and_lyrics_rejects_invalid_json() {
        let err = parse_title_and_lyrics("not json at all").unwrap_err();
        assert!(err.to_string().contains("invalid data format"));
    }

    #[test]
    fn parse_title_and_lyrics_rejects_missing_keys() {
        let err = parse_title_and_lyrics(r#"{"title": "Rain"}"#).unwrap_err();
        assert!(err.to_string().contains("missing title or lyrics"));
    }

    #[tokio::test]
    async fn suggest_style_rejects_answer_outside_catalog() {
        let llm = ScriptedLlm::new(vec!["Freeform Noise"]);
        let styles = vec!["Jazz".to_string(), "Synthwave".to_string()];
        assert_eq!(suggest_style(&llm, "rain", &styles).await, None);
    }

    #[tokio::test]
    async fn suggest_style_accepts_catalog_answer() {
        let llm = ScriptedLlm::new(vec!["  Jazz\n"]);
        let styles = vec!["Jazz".to_string(), "Synthwave".to_string()];
        assert_eq!(suggest_style(&llm, "rain", &styles).await.as_deref(), Some("Jazz"));
        // Deterministic pick: temperature pinned low.
        let requests = llm.requests.lock().unwrap();
        assert_eq!(requests[0].temperature, Some(0.1));
    }

    #[tokio::test]
    async fn title_and_lyrics_requests_json_mode() {
        let llm = ScriptedLlm::new(vec![r#"{"title": "Rain", "lyrics": "la"}"#]);
        let artists = vec![
            Artist {
                name: "Miranda Noor".to_string(),
                description: "bassist".to_string(),
            },
            Artist {
                name: "Annelies Brink".to_string(),
                description: "singer".to_string(),
            },
        ];
        let result = generate_title_and_lyrics(&llm, "rain", "Jazz", &["Piano".to_string()], &artists)
            .await
            .unwrap();
        assert_eq!(result.title, "Rain");

        let requests = llm.requests.lock().unwrap();
        assert!(requests[0].json);
        assert!(requests[0].prompt.contains("Miranda Noor and Annelies Brink"));
        assert!(requests[0].prompt.contains("Piano"));
    }

    #[tokio::test]
    async fn image_prompt_includes_artist_descriptions() {
        let llm = ScriptedLlm::new(vec!["a cinematic scene"]);
        let artists = vec![Artist {
            name: "Miranda Noor".to_string(),
            description: "hazel eyes, bass guitar".to_string(),
        }];
        let prompt = generate_image_prompt(&llm, "", Some("Jazz"), &artists)
            .await
            .unwrap();
        assert_eq!(prompt, "a cinematic scene");

        let requests = llm.requests.lock().unwrap();
        assert!(requests[0].prompt.contains("hazel eyes, bass guitar"));
        assert!(requests[0].prompt.contains("Jazz"));
        // Empty topic falls back to the neutral theme.
        assert!(requests[0]
            .prompt
            .contains("Two female musicians creating music together"));
    }
}
