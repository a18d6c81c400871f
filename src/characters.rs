use crate::config::ArtistConfig;
use std::fs;

/// An artist the image prompt should depict, with a one-line physical
/// description ready to paste into a text-to-image prompt.
#[derive(Debug, Clone)]
pub struct Artist {
    pub name: String,
    pub description: String,
}

const MISSING_DESCRIPTION: &str = "No physical description available.";

/// Pulls the `### Body Details` section out of an artist profile and
/// flattens it into a single prompt-ready line.
pub fn extract_body_details(markdown: &str) -> String {
    let marker = "### Body Details";
    let Some(start) = markdown.find(marker) else {
        return "Physical description not found.".to_string();
    };

    let mut section = &markdown[start + marker.len()..];
    if let Some(end) = section.find("\n## ") {
        section = &section[..end];
    }

    let mut text = section.replace("- **", "").replace("**:", ":");
    text = text.replace(';', ",").replace('*', "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves artist descriptions for prompt enrichment. Profile files are
/// optional, supplementary data: a missing or unreadable file logs a
/// warning and falls back to the description configured (or a stub), so
/// cover-art generation is never blocked on them.
pub fn resolve_artists(configs: &[ArtistConfig]) -> Vec<Artist> {
    configs
        .iter()
        .map(|cfg| {
            let fallback = cfg
                .description
                .clone()
                .unwrap_or_else(|| MISSING_DESCRIPTION.to_string());
            let description = match &cfg.profile {
                Some(path) => match fs::read_to_string(path) {
                    Ok(markdown) => extract_body_details(&markdown),
                    Err(e) => {
                        log::warn!("Failed to read artist profile {}: {}", path, e);
                        fallback
                    }
                },
                None => fallback,
            };
            Artist {
                name: cfg.name.clone(),
                description,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE: &str = "\
# Miranda

## Appearance

### Body Details
- **Hair**: deep espresso black; auburn highlights
- **Eyes**: warm dark hazel

## History

Irrelevant later section.
";

    #[test]
    fn extracts_and_flattens_body_details() {
        let desc = extract_body_details(PROFILE);
        assert_eq!(
            desc,
            "Hair: deep espresso black, auburn highlights Eyes: warm dark hazel"
        );
        assert!(!desc.contains("History"));
    }

    #[test]
    fn missing_marker_reports_not_found() {
        assert_eq!(
            extract_body_details("# Nothing here"),
            "Physical description not found."
        );
    }

    #[test]
    fn unreadable_profile_falls_back_to_configured_description() {
        let configs = vec![ArtistConfig {
            name: "Miranda Noor".to_string(),
            profile: Some("/nope/miranda.md".to_string()),
            description: Some("A bassist with auburn-highlighted hair.".to_string()),
        }];
        let artists = resolve_artists(&configs);
        assert_eq!(artists[0].description, "A bassist with auburn-highlighted hair.");
    }

    #[test]
    fn profile_file_wins_over_configured_description() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artist.md");
        std::fs::write(&path, PROFILE).unwrap();

        let configs = vec![ArtistConfig {
            name: "Miranda Noor".to_string(),
            profile: Some(path.to_string_lossy().to_string()),
            description: Some("unused".to_string()),
        }];
        let artists = resolve_artists(&configs);
        assert!(artists[0].description.starts_with("Hair:"));
    }
}
