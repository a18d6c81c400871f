use crate::report;
use crate::state::GenerationState;
use crate::styles::StyleCatalog;
use anyhow::{anyhow, bail, Context, Result};
use base64::Engine;
use futures_util::future::try_join_all;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use url::Url;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Verifies every asset the bundle needs is present, before any side
/// effect. A failure here produces a user-facing message and no file.
pub fn check_ready(state: &GenerationState) -> Result<()> {
    let mut missing = Vec::new();
    if state.title.is_empty() {
        missing.push("title");
    }
    if state.lyrics.is_empty() {
        missing.push("lyrics");
    }
    if state.instruments.is_empty() {
        missing.push("instruments");
    }
    if state.cover_image_urls.is_empty() {
        missing.push("cover image");
    }
    if state.selected_cover_image_index.is_none() {
        missing.push("cover selection");
    }
    if !missing.is_empty() {
        bail!(
            "Cannot download collection, some assets are missing: {}.",
            missing.join(", ")
        );
    }
    Ok(())
}

/// Resolves a cover image URL to PNG bytes. Data URLs are decoded in
/// place; http(s) URLs are fetched. Anything else is refused.
pub async fn fetch_cover_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    if let Some(rest) = url.strip_prefix("data:") {
        let payload = rest
            .split_once(";base64,")
            .map(|(_, data)| data)
            .ok_or_else(|| anyhow!("Unsupported data URL encoding"))?;
        return base64::engine::general_purpose::STANDARD
            .decode(payload)
            .context("Failed to decode cover image data");
    }

    let parsed = Url::parse(url).with_context(|| format!("Invalid cover image URL: {url}"))?;
    match parsed.scheme() {
        "http" | "https" => {
            let resp = client.get(parsed).send().await?;
            if !resp.status().is_success() {
                bail!("Cover image fetch failed with status {}", resp.status());
            }
            Ok(resp.bytes().await?.to_vec())
        }
        scheme => bail!("Unsupported cover image URL scheme: {scheme}"),
    }
}

/// Turns a title into a filesystem-safe stem, the way the download names
/// have always looked: non-alphanumerics become underscores.
pub fn slug(title: &str, fallback: &str) -> String {
    if title.is_empty() {
        return fallback.to_string();
    }
    title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Assembles the downloadable collection zip: the text artifacts, both
/// report renditions, and every cover image numbered in generation order.
/// All covers are resolved up front and concurrently; a single failure
/// aborts the operation with no archive written.
pub async fn write_bundle(
    client: &reqwest::Client,
    state: &GenerationState,
    catalog: &StyleCatalog,
    output_folder: &Path,
) -> Result<PathBuf> {
    check_ready(state)?;

    let covers = try_join_all(
        state
            .cover_image_urls
            .iter()
            .map(|url| fetch_cover_bytes(client, url)),
    )
    .await
    .context("Error creating zip file")?;

    let markdown_report = report::collection_markdown(state, catalog);
    let html_report = report::collection_bundle_html(state, catalog);
    let style_line = std::iter::once(state.style.clone().unwrap_or_default())
        .chain(state.instruments.iter().cloned())
        .collect::<Vec<_>>()
        .join(", ");

    let path = output_folder.join(format!("{}.zip", slug(&state.title, "song_collection")));
    let file = fs::File::create(&path)
        .with_context(|| format!("Failed to create bundle {}", path.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    zip.start_file("title.txt", options)?;
    zip.write_all(state.title.as_bytes())?;
    zip.start_file("lyrics.txt", options)?;
    zip.write_all(state.lyrics.as_bytes())?;
    zip.start_file("style_and_instruments.txt", options)?;
    zip.write_all(style_line.as_bytes())?;
    zip.start_file("report.md", options)?;
    zip.write_all(markdown_report.as_bytes())?;
    zip.start_file("report.html", options)?;
    zip.write_all(html_report.as_bytes())?;

    for (index, bytes) in covers.iter().enumerate() {
        zip.start_file(format!("cover-{}.png", index + 1), options)?;
        zip.write_all(bytes)?;
    }

    zip.finish()?;
    Ok(path)
}

/// Writes the chaptered report as a standalone Markdown document.
pub fn write_report(
    state: &GenerationState,
    catalog: &StyleCatalog,
    about: &str,
    output_folder: &Path,
) -> Result<PathBuf> {
    let markdown = report::chaptered_markdown(state, catalog, about);
    let path = output_folder.join(format!("{}.md", slug(&state.title, "song_report")));
    fs::write(&path, markdown)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    Ok(path)
}
