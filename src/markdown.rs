//! Minimal Markdown renderer for the report pipeline.
//!
//! Parses the subset of Markdown the report assembler emits into a small
//! block/inline tree, then renders that tree to HTML. Splitting parse from
//! render keeps the emphasis rules unambiguous (bold is matched before
//! italic) and lets consecutive bullet lines land in a single list.

/// Inline content inside a heading, bullet, blockquote or paragraph line.
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text(String),
    Bold(Vec<Inline>),
    Italic(Vec<Inline>),
    Image { alt: String, target: String },
    Link { text: String, href: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: u8, content: Vec<Inline> },
    Rule,
    Code(String),
    Blockquote(Vec<Inline>),
    List(Vec<Vec<Inline>>),
    Image { alt: String, target: String },
    /// A chunk that already is HTML (the karaoke lyrics panel); passed
    /// through without paragraph wrapping.
    RawHtml(String),
    /// Lines of one paragraph; rendered with `<br />` between them.
    Paragraph(Vec<Vec<Inline>>),
}

pub fn parse(text: &str) -> Vec<Block> {
    let lines: Vec<&str> = text.lines().collect();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();

        if trimmed.is_empty() {
            i += 1;
            continue;
        }

        if trimmed.starts_with("```") {
            let mut body = Vec::new();
            i += 1;
            while i < lines.len() && !lines[i].trim().starts_with("```") {
                body.push(lines[i]);
                i += 1;
            }
            i += 1; // closing fence (or EOF)
            blocks.push(Block::Code(body.join("\n")));
            continue;
        }

        if let Some(rest) = heading_text(trimmed) {
            blocks.push(Block::Heading {
                level: rest.0,
                content: parse_inlines(rest.1),
            });
            i += 1;
            continue;
        }

        if trimmed == "---" {
            blocks.push(Block::Rule);
            i += 1;
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("> ") {
            blocks.push(Block::Blockquote(parse_inlines(rest)));
            i += 1;
            continue;
        }

        if list_item_text(trimmed).is_some() {
            let mut items = Vec::new();
            while i < lines.len() {
                match list_item_text(lines[i].trim()) {
                    Some(item) => {
                        items.push(parse_inlines(item));
                        i += 1;
                    }
                    None => break,
                }
            }
            blocks.push(Block::List(items));
            continue;
        }

        if let Some((alt, target, consumed)) = parse_image(trimmed) {
            if consumed == trimmed.len() {
                blocks.push(Block::Image { alt, target });
                i += 1;
                continue;
            }
        }

        if trimmed.starts_with("<div") {
            let mut body = vec![lines[i]];
            i += 1;
            while i < lines.len() {
                let l = lines[i].trim();
                if l.is_empty() || starts_block(l) {
                    break;
                }
                body.push(lines[i]);
                i += 1;
            }
            blocks.push(Block::RawHtml(body.join("\n")));
            continue;
        }

        // Paragraph: plain lines up to the next blank line or block start.
        let mut para = Vec::new();
        while i < lines.len() {
            let l = lines[i].trim();
            if l.is_empty() || starts_block(l) {
                break;
            }
            para.push(parse_inlines(l));
            i += 1;
        }
        blocks.push(Block::Paragraph(para));
    }

    blocks
}

fn heading_text(line: &str) -> Option<(u8, &str)> {
    if let Some(rest) = line.strip_prefix("### ") {
        Some((3, rest))
    } else if let Some(rest) = line.strip_prefix("## ") {
        Some((2, rest))
    } else if let Some(rest) = line.strip_prefix("# ") {
        Some((1, rest))
    } else {
        None
    }
}

fn list_item_text(line: &str) -> Option<&str> {
    line.strip_prefix("- ").or_else(|| line.strip_prefix("* "))
}

fn starts_block(line: &str) -> bool {
    heading_text(line).is_some()
        || line == "---"
        || line.starts_with("```")
        || line.starts_with("> ")
        || list_item_text(line).is_some()
        || line.starts_with("<div")
        || matches!(parse_image(line), Some((_, _, consumed)) if consumed == line.len())
}

/// Parses `![alt](target)` at the start of `s`, returning the consumed
/// length so callers can tell an image-only line from a leading image.
fn parse_image(s: &str) -> Option<(String, String, usize)> {
    let rest = s.strip_prefix("![")?;
    let close = rest.find("](")?;
    let alt = &rest[..close];
    let after = &rest[close + 2..];
    let end = after.find(')')?;
    let target = &after[..end];
    let consumed = 2 + close + 2 + end + 1;
    Some((alt.to_string(), target.to_string(), consumed))
}

/// Parses `[text](href)` at the start of `s`.
fn parse_link(s: &str) -> Option<(String, String, usize)> {
    let rest = s.strip_prefix('[')?;
    let close = rest.find("](")?;
    let text = &rest[..close];
    let after = &rest[close + 2..];
    let end = after.find(')')?;
    let href = &after[..end];
    let consumed = 1 + close + 2 + end + 1;
    Some((text.to_string(), href.to_string(), consumed))
}

/// Emphasis resolution order matters: `**` is claimed before `*` so bold
/// markers are never half-eaten by the italic rule.
pub fn parse_inlines(text: &str) -> Vec<Inline> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut rest = text;

    while !rest.is_empty() {
        if rest.starts_with("**") {
            if let Some(close) = rest[2..].find("**") {
                flush(&mut buf, &mut out);
                out.push(Inline::Bold(parse_inlines(&rest[2..2 + close])));
                rest = &rest[2 + close + 2..];
                continue;
            }
        } else if rest.starts_with('*') {
            if let Some(close) = rest[1..].find('*') {
                flush(&mut buf, &mut out);
                out.push(Inline::Italic(parse_inlines(&rest[1..1 + close])));
                rest = &rest[1 + close + 1..];
                continue;
            }
        } else if rest.starts_with("![") {
            if let Some((alt, target, consumed)) = parse_image(rest) {
                flush(&mut buf, &mut out);
                out.push(Inline::Image { alt, target });
                rest = &rest[consumed..];
                continue;
            }
        } else if rest.starts_with('[') {
            if let Some((text, href, consumed)) = parse_link(rest) {
                flush(&mut buf, &mut out);
                out.push(Inline::Link { text, href });
                rest = &rest[consumed..];
                continue;
            }
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            buf.push(c);
        }
        rest = chars.as_str();
    }

    flush(&mut buf, &mut out);
    out
}

fn flush(buf: &mut String, out: &mut Vec<Inline>) {
    if !buf.is_empty() {
        out.push(Inline::Text(std::mem::take(buf)));
    }
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Maps a `cover-N.png` placeholder target to the cover list index `N-1`.
fn cover_index(target: &str) -> Option<usize> {
    let n: usize = target
        .strip_prefix("cover-")?
        .strip_suffix(".png")?
        .parse()
        .ok()?;
    n.checked_sub(1)
}

fn resolve_target(target: &str, covers: Option<&[String]>) -> String {
    if let (Some(covers), Some(idx)) = (covers, cover_index(target)) {
        if let Some(url) = covers.get(idx) {
            return url.clone();
        }
    }
    target.to_string()
}

fn render_inlines(inlines: &[Inline], covers: Option<&[String]>) -> String {
    let mut html = String::new();
    for inline in inlines {
        match inline {
            Inline::Text(text) => html.push_str(text),
            Inline::Bold(inner) => {
                html.push_str("<strong>");
                html.push_str(&render_inlines(inner, covers));
                html.push_str("</strong>");
            }
            Inline::Italic(inner) => {
                html.push_str("<em>");
                html.push_str(&render_inlines(inner, covers));
                html.push_str("</em>");
            }
            Inline::Image { alt, target } => {
                html.push_str(&img_tag(alt, target, covers));
            }
            Inline::Link { text, href } => {
                html.push_str(&format!(
                    "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>",
                    escape_attr(href),
                    text
                ));
            }
        }
    }
    html
}

fn img_tag(alt: &str, target: &str, covers: Option<&[String]>) -> String {
    format!(
        "<img src=\"{}\" alt=\"{}\" style=\"max-width: 100%; height: auto;\" />",
        escape_attr(&resolve_target(target, covers)),
        escape_attr(alt)
    )
}

/// Renders parsed blocks to HTML. When `covers` is given, image targets in
/// the `cover-N.png` convention are re-hydrated to the actual in-memory
/// URLs for index `N-1`; without it the relative filenames survive, which
/// is what the zip bundle wants next to its real image files.
pub fn to_html(blocks: &[Block], covers: Option<&[String]>) -> String {
    let mut chunks = Vec::new();
    for block in blocks {
        let chunk = match block {
            Block::Heading { level, content } => format!(
                "<h{level}>{}</h{level}>",
                render_inlines(content, covers)
            ),
            Block::Rule => "<hr />".to_string(),
            Block::Code(body) => format!("<pre>{}</pre>", body.trim()),
            Block::Blockquote(content) => format!(
                "<blockquote>{}</blockquote>",
                render_inlines(content, covers)
            ),
            Block::List(items) => {
                let mut list = String::from("<ul>");
                for item in items {
                    list.push_str("<li>");
                    list.push_str(&render_inlines(item, covers));
                    list.push_str("</li>");
                }
                list.push_str("</ul>");
                list
            }
            Block::Image { alt, target } => img_tag(alt, target, covers),
            Block::RawHtml(html) => html.clone(),
            Block::Paragraph(lines) => {
                let body: Vec<String> = lines
                    .iter()
                    .map(|line| render_inlines(line, covers))
                    .collect();
                format!("<p>{}</p>", body.join("<br />"))
            }
        };
        chunks.push(chunk);
    }
    chunks.join("\n")
}

/// One-shot Markdown to HTML.
pub fn render(text: &str, covers: Option<&[String]>) -> String {
    to_html(&parse(text), covers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bold_is_matched_before_italic() {
        let html = render("**bold** and *italic*", None);
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<em>italic</em>"));
        assert!(!html.contains("<strong>bold</strong>*"));
    }

    #[test]
    fn italic_nests_inside_bold() {
        let html = render("**outer *inner* text**", None);
        assert_eq!(html, "<p><strong>outer <em>inner</em> text</strong></p>");
    }

    #[test]
    fn consecutive_bullets_share_one_list() {
        let html = render("- one\n- two\n- three", None);
        assert_eq!(html.matches("<ul>").count(), 1);
        assert_eq!(html.matches("</ul>").count(), 1);
        assert_eq!(html.matches("<li>").count(), 3);
    }

    #[test]
    fn headings_by_level() {
        let html = render("# One\n## Two\n### Three", None);
        assert!(html.contains("<h1>One</h1>"));
        assert!(html.contains("<h2>Two</h2>"));
        assert!(html.contains("<h3>Three</h3>"));
    }

    #[test]
    fn rule_line_becomes_hr() {
        assert!(render("above\n\n---\n\nbelow", None).contains("<hr />"));
    }

    #[test]
    fn fenced_code_becomes_trimmed_pre() {
        let html = render("```\n  [Verse]\nFalling down  \n```", None);
        assert!(html.contains("<pre>[Verse]\nFalling down</pre>"));
    }

    #[test]
    fn code_fence_shields_markup() {
        let html = render("```\n# not a heading\n- not a bullet\n```", None);
        assert!(!html.contains("<h1>"));
        assert!(!html.contains("<li>"));
    }

    #[test]
    fn link_opens_in_new_tab() {
        let html = render("[docs](https://example.com)", None);
        assert!(html.contains(
            "<a href=\"https://example.com\" target=\"_blank\" rel=\"noopener noreferrer\">docs</a>"
        ));
    }

    #[test]
    fn cover_placeholder_rehydrates_to_real_url() {
        let covers = vec!["blob://1".to_string(), "blob://2".to_string()];
        let html = render("![Cover Art 2](cover-2.png)", Some(&covers));
        assert!(html.contains("src=\"blob://2\""));
    }

    #[test]
    fn cover_placeholder_survives_without_covers() {
        let html = render("![Cover Art 1](cover-1.png)", None);
        assert!(html.contains("src=\"cover-1.png\""));
    }

    #[test]
    fn out_of_range_cover_keeps_placeholder() {
        let covers = vec!["blob://1".to_string()];
        let html = render("![Cover Art 9](cover-9.png)", Some(&covers));
        assert!(html.contains("src=\"cover-9.png\""));
    }

    #[test]
    fn paragraph_newlines_become_breaks() {
        let html = render("line one\nline two\n\nnext paragraph", None);
        assert!(html.contains("<p>line one<br />line two</p>"));
        assert!(html.contains("<p>next paragraph</p>"));
    }

    #[test]
    fn block_elements_are_not_wrapped_in_paragraphs() {
        let html = render("# Title\n\n- item\n\n---", None);
        assert!(!html.contains("<p><h1>"));
        assert!(!html.contains("<p><ul>"));
        assert!(!html.contains("<p><hr"));
    }

    #[test]
    fn raw_div_chunk_passes_through() {
        let html = render("<div class=\"karaoke\">la la</div>", None);
        assert!(html.contains("<div class=\"karaoke\">la la</div>"));
        assert!(!html.contains("<p><div"));
    }

    #[test]
    fn raw_div_does_not_swallow_following_rule() {
        let html = render("<div>la</div>\n---\n\n## Next", None);
        assert!(html.contains("<div>la</div>"));
        assert!(html.contains("<hr />"));
        assert!(html.contains("<h2>Next</h2>"));
    }

    #[test]
    fn blockquote_with_italic() {
        let html = render("> *Smooth*", None);
        assert_eq!(html, "<blockquote><em>Smooth</em></blockquote>");
    }

    #[test]
    fn unterminated_emphasis_stays_literal() {
        assert_eq!(render("a * lone star", None), "<p>a * lone star</p>");
    }
}
