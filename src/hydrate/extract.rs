//! Primary structured extraction.
//!
//! Downloads a page once and pulls the article fields out of it with
//! `scraper`: title, authors, body text, lead image, image and video
//! references, plus keywords and a summary from [`super::nlp`]. The
//! downloaded body doubles as the record's raw markup.
//!
//! # Field sources
//!
//! | Field | Looked up in |
//! |-------|--------------|
//! | title | `og:title`, `<title>` (longest segment), first `<h1>` |
//! | authors | author meta tags, `itemprop=author`, `rel=author`, byline classes |
//! | text | paragraphs under the parent holding the most paragraph text |
//! | top image | `og:image`, `twitter:image`, `link[rel=image_src]`, first article image |
//! | videos | embeds pointing at known video hosts, and `<video>` sources |

use super::nlp::{self, KEYWORD_COUNT, SUMMARY_SENTENCES};
use crate::error::ExtractionFailure;
use crate::models::{ExtractedArticle, Markup};
use crate::utils::truncate_for_log;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use std::future::Future;
use tracing::{debug, instrument};
use url::Url;

/// Structured content extraction for one page.
///
/// All-or-nothing: either a complete [`ExtractedArticle`] or a single
/// [`ExtractionFailure`]. A successful article may still carry no markup.
pub trait Extractor: Send + Sync {
    fn extract(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<ExtractedArticle, ExtractionFailure>> + Send;
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static TITLE_META: Lazy<Selector> = Lazy::new(|| {
    selector(r#"meta[property="og:title"], meta[name="og:title"], meta[name="twitter:title"]"#)
});
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static H1: Lazy<Selector> = Lazy::new(|| selector("h1"));
static AUTHOR_META: Lazy<Selector> = Lazy::new(|| {
    selector(
        r#"meta[name="author"], meta[property="article:author"], meta[name="byl"], meta[name="dc.creator"]"#,
    )
});
static AUTHOR_NODES: Lazy<Selector> = Lazy::new(|| {
    selector(r#"[itemprop="author"], [rel="author"], .byline, .author, .byline-name"#)
});
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| selector("p"));
static IMAGE_META: Lazy<Selector> = Lazy::new(|| {
    selector(
        r#"meta[property="og:image"], meta[name="og:image"], meta[name="twitter:image"], meta[name="twitter:image:src"]"#,
    )
});
static IMAGE_LINK: Lazy<Selector> = Lazy::new(|| selector(r#"link[rel="image_src"]"#));
static ARTICLE_IMAGE: Lazy<Selector> = Lazy::new(|| selector("article img"));
static IMAGE: Lazy<Selector> = Lazy::new(|| selector("img"));
static EMBED: Lazy<Selector> = Lazy::new(|| selector("iframe, embed, object"));
static VIDEO: Lazy<Selector> = Lazy::new(|| selector("video, video source"));

static TITLE_DELIMITER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+[|–—»·-]\s+").unwrap());
static BYLINE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*(?:written\s+)?by[:\s]+").unwrap());
static AUTHOR_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s*(?:,|&|\||\band\b)\s*").unwrap());

const VIDEO_HOSTS: &[&str] = &[
    "youtube.com",
    "youtube-nocookie.com",
    "youtu.be",
    "vimeo.com",
    "dailymotion.com",
    "dai.ly",
    "kewego.com",
    "twitch.tv",
    "jwplayer.com",
    "brightcove.net",
];

const MAX_AUTHOR_WORDS: usize = 5;

/// [`Extractor`] backed by a `reqwest` download and `scraper` parsing.
#[derive(Debug, Clone)]
pub struct ArticleExtractor {
    client: Client,
}

impl ArticleExtractor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Extractor for ArticleExtractor {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn extract(&self, url: &str) -> Result<ExtractedArticle, ExtractionFailure> {
        let page = Url::parse(url).map_err(|e| ExtractionFailure::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let response = self
            .client
            .get(page)
            .send()
            .await
            .map_err(ExtractionFailure::Download)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionFailure::Status(status));
        }

        let base = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);
        if let Some(ct) = content_type.as_deref() {
            if !is_markup_type(ct) {
                debug!(content_type = ct, "Response is not markup; nothing to parse");
                return Ok(ExtractedArticle::blank(Markup::Unset));
            }
        }

        let body = response.text().await.map_err(ExtractionFailure::Body)?;
        let bytes = body.len();
        // html5ever and the text heuristics are CPU-bound.
        let article = tokio::task::spawn_blocking(move || parse_article(&body, &base))
            .await
            .map_err(ExtractionFailure::Parse)?;
        debug!(
            bytes,
            title = %truncate_for_log(&article.title, 80),
            paragraphs_chars = article.text.len(),
            markup = article.markup.label(),
            "Parsed article"
        );
        Ok(article)
    }
}

pub(crate) fn is_markup_type(content_type: &str) -> bool {
    content_type.contains("html") || content_type.contains("xml") || content_type.starts_with("text/")
}

/// Extract every article field from a downloaded page.
///
/// `page` is the final URL of the download and is used to resolve relative
/// image and video references.
pub fn parse_article(html: &str, page: &Url) -> ExtractedArticle {
    let doc = Html::parse_document(html);

    let title = title(&doc);
    let authors = authors(&doc);
    let text = body_text(&doc);
    let top_image = top_image(&doc, page).unwrap_or_default();
    let mut images = images(&doc, page);
    if !top_image.is_empty() {
        images.insert(top_image.clone());
    }
    let videos = videos(&doc, page);

    let keywords = nlp::keywords(&title, &text, KEYWORD_COUNT);
    let summary = nlp::summarize(&title, &text, &keywords, SUMMARY_SENTENCES);

    ExtractedArticle {
        title,
        authors,
        keywords,
        summary,
        text,
        top_image,
        images,
        videos,
        markup: Markup::from_body(html.to_string()),
    }
}

fn normalized_text(el: ElementRef<'_>) -> String {
    el.text().flat_map(str::split_whitespace).join(" ")
}

fn meta_content(doc: &Html, sel: &Selector) -> Option<String> {
    doc.select(sel)
        .filter_map(|m| m.value().attr("content"))
        .map(|c| c.split_whitespace().join(" "))
        .find(|c| !c.is_empty())
}

fn title(doc: &Html) -> String {
    if let Some(t) = meta_content(doc, &TITLE_META) {
        return t;
    }
    if let Some(t) = doc.select(&TITLE).map(normalized_text).find(|t| !t.is_empty()) {
        return longest_segment(&t);
    }
    doc.select(&H1)
        .map(normalized_text)
        .find(|t| !t.is_empty())
        .unwrap_or_default()
}

/// `"Floods hit Assam | The Daily"` -> `"Floods hit Assam"`.
fn longest_segment(title: &str) -> String {
    TITLE_DELIMITER
        .split(title)
        .map(str::trim)
        .fold("", |best, seg| {
            if seg.chars().count() > best.chars().count() {
                seg
            } else {
                best
            }
        })
        .to_string()
}

fn authors(doc: &Html) -> Vec<String> {
    let from_meta = doc
        .select(&AUTHOR_META)
        .filter_map(|m| m.value().attr("content"))
        .filter(|c| !c.trim_start().starts_with("http"))
        .map(str::to_string);
    let from_nodes = doc.select(&AUTHOR_NODES).map(normalized_text);

    from_meta
        .chain(from_nodes)
        .flat_map(|candidate| {
            let stripped = BYLINE_PREFIX.replace(&candidate, "").into_owned();
            AUTHOR_SPLIT
                .split(&stripped)
                .map(|name| name.split_whitespace().join(" "))
                .collect::<Vec<_>>()
        })
        .filter(|name| is_plausible_name(name))
        .unique_by(|name| name.to_lowercase())
        .collect()
}

fn is_plausible_name(name: &str) -> bool {
    let words = name.split_whitespace().count();
    (1..=MAX_AUTHOR_WORDS).contains(&words)
        && name.chars().any(char::is_alphabetic)
        && !name.chars().any(|c| c.is_ascii_digit())
}

/// Paragraph text under the parent element holding the most of it.
fn body_text(doc: &Html) -> String {
    let mut groups: Vec<(_, Vec<String>, usize)> = Vec::new();
    for p in doc.select(&PARAGRAPH) {
        let text = normalized_text(p);
        if text.is_empty() {
            continue;
        }
        let Some(parent) = p.parent() else {
            continue;
        };
        let id = parent.id();
        match groups.iter_mut().find(|(gid, _, _)| *gid == id) {
            Some((_, paragraphs, chars)) => {
                *chars += text.len();
                paragraphs.push(text);
            }
            None => {
                let chars = text.len();
                groups.push((id, vec![text], chars));
            }
        }
    }

    let mut best: Option<(Vec<String>, usize)> = None;
    for (_, paragraphs, chars) in groups {
        if best.as_ref().is_none_or(|(_, most)| chars > *most) {
            best = Some((paragraphs, chars));
        }
    }
    best.map(|(paragraphs, _)| paragraphs.join("\n\n"))
        .unwrap_or_default()
}

/// Resolve a page reference to an absolute http(s) URL.
fn resolve(page: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("data:") || raw.starts_with("javascript:") {
        return None;
    }
    page.join(raw)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|u| u.to_string())
}

fn image_src<'a>(img: &ElementRef<'a>) -> Option<&'a str> {
    img.value()
        .attr("src")
        .or_else(|| img.value().attr("data-src"))
}

fn top_image(doc: &Html, page: &Url) -> Option<String> {
    meta_content(doc, &IMAGE_META)
        .and_then(|c| resolve(page, &c))
        .or_else(|| {
            doc.select(&IMAGE_LINK)
                .filter_map(|l| l.value().attr("href"))
                .find_map(|href| resolve(page, href))
        })
        .or_else(|| {
            doc.select(&ARTICLE_IMAGE)
                .filter_map(|img| image_src(&img))
                .find_map(|src| resolve(page, src))
        })
}

fn images(doc: &Html, page: &Url) -> BTreeSet<String> {
    doc.select(&IMAGE)
        .filter_map(|img| image_src(&img))
        .filter_map(|src| resolve(page, src))
        .collect()
}

fn is_video_host(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .is_some_and(|host| {
            VIDEO_HOSTS
                .iter()
                .any(|known| host == *known || host.ends_with(&format!(".{known}")))
        })
}

fn videos(doc: &Html, page: &Url) -> BTreeSet<String> {
    let embedded = doc
        .select(&EMBED)
        .filter_map(|el| el.value().attr("src").or_else(|| el.value().attr("data")))
        .filter_map(|src| resolve(page, src))
        .filter(|src| is_video_host(src));
    let native = doc
        .select(&VIDEO)
        .filter_map(|el| el.value().attr("src"))
        .filter_map(|src| resolve(page, src));
    embedded.chain(native).collect()
}
