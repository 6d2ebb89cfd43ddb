pub mod blocks;
pub mod frontmatter;
pub mod html;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use blocks::Block;

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());

pub const UNTITLED: &str = "Untitled";

/// Key/value pairs that travel with a block sequence (`title`, `url`, ...).
pub type Metadata = BTreeMap<String, Value>;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid front matter: {0}")]
    FrontMatter(#[from] serde_yaml::Error),
}

/// Output of one parse call: blocks in document order plus their metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parsed {
    pub blocks: Vec<Block>,
    pub metadata: Metadata,
}

/// Front matter → metadata, body → fenced-code blocks.
pub fn parse_markdown(text: &str) -> Result<Parsed, ParseError> {
    let (metadata, body) = frontmatter::split_front_matter(text)?;
    Ok(Parsed {
        blocks: blocks::extract_markdown_blocks(body),
        metadata,
    })
}

pub fn parse_file(path: &Path) -> Result<Parsed, ParseError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ParseError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_markdown(&raw.replace("\r\n", "\n"))
}

/// Blocks from a fetched page; metadata carries the page title and its URL.
pub fn parse_html(html: &str, url: &str) -> Parsed {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let mut metadata = Metadata::new();
    metadata.insert("title".into(), Value::String(title));
    metadata.insert("url".into(), Value::String(url.to_string()));

    Parsed {
        blocks: html::extract_html_blocks(&document),
        metadata,
    }
}

/// Metadata value as display text. Strings come back bare, other non-null
/// values as their JSON form.
pub fn metadata_text(metadata: &Metadata, key: &str) -> Option<String> {
    match metadata.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
