use std::sync::LazyLock;

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::blocks::{Block, DEFAULT_LANGUAGE};

/// Candidate content roots, most specific first.
const CONTENT_ROOTS: &[&str] = &[
    "article",
    ".post-content",
    ".entry-content",
    "main",
    ".content",
    "#content",
];

/// Wrappers that get flattened to prose when a `<pre>` hides inside them.
const CONTAINER_TAGS: &[&str] = &["div", "section"];
const IGNORED_TAGS: &[&str] = &["script", "style", "noscript", "template"];

static ROOT_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    CONTENT_ROOTS
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});
static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());
static PRE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("pre").unwrap());
static CODE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("code").unwrap());

enum Child<'a> {
    Text(&'a str),
    Code(ElementRef<'a>),
    Container(ElementRef<'a>),
    Prose(ElementRef<'a>),
    Skip,
}

/// Pending prose fragments, emitted as one markdown block on flush.
#[derive(Default)]
struct ProseBuffer {
    fragments: Vec<String>,
}

impl ProseBuffer {
    fn push(&mut self, fragment: String) {
        if !fragment.trim().is_empty() {
            self.fragments.push(fragment);
        }
    }

    fn flush(&mut self, blocks: &mut Vec<Block>) {
        if self.fragments.is_empty() {
            return;
        }
        blocks.extend(Block::markdown(&self.fragments.join("\n\n")));
        self.fragments.clear();
    }
}

/// Pick the element most likely to hold the article body.
pub fn content_root(document: &Html) -> Option<ElementRef<'_>> {
    for (selector, name) in ROOT_SELECTORS.iter().zip(CONTENT_ROOTS) {
        if let Some(root) = document.select(selector).next() {
            debug!("content root matched {}", name);
            return Some(root);
        }
    }
    debug!("no content root matched, using <body>");
    document.select(&BODY).next()
}

/// Walk the direct children of the content root, turning `<pre>` elements
/// into code blocks and everything between them into markdown.
pub fn extract_html_blocks(document: &Html) -> Vec<Block> {
    let Some(root) = content_root(document) else {
        return Vec::new();
    };

    let mut blocks = Vec::new();
    let mut prose = ProseBuffer::default();

    for node in root.children() {
        match classify(node.value(), ElementRef::wrap(node)) {
            Child::Text(text) => prose.push(text.trim().to_string()),
            Child::Code(pre) => {
                prose.flush(&mut blocks);
                let (language, content) = code_of(pre);
                blocks.extend(Block::code(&language, &content));
            }
            // Nested code is flattened into the surrounding prose.
            Child::Container(el) => prose.push(joined_text(el, "\n\n")),
            Child::Prose(el) => prose.push(prose_text(el)),
            Child::Skip => {}
        }
    }

    prose.flush(&mut blocks);
    blocks
}

fn classify<'a>(node: &'a Node, element: Option<ElementRef<'a>>) -> Child<'a> {
    match (node, element) {
        (Node::Text(text), _) => Child::Text(&**text),
        (Node::Element(el), Some(el_ref)) => {
            let name = el.name();
            if name == "pre" {
                Child::Code(el_ref)
            } else if IGNORED_TAGS.contains(&name) {
                Child::Skip
            } else if CONTAINER_TAGS.contains(&name) && el_ref.select(&PRE).next().is_some() {
                Child::Container(el_ref)
            } else {
                Child::Prose(el_ref)
            }
        }
        _ => Child::Skip,
    }
}

/// Language and body of a `<pre>`, preferring a nested `<code>`.
fn code_of(pre: ElementRef<'_>) -> (String, String) {
    match pre.select(&CODE).next() {
        Some(code) => {
            let language = code
                .value()
                .classes()
                .find_map(|c| c.strip_prefix("language-"))
                .unwrap_or(DEFAULT_LANGUAGE)
                .to_string();
            (language, code.text().collect())
        }
        None => (DEFAULT_LANGUAGE.to_string(), pre.text().collect()),
    }
}

fn prose_text(el: ElementRef<'_>) -> String {
    let text = joined_text(el, " ");
    match heading_level(el.value().name()) {
        Some(level) if !text.is_empty() => format!("{} {}", "#".repeat(level), text),
        _ => text,
    }
}

fn heading_level(name: &str) -> Option<usize> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn joined_text(el: ElementRef<'_>, separator: &str) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}
