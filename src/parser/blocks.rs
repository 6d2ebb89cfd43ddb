use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Fenced code region: a column-0 ```` ``` ```` optionally followed by a word
/// token, the body, and a closing line made only of three backticks.
static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?ms)^```(\w*)\n(.*?)\n```[ \t]*$").unwrap());

pub const DEFAULT_LANGUAGE: &str = "text";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Block {
    Markdown { content: String },
    Code { language: String, content: String },
}

impl Block {
    /// Prose block from an untrimmed segment. `None` when nothing is left.
    pub fn markdown(segment: &str) -> Option<Block> {
        let content = segment.trim();
        if content.is_empty() {
            return None;
        }
        Some(Block::Markdown {
            content: content.to_string(),
        })
    }

    /// Code block with the body kept verbatim; a blank tag falls back to
    /// `text`. Only an empty body yields `None`.
    pub fn code(language: &str, content: &str) -> Option<Block> {
        if content.is_empty() {
            return None;
        }
        let language = language.trim();
        Some(Block::Code {
            language: if language.is_empty() {
                DEFAULT_LANGUAGE.to_string()
            } else {
                language.to_string()
            },
            content: content.to_string(),
        })
    }

    pub fn content(&self) -> &str {
        match self {
            Block::Markdown { content } | Block::Code { content, .. } => content,
        }
    }

    pub fn language(&self) -> Option<&str> {
        match self {
            Block::Code { language, .. } => Some(language),
            Block::Markdown { .. } => None,
        }
    }

    pub fn is_code(&self) -> bool {
        matches!(self, Block::Code { .. })
    }
}

/// Split Markdown into alternating prose and fenced-code blocks.
pub fn extract_markdown_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut last = 0;

    for caps in FENCE_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };

        blocks.extend(Block::markdown(&text[last..whole.start()]));
        blocks.extend(Block::code(&caps[1].to_lowercase(), &caps[2]));

        last = whole.end();
    }

    blocks.extend(Block::markdown(&text[last..]));
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(blocks: &[Block]) -> Vec<&'static str> {
        blocks
            .iter()
            .map(|b| if b.is_code() { "code" } else { "markdown" })
            .collect()
    }

    #[test]
    fn prose_code_prose() {
        let md = "# Header\nSome text.\n\n```python\nprint(\"code\")\n```\n\nMore text.\n";
        let blocks = extract_markdown_blocks(md);
        assert_eq!(kinds(&blocks), ["markdown", "code", "markdown"]);
        assert!(blocks[0].content().contains("Header"));
        assert!(matches!(&blocks[1], Block::Code { language, content }
            if language == "python" && content == "print(\"code\")"));
        assert!(blocks[2].content().contains("More text"));
    }

    #[test]
    fn adjacent_fences_have_no_empty_prose() {
        let md = "```python\ncode1\n```\ntext\n```bash\ncode2\n```";
        let blocks = extract_markdown_blocks(md);
        assert_eq!(kinds(&blocks), ["code", "markdown", "code"]);
        assert_eq!(blocks[0].content(), "code1");
        assert_eq!(blocks[1].content(), "text");
        assert_eq!(blocks[2].content(), "code2");
        assert_eq!(blocks[2].language(), Some("bash"));
    }

    #[test]
    fn back_to_back_fences() {
        let md = "```\na\n```\n```\nb\n```\n";
        let blocks = extract_markdown_blocks(md);
        assert_eq!(kinds(&blocks), ["code", "code"]);
    }

    #[test]
    fn empty_and_blank_input() {
        assert!(extract_markdown_blocks("").is_empty());
        assert!(extract_markdown_blocks("  \n\t\n ").is_empty());
    }

    #[test]
    fn no_fences_is_one_block() {
        let blocks = extract_markdown_blocks("\n  Just prose.\n\nTwo paragraphs.  \n");
        assert_eq!(
            blocks,
            vec![Block::Markdown {
                content: "Just prose.\n\nTwo paragraphs.".into()
            }]
        );
    }

    #[test]
    fn missing_language_defaults_to_text() {
        let blocks = extract_markdown_blocks("```\nls -la\n```");
        assert_eq!(blocks[0].language(), Some("text"));
    }

    #[test]
    fn language_is_lowercased() {
        let blocks = extract_markdown_blocks("```Rust\nfn main() {}\n```");
        assert_eq!(blocks[0].language(), Some("rust"));
    }

    #[test]
    fn code_body_keeps_inner_whitespace() {
        let md = "```python\n\ndef f():\n    return 1\n\n```";
        let blocks = extract_markdown_blocks(md);
        assert_eq!(blocks[0].content(), "\ndef f():\n    return 1\n");
    }

    #[test]
    fn unterminated_fence_stays_prose() {
        let md = "Intro\n\n```python\nprint(1)\n";
        let blocks = extract_markdown_blocks(md);
        assert_eq!(kinds(&blocks), ["markdown"]);
        assert!(blocks[0].content().contains("```python"));
    }

    #[test]
    fn indented_fence_is_not_a_fence() {
        let md = "- item\n  ```\n  nested\n  ```\n";
        let blocks = extract_markdown_blocks(md);
        assert_eq!(kinds(&blocks), ["markdown"]);
    }

    #[test]
    fn space_before_language_is_not_a_fence() {
        let blocks = extract_markdown_blocks("``` python\nx = 1\n```");
        assert_eq!(kinds(&blocks), ["markdown"]);
    }

    #[test]
    fn closing_fence_must_stand_alone() {
        // The inner "```python" line is not a closer, so the region runs on.
        let md = "```\nfirst\n```python\nsecond\n```";
        let blocks = extract_markdown_blocks(md);
        assert_eq!(kinds(&blocks), ["code"]);
        assert_eq!(blocks[0].content(), "first\n```python\nsecond");
    }

    #[test]
    fn empty_fence_body_is_dropped() {
        let blocks = extract_markdown_blocks("before\n```\n\n```\nafter");
        assert_eq!(kinds(&blocks), ["markdown", "markdown"]);
    }

    #[test]
    fn whitespace_only_fence_is_still_code() {
        let blocks = extract_markdown_blocks("a\n```\n    \n```\nb");
        assert_eq!(kinds(&blocks), ["markdown", "code", "markdown"]);
        assert_eq!(blocks[1].content(), "    ");
        assert_eq!(blocks[1].language(), Some("text"));
    }

    #[test]
    fn code_constructor_keeps_tag_case() {
        let block = Block::code(" TypeScript ", "x").unwrap();
        assert_eq!(block.language(), Some("TypeScript"));
        assert_eq!(Block::code("", "x").unwrap().language(), Some("text"));
        assert_eq!(Block::code("rust", ""), None);
    }

    #[test]
    fn extraction_is_repeatable() {
        let md = std::fs::read_to_string("tests/fixtures/post.md").unwrap();
        assert_eq!(extract_markdown_blocks(&md), extract_markdown_blocks(&md));
    }

    #[test]
    fn post_fixture() {
        let md = std::fs::read_to_string("tests/fixtures/post.md").unwrap();
        let blocks = extract_markdown_blocks(&md);
        let code: Vec<_> = blocks.iter().filter(|b| b.is_code()).collect();
        assert_eq!(code.len(), 3, "got: {:?}", blocks);
        assert_eq!(code[0].language(), Some("bash"));
        assert_eq!(code[1].language(), Some("python"));
        assert_eq!(code[2].language(), Some("text"));
        assert!(blocks.iter().all(|b| !b.content().trim().is_empty()));
        assert!(blocks.len() <= 2 * code.len() + 1);

        // Every non-blank line of the source survives in some block.
        let joined: String = blocks.iter().map(Block::content).collect::<Vec<_>>().join("\n");
        for line in md.lines().filter(|l| !l.trim().is_empty() && !l.starts_with("```")) {
            assert!(joined.contains(line.trim()), "lost line: {line}");
        }
    }
}
