use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::parser::{metadata_text, Block, Metadata, UNTITLED};

const DEFAULT_TITLE: &str = "Converted Post";
const LOCAL_SOURCE: &str = "Local File";

const NBFORMAT: u32 = 4;
const NBFORMAT_MINOR: u32 = 5;

#[derive(Debug, Serialize)]
struct Notebook {
    cells: Vec<Cell>,
    metadata: NotebookMetadata,
    nbformat: u32,
    nbformat_minor: u32,
}

#[derive(Debug, Serialize)]
struct NotebookMetadata {
    title: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
enum Cell {
    Markdown {
        id: String,
        metadata: Map<String, Value>,
        source: Vec<String>,
    },
    Code {
        execution_count: Option<u32>,
        id: String,
        metadata: Map<String, Value>,
        outputs: Vec<Value>,
        source: Vec<String>,
    },
}

impl Cell {
    fn markdown(index: usize, text: &str) -> Self {
        Cell::Markdown {
            id: cell_id(index),
            metadata: Map::new(),
            source: source_lines(text),
        }
    }

    fn code(index: usize, text: &str) -> Self {
        Cell::Code {
            execution_count: None,
            id: cell_id(index),
            metadata: Map::new(),
            outputs: Vec::new(),
            source: source_lines(text),
        }
    }
}

fn cell_id(index: usize) -> String {
    format!("cell-{index}")
}

/// nbformat stores multi-line sources as a list of lines with their endings.
fn source_lines(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(str::to_string).collect()
}

fn source_of(metadata: &Metadata) -> String {
    metadata_text(metadata, "url").unwrap_or_else(|| LOCAL_SOURCE.to_string())
}

/// Percent-format script: code blocks become `# %%` cells, prose becomes
/// commented `# %% [markdown]` cells.
pub fn render_script(blocks: &[Block], metadata: &Metadata) -> String {
    let title = metadata_text(metadata, "title").unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let mut lines = vec![
        format!("# Title: {title}"),
        format!("# Generated from: {}", source_of(metadata)),
        String::new(),
    ];

    for block in blocks {
        match block {
            Block::Code { content, .. } => {
                lines.push("# %%".to_string());
                lines.push(content.clone());
            }
            Block::Markdown { content } => {
                lines.push("# %% [markdown]".to_string());
                lines.extend(content.lines().map(|line| {
                    if line.is_empty() {
                        "#".to_string()
                    } else {
                        format!("# {line}")
                    }
                }));
            }
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Notebook JSON with a title cell followed by one cell per block.
pub fn render_notebook(blocks: &[Block], metadata: &Metadata) -> Result<String> {
    let title = metadata_text(metadata, "title");
    let header = format!(
        "# {}\n\nGenerated from: {}",
        title.as_deref().unwrap_or(UNTITLED),
        source_of(metadata)
    );

    let mut cells = Vec::with_capacity(blocks.len() + 1);
    cells.push(Cell::markdown(0, &header));
    for (i, block) in blocks.iter().enumerate() {
        cells.push(match block {
            Block::Code { content, .. } => Cell::code(i + 1, content),
            Block::Markdown { content } => Cell::markdown(i + 1, content),
        });
    }

    let notebook = Notebook {
        cells,
        metadata: NotebookMetadata {
            title: title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        },
        nbformat: NBFORMAT,
        nbformat_minor: NBFORMAT_MINOR,
    };

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    notebook
        .serialize(&mut ser)
        .context("Failed to serialize notebook")?;

    let mut json = String::from_utf8(buf)?;
    json.push('\n');
    Ok(json)
}

pub fn write_script(blocks: &[Block], metadata: &Metadata, path: &Path) -> Result<()> {
    std::fs::write(path, render_script(blocks, metadata))
        .with_context(|| format!("Failed to write {}", path.display()))
}

pub fn write_notebook(blocks: &[Block], metadata: &Metadata, path: &Path) -> Result<()> {
    let json = render_notebook(blocks, metadata)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}
