pub mod downloader;
pub mod generators;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod settings;

pub use parser::{Block, Metadata, Parsed};
