use std::fs;
use std::path::Path;

use notewell_common::Document;
use pulldown_cmark::{Event, Options, Parser, TagEnd};

use crate::ledger::path_key;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Turns one file into zero or more documents.
pub trait DocumentLoader {
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    fn load(&self, path: &Path) -> Result<Vec<Document>, LoadError>;
}

fn read(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn single(text: String, path: &Path) -> Vec<Document> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    vec![Document::new(text, path_key(path))]
}

/// Markdown rendered down to plain text, one document per file.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownLoader;

impl DocumentLoader for MarkdownLoader {
    fn load(&self, path: &Path) -> Result<Vec<Document>, LoadError> {
        let raw = read(path)?;
        Ok(single(markdown_to_text(&raw), path))
    }
}

/// Plain text taken verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextLoader;

impl DocumentLoader for TextLoader {
    fn load(&self, path: &Path) -> Result<Vec<Document>, LoadError> {
        Ok(single(read(path)?, path))
    }
}

/// Picks a loader from the file extension.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtensionLoader;

impl DocumentLoader for ExtensionLoader {
    fn load(&self, path: &Path) -> Result<Vec<Document>, LoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("md" | "markdown") => MarkdownLoader.load(path),
            _ => TextLoader.load(path),
        }
    }
}

/// Drops markup and keeps the readable text, one block per paragraph.
pub fn markdown_to_text(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak => out.push(' '),
            Event::HardBreak | Event::Rule => out.push('\n'),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::CodeBlock) => {
                out.push_str("\n\n");
            }
            Event::End(TagEnd::Item | TagEnd::TableHead | TagEnd::TableRow) => out.push('\n'),
            Event::End(TagEnd::TableCell) => out.push(' '),
            _ => {}
        }
    }
    collapse_blank_lines(out.trim())
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0;
    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines > 2 {
                continue;
            }
        } else {
            newlines = 0;
        }
        out.push(c);
    }
    out
}
