//! Chunking of documents into overlapping, size-bounded pieces.
//!
//! Lengths are counted in chars. Consecutive chunks of one document always
//! share exactly `overlap` chars, so dropping the first `overlap` chars of
//! every chunk after the first and concatenating gives the original text.

use notewell_common::{Chunk, Document, Settings, SplitterKind};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SplitError {
    #[error("chunk size must be greater than zero")]
    ZeroSize,
    #[error("chunk overlap {overlap} must be smaller than chunk size {size}")]
    OverlapTooLarge { size: usize, overlap: usize },
}

pub trait TextSplitter {
    fn split_text(&self, text: &str) -> Vec<String>;

    /// Splits every document, copying its metadata onto each chunk.
    fn split_documents(&self, documents: Vec<Document>) -> Vec<Chunk> {
        documents
            .into_iter()
            .flat_map(|doc| {
                self.split_text(&doc.text)
                    .into_iter()
                    .map(move |text| Chunk {
                        text,
                        metadata: doc.metadata.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    size: usize,
    overlap: usize,
}

impl Window {
    fn new(size: usize, overlap: usize) -> Result<Self, SplitError> {
        if size == 0 {
            return Err(SplitError::ZeroSize);
        }
        if overlap >= size {
            return Err(SplitError::OverlapTooLarge { size, overlap });
        }
        Ok(Self { size, overlap })
    }

    /// Walks the text window by window. `pick_end` may pull a chunk's end back
    /// from the hard limit but must stay beyond `start + overlap`.
    fn split<F>(&self, text: &str, pick_end: F) -> Vec<String>
    where
        F: Fn(&[char], usize, usize) -> usize,
    {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.size {
            return vec![text.to_string()];
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let hard_end = (start + self.size).min(chars.len());
            let end = if hard_end == chars.len() {
                hard_end
            } else {
                pick_end(&chars, start, hard_end)
            };
            debug_assert!(end > start + self.overlap && end <= hard_end);
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start = end - self.overlap;
        }
        chunks
    }
}

/// Fixed windows of `size` chars advancing by `size - overlap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSplitter {
    window: Window,
}

impl WindowSplitter {
    /// # Errors
    ///
    /// Returns an error if `size` is zero or `overlap >= size`.
    pub fn new(size: usize, overlap: usize) -> Result<Self, SplitError> {
        Ok(Self {
            window: Window::new(size, overlap)?,
        })
    }
}

impl TextSplitter for WindowSplitter {
    fn split_text(&self, text: &str) -> Vec<String> {
        self.window.split(text, |_, _, hard_end| hard_end)
    }
}

/// Break points, strongest first. A chunk ends right after the separator.
const BREAKS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "! ", "? "], &[" ", "\t"]];

/// Windows that end on a paragraph, line, sentence or word break when one
/// falls in the second half of the window, and cut hard otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundarySplitter {
    window: Window,
}

impl BoundarySplitter {
    /// # Errors
    ///
    /// Returns an error if `size` is zero or `overlap >= size`.
    pub fn new(size: usize, overlap: usize) -> Result<Self, SplitError> {
        Ok(Self {
            window: Window::new(size, overlap)?,
        })
    }

    fn pick_end(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        let floor = start + self.window.overlap.max(self.window.size / 2);
        for level in BREAKS {
            for end in (floor + 1..=hard_end).rev() {
                if level.iter().any(|sep| ends_with(&chars[..end], sep)) {
                    return end;
                }
            }
        }
        hard_end
    }
}

fn ends_with(chars: &[char], sep: &str) -> bool {
    let n = sep.chars().count();
    chars.len() >= n && chars[chars.len() - n..].iter().copied().eq(sep.chars())
}

impl TextSplitter for BoundarySplitter {
    fn split_text(&self, text: &str) -> Vec<String> {
        self.window
            .split(text, |chars, start, hard_end| self.pick_end(chars, start, hard_end))
    }
}

/// Builds the splitter named in the settings.
///
/// # Errors
///
/// Returns an error if the configured size/overlap pair is invalid.
pub fn from_settings(settings: &Settings) -> Result<Box<dyn TextSplitter>, SplitError> {
    let (size, overlap) = (settings.chunk_size, settings.chunk_overlap);
    Ok(match settings.splitter {
        SplitterKind::Boundary => Box::new(BoundarySplitter::new(size, overlap)?),
        SplitterKind::Window => Box::new(WindowSplitter::new(size, overlap)?),
    })
}
