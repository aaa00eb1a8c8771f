use crate::models::*;
use anyhow::{Context, Result};
use rayon::prelude::*;
use regex::Regex;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use unicode_segmentation::UnicodeSegmentation;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

static RE_INLINE_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\x0b\x0c]+").expect("valid whitespace regex"));
static RE_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("valid blank line regex"));

/// Loads PDFs page by page and cuts pages into overlapping chunks.
#[derive(Debug, Clone)]
pub struct DocumentProcessor {
    splitter: TextSplitter,
}

impl DocumentProcessor {
    pub fn new(splitter: TextSplitter) -> Self {
        Self { splitter }
    }

    /// Extracts every page of a PDF. `source` becomes part of each chunk ID,
    /// so callers pass a stable name rather than a temporary path.
    pub fn load_pdf(&self, path: &Path, source: &str) -> Result<Vec<PageText>> {
        log::info!("Loading PDF: {}", source);

        let pages = pdf_extract::extract_text_by_pages(path)
            .with_context(|| format!("failed to extract text from {}", path.display()))?;

        let pages: Vec<PageText> = pages
            .into_iter()
            .enumerate()
            .map(|(page, text)| PageText {
                source: source.to_string(),
                page,
                text,
            })
            .collect();

        log::debug!("{} has {} pages", source, pages.len());
        Ok(pages)
    }

    /// Loads every `.pdf` in `dir`, in file-name order.
    pub fn load_directory(&self, dir: &Path) -> Result<Vec<PageText>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
            let path = entry?.path();
            if is_pdf(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut pages = Vec::new();
        for path in &paths {
            let source = path.display().to_string();
            pages.extend(self.load_pdf(path, &source)?);
        }

        log::info!("Loaded {} pages from {} documents", pages.len(), paths.len());
        Ok(pages)
    }

    /// Splits pages into chunks, keeping chunks of one page together and
    /// pages in input order.
    pub fn split_pages(&self, pages: &[PageText]) -> Vec<Chunk> {
        let per_page: Vec<Vec<Chunk>> = pages
            .par_iter()
            .map(|page| {
                self.splitter
                    .split_text(&clean_text(&page.text))
                    .into_iter()
                    .map(|content| Chunk::new(content, page.source.clone(), page.page))
                    .collect()
            })
            .collect();

        let chunks: Vec<Chunk> = per_page.into_iter().flatten().collect();
        log::info!("Created {} chunks", chunks.len());
        chunks
    }
}

pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

fn clean_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let text = RE_INLINE_SPACE.replace_all(&text, " ");
    let text = RE_BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Recursive character splitter.
///
/// Tries `"\n\n"`, then `"\n"`, then `" "`, then single graphemes, descending
/// only into pieces that are still too long. Separators stay attached to the
/// start of the following piece, and adjacent pieces are merged into windows
/// of at most `chunk_size` characters that overlap by up to `chunk_overlap`.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        anyhow::ensure!(chunk_size > 0, "chunk size must be positive");
        anyhow::ensure!(
            chunk_overlap < chunk_size,
            "chunk overlap ({}) must be smaller than chunk size ({})",
            chunk_overlap,
            chunk_size
        );
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut finer: &[&str] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = candidate;
                break;
            }
            if text.contains(candidate) {
                separator = candidate;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut fitting: Vec<String> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting));
                fitting.clear();
            }
            if finer.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_with(&piece, finer));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting));
        }
        chunks
    }

    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_window(&mut merged, &window);
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }

        push_window(&mut merged, &window);
        merged
    }
}

fn push_window(merged: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        merged.push(trimmed.to_string());
    }
}

fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.graphemes(true).map(str::to_string).collect();
    }

    let mut parts = text.split(separator);
    let mut pieces = Vec::new();
    if let Some(first) = parts.next() {
        pieces.push(first.to_string());
    }
    pieces.extend(parts.map(|part| format!("{}{}", separator, part)));
    pieces.retain(|piece| !piece.is_empty());
    pieces
}
