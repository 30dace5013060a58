//! Quote extraction from rendered markup
//!
//! Each quote block must carry a text and an author. Blocks missing either
//! are skipped and reported as warnings; they never fail the page.

use crate::config::SourceConfig;
use crate::storage::QuoteRecord;
use crate::{ConfigError, ExtractionError};
use scraper::{ElementRef, Html, Selector};
use std::fmt;

/// Records pulled from one document, plus the blocks that were skipped
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// One record per well-formed block, in document order
    pub records: Vec<QuoteRecord>,

    /// One entry per skipped block
    pub warnings: Vec<ExtractionWarning>,
}

/// A quote block that could not be turned into a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionWarning {
    /// Zero-based position of the block within the document
    pub block_index: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingText,
    MissingAuthor,
}

impl fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self.reason {
            SkipReason::MissingText => "missing text",
            SkipReason::MissingAuthor => "missing author",
        };
        write!(f, "quote block {} skipped: {}", self.block_index, reason)
    }
}

/// Compiled selectors for the source document contract
#[derive(Debug, Clone)]
pub struct QuoteExtractor {
    quote: Selector,
    text: Selector,
    author: Selector,
    tag: Selector,
}

impl QuoteExtractor {
    /// Compiles the block, text, author, and tag selectors
    pub fn new(source: &SourceConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            quote: compile(&source.quote_selector)?,
            text: compile(&source.text_selector)?,
            author: compile(&source.author_selector)?,
            tag: compile(&source.tag_selector)?,
        })
    }

    /// Parses every quote block in `html`
    ///
    /// # Example
    ///
    /// ```
    /// use quote_harvest::config::SourceConfig;
    /// use quote_harvest::crawler::QuoteExtractor;
    ///
    /// let source = SourceConfig::with_url("https://example.com/");
    /// let extractor = QuoteExtractor::new(&source).unwrap();
    /// let html = r#"<div class="quote">
    ///     <span class="text">Hi</span><small class="author">Me</small>
    /// </div>"#;
    /// let extraction = extractor.extract(html).unwrap();
    /// assert_eq!(extraction.records[0].author, "Me");
    /// ```
    pub fn extract(&self, html: &str) -> Result<Extraction, ExtractionError> {
        if html.trim().is_empty() {
            return Err(ExtractionError::EmptyDocument);
        }

        let document = Html::parse_document(html);
        let mut extraction = Extraction::default();

        for (block_index, block) in document.select(&self.quote).enumerate() {
            match self.parse_block(block) {
                Ok(record) => extraction.records.push(record),
                Err(reason) => extraction
                    .warnings
                    .push(ExtractionWarning { block_index, reason }),
            }
        }

        Ok(extraction)
    }

    fn parse_block(&self, block: ElementRef<'_>) -> Result<QuoteRecord, SkipReason> {
        let text = first_text(block, &self.text).ok_or(SkipReason::MissingText)?;
        let author = first_text(block, &self.author).ok_or(SkipReason::MissingAuthor)?;

        let tags = block
            .select(&self.tag)
            .map(element_text)
            .filter(|tag| !tag.is_empty())
            .collect();

        Ok(QuoteRecord::new(text, author, tags))
    }
}

fn compile(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

/// Trimmed text of the first match, if it is non-empty
fn first_text(block: ElementRef<'_>, selector: &Selector) -> Option<String> {
    block
        .select(selector)
        .next()
        .map(element_text)
        .filter(|s| !s.is_empty())
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
