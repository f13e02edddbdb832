//! Table extraction: PDF bytes → ordered [`RawTable`]s.
//!
//! pdfium supplies positioned text segments; the layout pass in
//! [`tables_from_segments`] rebuilds table rows and columns from geometry
//! alone, so the number of rows and columns per page is never assumed.
//!
//! ## Layout pass
//!
//! 1. Segments whose vertical centres lie within half a median segment height
//!    of each other form a line.
//! 2. Inside a line, segments closer than `merge_gap` points horizontally are
//!    one cell. Touching segments are concatenated without a space, which is
//!    how a name and an amount end up fused (`"SALVADOR1.234,56"`).
//! 3. A table region is a maximal run of lines with at least `min_cells`
//!    cells and no vertical jump larger than `region_gap_factor` line heights.
//! 4. Column bands are the union of overlapping cell x-intervals across the
//!    region; each cell lands in the band containing its centre.
//!
//! pdfium is CPU-bound and synchronous. Extraction runs on bytes already in
//! memory, so there is no temp file and no file-system access here.

use crate::config::LayoutOptions;
use crate::error::SafError;
use crate::record::{clean_cell, RawTable};
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Environment variable naming the pdfium shared library (file or directory).
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_LIB_PATH";

/// Horizontal gap (points) below which two merged segments are concatenated
/// without a separating space.
const TOUCH_GAP: f32 = 0.5;

/// Source of raw tables for a report.
pub trait TableExtractor {
    /// Extract every table of the document, in page order.
    fn extract_tables(&self, pdf: &[u8]) -> Result<Vec<RawTable>, SafError>;
}

/// Reject bytes that do not start with the `%PDF` signature.
pub fn check_pdf_magic(bytes: &[u8]) -> Result<(), SafError> {
    if bytes.starts_with(b"%PDF") {
        Ok(())
    } else {
        Err(SafError::NotAPdf {
            magic: bytes.iter().take(4).copied().collect(),
        })
    }
}

// ── Geometry ─────────────────────────────────────────────────────────────

/// A run of text with its bounding box in PDF points (origin bottom-left).
#[derive(Debug, Clone, PartialEq)]
pub struct TextSegment {
    pub text: String,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl TextSegment {
    pub fn new(text: impl Into<String>, left: f32, right: f32, top: f32, bottom: f32) -> Self {
        Self {
            text: text.into(),
            left,
            right,
            top,
            bottom,
        }
    }

    fn centre_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }

    fn height(&self) -> f32 {
        (self.top - self.bottom).abs()
    }
}

#[derive(Debug, Clone)]
struct Cell {
    text: String,
    left: f32,
    right: f32,
}

impl Cell {
    fn centre_x(&self) -> f32 {
        (self.left + self.right) / 2.0
    }
}

#[derive(Debug)]
struct Line {
    centre: f32,
    height: f32,
    cells: Vec<Cell>,
}

fn median(mut values: Vec<f32>) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f32::total_cmp);
    values[values.len() / 2]
}

/// Rebuild the tables of one page from its text segments.
///
/// `page` is 1-based and copied into every produced table. Pages without any
/// qualifying region yield an empty vector.
pub fn tables_from_segments(
    page: usize,
    segments: &[TextSegment],
    layout: &LayoutOptions,
) -> Vec<RawTable> {
    let segments: Vec<&TextSegment> = segments
        .iter()
        .filter(|s| !s.text.trim().is_empty())
        .collect();
    if segments.is_empty() {
        return Vec::new();
    }

    let lines = group_lines(&segments, layout.merge_gap);
    let line_height = median(lines.iter().map(|l| l.height).collect()).max(1.0);
    let max_jump = layout.region_gap_factor * line_height;

    let mut tables = Vec::new();
    let mut region: Vec<&Line> = Vec::new();
    for line in &lines {
        let continues = region
            .last()
            .is_some_and(|prev| (prev.centre - line.centre).abs() <= max_jump);
        if line.cells.len() < layout.min_cells || !continues {
            if let Some(table) = region_to_table(page, &region) {
                tables.push(table);
            }
            region.clear();
        }
        if line.cells.len() >= layout.min_cells {
            region.push(line);
        }
    }
    if let Some(table) = region_to_table(page, &region) {
        tables.push(table);
    }

    debug!(
        "Page {}: {} segments, {} lines, {} tables",
        page,
        segments.len(),
        lines.len(),
        tables.len()
    );
    tables
}

/// Steps 1 and 2: bucket segments into lines (top of page first), then merge
/// neighbours inside each line into cells.
fn group_lines(segments: &[&TextSegment], merge_gap: f32) -> Vec<Line> {
    let tolerance = (median(segments.iter().map(|s| s.height()).collect()) / 2.0).max(1.0);

    let mut sorted: Vec<&TextSegment> = segments.to_vec();
    sorted.sort_by(|a, b| {
        b.centre_y()
            .total_cmp(&a.centre_y())
            .then(a.left.total_cmp(&b.left))
    });

    let mut buckets: Vec<(f32, Vec<&TextSegment>)> = Vec::new();
    for segment in sorted {
        match buckets.last_mut() {
            Some((anchor, members)) if (*anchor - segment.centre_y()).abs() <= tolerance => {
                members.push(segment)
            }
            _ => buckets.push((segment.centre_y(), vec![segment])),
        }
    }

    buckets
        .into_iter()
        .map(|(centre, mut members)| {
            members.sort_by(|a, b| a.left.total_cmp(&b.left));
            let top = members.iter().map(|s| s.top).fold(f32::MIN, f32::max);
            let bottom = members.iter().map(|s| s.bottom).fold(f32::MAX, f32::min);

            let mut cells: Vec<Cell> = Vec::new();
            for segment in members {
                let text = segment.text.trim();
                match cells.last_mut() {
                    Some(cell) if segment.left - cell.right < merge_gap => {
                        if segment.left - cell.right > TOUCH_GAP {
                            cell.text.push(' ');
                        }
                        cell.text.push_str(text);
                        cell.right = cell.right.max(segment.right);
                    }
                    _ => cells.push(Cell {
                        text: text.to_string(),
                        left: segment.left,
                        right: segment.right,
                    }),
                }
            }

            Line {
                centre,
                height: (top - bottom).abs(),
                cells,
            }
        })
        .collect()
}

/// Step 4: derive column bands for a region and lay its cells into them.
fn region_to_table(page: usize, region: &[&Line]) -> Option<RawTable> {
    if region.is_empty() {
        return None;
    }

    let mut intervals: Vec<(f32, f32)> = region
        .iter()
        .flat_map(|line| line.cells.iter().map(|c| (c.left, c.right)))
        .collect();
    intervals.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut bands: Vec<(f32, f32)> = Vec::new();
    for (left, right) in intervals {
        match bands.last_mut() {
            Some(band) if left <= band.1 => band.1 = band.1.max(right),
            _ => bands.push((left, right)),
        }
    }

    let rows = region
        .iter()
        .map(|line| {
            let mut row: Vec<Option<String>> = vec![None; bands.len()];
            for cell in &line.cells {
                let x = cell.centre_x();
                let slot = bands
                    .iter()
                    .position(|(l, r)| x >= *l && x <= *r)
                    .unwrap_or(bands.len() - 1);
                row[slot] = match row[slot].take() {
                    Some(existing) => Some(format!("{} {}", existing, cell.text)),
                    None => clean_cell(&cell.text),
                };
            }
            row
        })
        .collect();

    Some(RawTable::new(page, rows))
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// [`TableExtractor`] backed by the pdfium library.
pub struct PdfiumExtractor {
    pdfium: Pdfium,
    layout: LayoutOptions,
}

impl PdfiumExtractor {
    /// Bind pdfium from `PDFIUM_LIB_PATH`, falling back to the system library.
    pub fn new() -> Result<Self, SafError> {
        Self::with_layout(LayoutOptions::default())
    }

    pub fn with_layout(layout: LayoutOptions) -> Result<Self, SafError> {
        let bindings = match std::env::var_os(PDFIUM_LIB_ENV) {
            Some(raw) => {
                let mut path = PathBuf::from(raw);
                if path.is_dir() {
                    path.push(Pdfium::pdfium_platform_library_name());
                }
                debug!("Binding pdfium from {}", path.display());
                Pdfium::bind_to_library(path.to_string_lossy().into_owned())
            }
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| SafError::PdfiumBindingFailed(format!("{:?}", e)))?;

        Ok(Self {
            pdfium: Pdfium::new(bindings),
            layout,
        })
    }

    /// Read positioned text segments for every page, 1-based page numbers.
    fn page_segments(&self, pdf: &[u8]) -> Result<Vec<(usize, Vec<TextSegment>)>, SafError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| SafError::Extraction(format!("cannot open PDF: {:?}", e)))?;

        let pages = document.pages();
        info!("PDF loaded: {} pages", pages.len());

        let mut out = Vec::with_capacity(pages.len() as usize);
        for (index, page) in pages.iter().enumerate() {
            let text = page.text().map_err(|e| {
                SafError::Extraction(format!("page {}: {:?}", index + 1, e))
            })?;
            let segments = text
                .segments()
                .iter()
                .map(|segment| {
                    let bounds = segment.bounds();
                    TextSegment::new(
                        segment.text(),
                        bounds.left.value,
                        bounds.right.value,
                        bounds.top.value,
                        bounds.bottom.value,
                    )
                })
                .collect();
            out.push((index + 1, segments));
        }
        Ok(out)
    }
}

impl TableExtractor for PdfiumExtractor {
    fn extract_tables(&self, pdf: &[u8]) -> Result<Vec<RawTable>, SafError> {
        check_pdf_magic(pdf)?;

        let mut tables = Vec::new();
        for (page, segments) in self.page_segments(pdf)? {
            let found = tables_from_segments(page, &segments, &self.layout);
            if found.is_empty() {
                warn!("Page {}: no table found", page);
            }
            tables.extend(found);
        }

        if tables.is_empty() {
            return Err(SafError::Extraction("no tables found in the report".into()));
        }
        info!("Extracted {} tables", tables.len());
        Ok(tables)
    }
}
