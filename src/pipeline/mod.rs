//! Pipeline stages for report-to-spreadsheet conversion.
//!
//! Each submodule implements exactly one transformation step. Only `input`
//! and the registry fetch in `enrich` touch the network; everything between
//! them is a pure function over data already in memory.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ shape ──▶ noise ──▶ split ──▶ realign ──▶ enrich ──▶ export
//! (PDF)    (pdfium)   (7 cols)  (filter)  (name/#)  (shift)    (codes)    (xlsx)
//! ```
//!
//! 1. [`input`]   : fetch the report bytes (HTTP, local file, or in memory)
//! 2. [`extract`] : rebuild tables from positioned text
//! 3. [`shape`]   : force every table row to the 7-column schema
//! 4. [`noise`]   : drop header repeats, blanks and boilerplate rows
//! 5. [`split`]   : pull numbers fused into the municipality cell; parse
//!    amounts via [`numeric`]
//! 6. [`realign`] : repair rows shifted one column to the left
//! 7. [`enrich`]  : left-join registry codes by normalised name
//! 8. [`export`]  : write the `.xlsx` workbook

pub mod enrich;
pub mod export;
pub mod extract;
pub mod input;
pub mod noise;
pub mod numeric;
pub mod realign;
pub mod shape;
pub mod split;
