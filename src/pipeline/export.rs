//! Spreadsheet export: serialise enriched records as an `.xlsx` workbook.
//!
//! Column order is fixed: `MUNICIPALITY, ICMS, IPVA, ITD, FEES, MONTH_TOTAL,
//! YTD_TOTAL, CODE`. Amounts are written as numeric cells and nulls as empty
//! cells so the sheet sums correctly in any spreadsheet tool.

use crate::error::SafError;
use crate::record::EnrichedRecord;
use crate::schema::Column;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use tracing::{info, warn};

/// Worksheet name of the exported workbook.
pub const SHEET_NAME: &str = "SAF";

/// Header of the trailing registry-code column.
pub const CODE_HEADER: &str = "CODE";

/// Export column headers, in order.
pub fn headers() -> Vec<&'static str> {
    Column::ALL
        .iter()
        .map(|c| c.name())
        .chain(std::iter::once(CODE_HEADER))
        .collect()
}

/// Decide which records reach the spreadsheet.
///
/// When the registry join ran, records without a code are unresolvable and
/// dropped; their count is returned. In degraded mode (no registry) every
/// record is kept.
pub fn select_for_export(
    records: Vec<EnrichedRecord>,
    enrichment_ran: bool,
) -> (Vec<EnrichedRecord>, usize) {
    if !enrichment_ran {
        return (records, 0);
    }
    let before = records.len();
    let kept: Vec<EnrichedRecord> = records.into_iter().filter(|r| r.code.is_some()).collect();
    let dropped = before - kept.len();
    if dropped > 0 {
        warn!("Dropped {} records with no registry code", dropped);
    }
    (kept, dropped)
}

/// Build the workbook and return its bytes.
pub fn write_spreadsheet(records: &[EnrichedRecord]) -> Result<Vec<u8>, SafError> {
    build_workbook(records).map_err(|e| SafError::ExportFailed(e.to_string()))
}

fn build_workbook(records: &[EnrichedRecord]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let amount = Format::new().set_num_format("#,##0.00");

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;
    for (col, header) in headers().iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }
    sheet.set_column_width(0, 32)?;

    for (i, record) in records.iter().enumerate() {
        let row = (i + 1) as u32;
        sheet.write_string(row, 0, &record.municipality)?;
        for (offset, value) in record.values().iter().enumerate() {
            if let Some(v) = value {
                sheet.write_number_with_format(row, (offset + 1) as u16, *v, &amount)?;
            }
        }
        if let Some(code) = &record.code {
            sheet.write_string(row, 7, code)?;
        }
    }

    let bytes = workbook.save_to_buffer()?;
    info!("Spreadsheet built: {} rows, {} bytes", records.len(), bytes.len());
    Ok(bytes)
}
