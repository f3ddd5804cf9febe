//! Template skeleton and key catalogue generation.

use tracing::debug;

use crate::conf::{
    C_COUNTER_DESCRIPTION, C_KEY_COUNTER, TUP_CATALOGUE_HEADERS, derive_catalogue_header_format,
};
use crate::grid::{MemSheet, MemWorkbook};
use crate::schema::KeySchema;
use crate::spec::{EnumCellValue, EnumDataType, ReportError, SpecAutofitCellsPolicy, SpecReportOptions};
use crate::util::{derive_autofit_width, estimate_unicode_string_width};

/// Build a fresh template: the default content sheet, one empty
/// row-template sheet per complex key, and the catalogue sheet last.
pub fn build_template_workbook(
    schema: &KeySchema,
    options: &SpecReportOptions,
) -> Result<MemWorkbook, ReportError> {
    let mut wb = MemWorkbook::new();
    wb.add_sheet(&options.sheet_default)?;
    for c_key in schema.complex_keys() {
        wb.add_sheet(c_key)?;
    }
    let sheet_catalogue = wb.add_sheet(&options.sheet_report_keys)?;
    fill_catalogue_sheet(sheet_catalogue, schema, &options.policy_autofit);

    debug!(
        n_sheets = wb.sheets().len(),
        n_keys = schema.len(),
        "template skeleton built"
    );
    Ok(wb)
}

/// Write the header, one row per key and the counter row, then size columns.
pub fn fill_catalogue_sheet(
    sheet: &mut MemSheet,
    schema: &KeySchema,
    policy: &SpecAutofitCellsPolicy,
) {
    let fmt_header = derive_catalogue_header_format();
    for (n_col, c_header) in TUP_CATALOGUE_HEADERS.iter().enumerate() {
        sheet
            .write_str(0, n_col as u16, c_header)
            .set_format(0, n_col as u16, fmt_header.clone());
    }

    let mut n_row = 1_u32;
    for binding in schema.bindings() {
        sheet
            .write_str(n_row, 0, &binding.name)
            .write_str(n_row, 1, binding.key_kind().as_str())
            .write_str(n_row, 2, binding.data_type().as_str())
            .write_str(n_row, 3, if binding.if_temporary() { "true" } else { "false" });
        match binding.data_type() {
            EnumDataType::Date => {
                sheet.write_str(n_row, 4, &binding.key.date_pattern);
            }
            EnumDataType::Time => {
                sheet.write_str(n_row, 5, &binding.key.time_pattern);
            }
            _ => {}
        }
        sheet.write_str(n_row, 6, &binding.description);
        n_row += 1;
    }
    sheet
        .write_str(n_row, 0, C_KEY_COUNTER)
        .write_str(n_row, 6, C_COUNTER_DESCRIPTION);

    apply_autofit_widths(sheet, policy);
}

fn apply_autofit_widths(sheet: &mut MemSheet, policy: &SpecAutofitCellsPolicy) {
    let mut l_len_max = vec![0_usize; TUP_CATALOGUE_HEADERS.len()];
    for (_, row) in sheet.rows() {
        for (n_col, cell) in &row.cells {
            if let (Some(n_len_max), EnumCellValue::String(c_text)) =
                (l_len_max.get_mut(*n_col as usize), &cell.value)
            {
                *n_len_max = (*n_len_max).max(estimate_unicode_string_width(c_text));
            }
        }
    }
    for (n_col, n_len) in l_len_max.into_iter().enumerate() {
        sheet.set_col_width(n_col as u16, derive_autofit_width(n_len, policy));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ReportRecord, SpecFieldTable};
    use crate::spec::SpecReportKey;
    use pretty_assertions::assert_eq;

    struct Line {
        at: i64,
    }

    impl ReportRecord for Line {
        fn declare_keys(keys: &mut SpecFieldTable<Self>) {
            keys.single(
                "at",
                SpecReportKey::single()
                    .typed(EnumDataType::Time)
                    .temporary(),
                |l: &Line| l.at,
            );
        }
    }

    struct Invoice {
        issued: i64,
        lines: Vec<Line>,
    }

    impl ReportRecord for Invoice {
        fn declare_keys(keys: &mut SpecFieldTable<Self>) {
            keys.single(
                "issued",
                SpecReportKey::single().typed(EnumDataType::Date),
                |i: &Invoice| i.issued,
            )
            .list("lines", SpecReportKey::complex(), |i: &Invoice| {
                Some(i.lines.as_slice())
            });
        }
    }

    #[test]
    fn template_has_content_row_template_and_catalogue_sheets() {
        let schema = KeySchema::build::<Invoice>().unwrap();
        let wb = build_template_workbook(&schema, &SpecReportOptions::default()).unwrap();

        let l_names: Vec<&str> = wb.sheets().iter().map(|s| s.name()).collect();
        assert_eq!(l_names, vec!["Sheet1", "complex_Invoice_lines", "REPORT_KEYS"]);

        let sheet = wb.sheet("REPORT_KEYS").unwrap();
        assert_eq!(
            sheet.to_string_grid(),
            vec![
                vec![
                    "Key name",
                    "Key type",
                    "Data type",
                    "Temporary key",
                    "Date format",
                    "Time format",
                    "Key description",
                ],
                vec![
                    "key_Invoice_issued",
                    "SINGLE",
                    "DATE",
                    "false",
                    "dd.MM.yyyy",
                    "",
                    "object: Invoice, field: issued",
                ],
                vec![
                    "complex_Invoice_lines",
                    "COMPLEX",
                    "TEXT",
                    "false",
                    "",
                    "",
                    "object: Invoice, field: lines",
                ],
                vec![
                    "key_Line_at",
                    "SINGLE",
                    "TIME",
                    "true",
                    "",
                    "HH:mm:ss",
                    "object: Line, field: at",
                ],
                vec!["key_counter", "", "", "", "", "", C_COUNTER_DESCRIPTION],
            ]
        );
        assert_eq!(sheet.cell(0, 0).unwrap().format.bold, Some(true));
    }

    #[test]
    fn catalogue_columns_are_autofit() {
        let schema = KeySchema::build::<Invoice>().unwrap();
        let wb = build_template_workbook(&schema, &SpecReportOptions::default()).unwrap();
        let l_widths: Vec<(u16, f64)> = wb.sheet("REPORT_KEYS").unwrap().col_widths().collect();

        assert_eq!(l_widths.len(), 7);
        assert_eq!(l_widths[0], (0, 23.0));
        assert_eq!(l_widths[1], (1, 10.0));
        assert_eq!(l_widths[6], (6, 89.0));
    }
}
