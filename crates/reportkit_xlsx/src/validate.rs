//! Structural template checks, run before any mutation.

use std::collections::BTreeMap;

use tracing::debug;

use crate::conf::C_KEY_COUNTER;
use crate::grid::GridWorkbook;
use crate::schema::KeySchema;
use crate::spec::{EnumTemplateViolation, ReportError, SpecReportOptions};

/// Placeholder texts of every sheet, row-major, in workbook order.
pub fn derive_sheet_placeholders<W: GridWorkbook + ?Sized>(
    schema: &KeySchema,
    wb: &W,
) -> BTreeMap<String, Vec<String>> {
    let mut dict_placeholders = BTreeMap::new();
    for c_sheet in wb.sheet_names() {
        let mut l_found = Vec::new();
        if let Some(n_row_last) = wb.last_row(&c_sheet) {
            for n_row in 0..=n_row_last {
                for n_col in wb.row_columns(&c_sheet, n_row) {
                    if let Some(c_text) = wb.cell_string(&c_sheet, n_row, n_col)
                        && schema.is_placeholder(&c_text)
                    {
                        l_found.push(c_text);
                    }
                }
            }
        }
        dict_placeholders.insert(c_sheet, l_found);
    }
    dict_placeholders
}

/// Reject templates that cannot be filled.
///
/// Checks, in order: row-template sheets referencing their own key, the
/// counter outside row-template sheets, and cycles among row-template sheets.
/// The key catalogue sheet is ignored.
pub fn validate_template<W: GridWorkbook + ?Sized>(
    schema: &KeySchema,
    wb: &W,
    options: &SpecReportOptions,
) -> Result<(), ReportError> {
    let dict_placeholders = derive_sheet_placeholders(schema, wb);

    for c_sheet in wb.sheet_names() {
        if c_sheet == options.sheet_report_keys {
            continue;
        }
        let l_found = dict_placeholders
            .get(&c_sheet)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if schema.is_complex(&c_sheet) {
            if l_found.iter().any(|c_text| *c_text == c_sheet) {
                return Err(EnumTemplateViolation::SelfReference { sheet: c_sheet }.into());
            }
        } else if l_found.iter().any(|c_text| c_text == C_KEY_COUNTER) {
            return Err(EnumTemplateViolation::CounterOutsideComplex { sheet: c_sheet }.into());
        }
    }

    for c_sheet in wb.sheet_names() {
        if schema.is_complex(&c_sheet) {
            let mut l_path_open = Vec::new();
            validate_acyclic_from(schema, &dict_placeholders, &c_sheet, &mut l_path_open)?;
        }
    }

    debug!(
        n_sheets = dict_placeholders.len(),
        "template structure validated"
    );
    Ok(())
}

fn validate_acyclic_from(
    schema: &KeySchema,
    dict_placeholders: &BTreeMap<String, Vec<String>>,
    sheet: &str,
    l_path_open: &mut Vec<String>,
) -> Result<(), ReportError> {
    if l_path_open.iter().any(|c_open| c_open == sheet) {
        let mut l_chain = l_path_open.clone();
        l_chain.push(sheet.to_string());
        return Err(EnumTemplateViolation::LoopedComplexKeys { chain: l_chain }.into());
    }

    l_path_open.push(sheet.to_string());
    if let Some(l_found) = dict_placeholders.get(sheet) {
        for c_child in l_found {
            if schema.is_complex(c_child) && dict_placeholders.contains_key(c_child) {
                validate_acyclic_from(schema, dict_placeholders, c_child, l_path_open)?;
            }
        }
    }
    l_path_open.pop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::MemWorkbook;
    use crate::record::{ReportRecord, SpecFieldTable};
    use crate::spec::SpecReportKey;
    use pretty_assertions::assert_eq;

    struct Leaf;

    impl ReportRecord for Leaf {
        fn declare_keys(keys: &mut SpecFieldTable<Self>) {
            keys.single("v", SpecReportKey::single().named("v"), |_| "leaf");
        }
    }

    struct Root {
        a: Vec<Leaf>,
        b: Vec<Leaf>,
        c: Vec<Leaf>,
        d: Vec<Leaf>,
    }

    impl ReportRecord for Root {
        fn declare_keys(keys: &mut SpecFieldTable<Self>) {
            keys.list("a", SpecReportKey::complex().named("A"), |r: &Root| {
                Some(r.a.as_slice())
            })
            .list("b", SpecReportKey::complex().named("B"), |r: &Root| {
                Some(r.b.as_slice())
            })
            .list("c", SpecReportKey::complex().named("C"), |r: &Root| {
                Some(r.c.as_slice())
            })
            .list("d", SpecReportKey::complex().named("D"), |r: &Root| {
                Some(r.d.as_slice())
            });
        }
    }

    fn build_workbook(l_sheets: &[(&str, &[&str])]) -> MemWorkbook {
        let mut wb = MemWorkbook::new();
        for (c_sheet, l_texts) in l_sheets {
            let sheet = wb.add_sheet(c_sheet).unwrap();
            for (n_row, c_text) in l_texts.iter().enumerate() {
                sheet.write_str(n_row as u32, 0, c_text);
            }
        }
        wb
    }

    fn validate(wb: &MemWorkbook) -> Result<(), ReportError> {
        let schema = KeySchema::build::<Root>().unwrap();
        validate_template(&schema, wb, &SpecReportOptions::default())
    }

    #[test]
    fn accepts_diamond_references() {
        let wb = build_workbook(&[
            ("Sheet1", &["A", "B"]),
            ("A", &["C", "key_counter"]),
            ("B", &["C"]),
            ("C", &["v"]),
        ]);
        assert!(validate(&wb).is_ok());
    }

    #[test]
    fn accepts_diamond_below_a_single_root() {
        let wb = build_workbook(&[
            ("Sheet1", &["A"]),
            ("A", &["B", "C"]),
            ("B", &["D"]),
            ("C", &["D", "key_counter"]),
            ("D", &["v"]),
        ]);
        assert!(validate(&wb).is_ok());
    }

    #[test]
    fn rejects_cycle_closing_below_a_diamond() {
        let wb = build_workbook(&[
            ("Sheet1", &["A"]),
            ("A", &["B", "C"]),
            ("B", &["D"]),
            ("C", &["D"]),
            ("D", &["A"]),
        ]);
        let err = validate(&wb).unwrap_err();
        match err {
            ReportError::TemplateStructure(EnumTemplateViolation::LoopedComplexKeys { chain }) => {
                assert_eq!(chain, vec!["A", "B", "D", "A"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_two_sheet_cycle() {
        let wb = build_workbook(&[("Sheet1", &["A"]), ("A", &["B"]), ("B", &["A"])]);
        let err = validate(&wb).unwrap_err();
        match err {
            ReportError::TemplateStructure(EnumTemplateViolation::LoopedComplexKeys { chain }) => {
                assert_eq!(chain, vec!["A", "B", "A"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_self_reference() {
        let wb = build_workbook(&[("A", &["v", "A"])]);
        assert!(matches!(
            validate(&wb),
            Err(ReportError::TemplateStructure(
                EnumTemplateViolation::SelfReference { ref sheet }
            )) if sheet == "A"
        ));
    }

    #[test]
    fn rejects_counter_on_content_sheet() {
        let wb = build_workbook(&[("Sheet1", &["key_counter"])]);
        assert!(matches!(
            validate(&wb),
            Err(ReportError::TemplateStructure(
                EnumTemplateViolation::CounterOutsideComplex { .. }
            ))
        ));
    }

    #[test]
    fn ignores_catalogue_sheet() {
        let wb = build_workbook(&[("REPORT_KEYS", &["A", "key_counter"]), ("A", &["v"])]);
        assert!(validate(&wb).is_ok());
    }

    #[test]
    fn placeholder_scan_is_row_major() {
        let schema = KeySchema::build::<Root>().unwrap();
        let mut wb = MemWorkbook::new();
        wb.add_sheet("S")
            .unwrap()
            .write_str(1, 0, "B")
            .write_str(0, 3, "A")
            .write_str(0, 1, "text")
            .write_str(0, 0, "v");
        let dict_placeholders = derive_sheet_placeholders(&schema, &wb);
        assert_eq!(dict_placeholders["S"], vec!["v", "A", "B"]);
    }
}
