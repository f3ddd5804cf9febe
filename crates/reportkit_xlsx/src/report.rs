//! Report facade: schema, template generation and report creation.

use std::any::Any;
use std::path::PathBuf;

use chrono::FixedOffset;
use tracing::info;

use crate::catalogue::build_template_workbook;
use crate::fill::TemplateFiller;
use crate::grid::{GridWorkbook, MemWorkbook};
use crate::reader::{read_template_xlsx, read_template_xlsx_from_bytes};
use crate::record::ReportRecord;
use crate::schema::KeySchema;
use crate::spec::{ReportError, SpecFillReport, SpecReportOptions};
use crate::util::{validate_policy_autofit, validate_sheet_name};
use crate::validate::validate_template;
use crate::writer::save_workbook_xlsx;

/// A data record bound to its key schema.
///
/// The schema is built once from `T` and is read-only afterwards, so one
/// `Report` can fill any number of templates.
pub struct Report<T: ReportRecord> {
    data: T,
    schema: KeySchema,
    options: SpecReportOptions,
}

impl<T: ReportRecord> Report<T> {
    /// Report with default options.
    pub fn new(data: T) -> Result<Self, ReportError> {
        Self::with_options(data, SpecReportOptions::default())
    }

    /// Report with explicit options.
    ///
    /// # Errors
    /// [`ReportError::InvalidOptions`] for an out-of-range UTC offset, an
    /// inverted autofit policy or unusable sheet names; schema errors from
    /// [`KeySchema::build`].
    pub fn with_options(data: T, options: SpecReportOptions) -> Result<Self, ReportError> {
        validate_report_options(&options)?;
        let schema = KeySchema::build::<T>()?;
        info!(
            record = T::type_name(),
            n_keys = schema.len(),
            n_complex = schema.complex_keys().count(),
            "report schema built"
        );
        Ok(Self {
            data,
            schema,
            options,
        })
    }

    /// Root record every fill reads from.
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Key schema built from `T` at construction.
    pub fn schema(&self) -> &KeySchema {
        &self.schema
    }

    /// Options validated at construction.
    pub fn options(&self) -> &SpecReportOptions {
        &self.options
    }

    /// Blank template with the key catalogue, in memory.
    pub fn build_template(&self) -> Result<MemWorkbook, ReportError> {
        build_template_workbook(&self.schema, &self.options)
    }

    /// Write a blank template with the key catalogue to `path_file_out`.
    pub fn create_template(&self, path_file_out: impl Into<PathBuf>) -> Result<(), ReportError> {
        let path_file_out = path_file_out.into();
        let wb = self.build_template()?;
        save_workbook_xlsx(&wb, path_file_out.clone())?;
        info!(
            path = %path_file_out.display(),
            n_sheets = wb.sheets().len(),
            "template created"
        );
        Ok(())
    }

    /// Validate and fill `wb` in place, then remove the catalogue and
    /// row-template sheets.
    ///
    /// Validation runs before any mutation, so a structure error leaves
    /// `wb` untouched.
    pub fn fill_workbook<W: GridWorkbook + ?Sized>(
        &self,
        wb: &mut W,
    ) -> Result<SpecFillReport, ReportError> {
        validate_template(&self.schema, wb, &self.options)?;
        let report = TemplateFiller::new(&self.schema, &self.options)
            .fill(wb, &self.data as &dyn Any)?;
        strip_auxiliary_sheets(wb, &self.schema, &self.options)?;
        Ok(report)
    }

    /// Fill the template at `path_template` and write the result.
    pub fn create_report(
        &self,
        path_template: impl Into<PathBuf>,
        path_file_out: impl Into<PathBuf>,
    ) -> Result<SpecFillReport, ReportError> {
        let path_template = path_template.into();
        let mut wb = read_template_xlsx(&path_template)?;
        self.finish_report(&mut wb, path_file_out.into())
    }

    /// Fill a template given as `.xlsx` bytes and write the result.
    pub fn create_report_from_bytes(
        &self,
        template: &[u8],
        path_file_out: impl Into<PathBuf>,
    ) -> Result<SpecFillReport, ReportError> {
        let mut wb = read_template_xlsx_from_bytes(template)?;
        self.finish_report(&mut wb, path_file_out.into())
    }

    fn finish_report(
        &self,
        wb: &mut MemWorkbook,
        path_file_out: PathBuf,
    ) -> Result<SpecFillReport, ReportError> {
        let report = self.fill_workbook(wb)?;
        save_workbook_xlsx(wb, path_file_out.clone())?;
        info!(
            path = %path_file_out.display(),
            n_sheets = wb.sheets().len(),
            summary = %report,
            "report created"
        );
        Ok(report)
    }
}

fn validate_report_options(options: &SpecReportOptions) -> Result<(), ReportError> {
    if FixedOffset::east_opt(options.utc_offset_seconds).is_none() {
        return Err(ReportError::InvalidOptions(format!(
            "utc offset out of range: {}s",
            options.utc_offset_seconds
        )));
    }
    validate_policy_autofit(&options.policy_autofit).map_err(ReportError::InvalidOptions)?;
    validate_sheet_name(&options.sheet_report_keys).map_err(ReportError::InvalidOptions)?;
    validate_sheet_name(&options.sheet_default).map_err(ReportError::InvalidOptions)?;
    if options.sheet_report_keys == options.sheet_default {
        return Err(ReportError::InvalidOptions(format!(
            "catalogue and default sheet share the name {:?}",
            options.sheet_default
        )));
    }
    Ok(())
}

/// Remove the catalogue sheet and every row-template sheet present in `wb`.
fn strip_auxiliary_sheets<W: GridWorkbook + ?Sized>(
    wb: &mut W,
    schema: &KeySchema,
    options: &SpecReportOptions,
) -> Result<(), ReportError> {
    for c_sheet in wb.sheet_names() {
        if c_sheet == options.sheet_report_keys || schema.is_complex(&c_sheet) {
            wb.remove_sheet(&c_sheet)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SpecFieldTable;
    use crate::spec::{EnumTemplateViolation, SpecAutofitCellsPolicy, SpecReportKey};
    use pretty_assertions::assert_eq;

    struct Line {
        label: String,
    }

    impl ReportRecord for Line {
        fn declare_keys(keys: &mut SpecFieldTable<Self>) {
            keys.single("label", SpecReportKey::single().named("label"), |l: &Line| {
                l.label.clone()
            });
        }
    }

    struct Summary {
        title: String,
        items: Vec<Line>,
    }

    impl ReportRecord for Summary {
        fn declare_keys(keys: &mut SpecFieldTable<Self>) {
            keys.single("title", SpecReportKey::single().named("title"), |s: &Summary| {
                s.title.clone()
            })
            .list("items", SpecReportKey::complex().named("items"), |s: &Summary| {
                Some(s.items.as_slice())
            });
        }
    }

    fn summary() -> Summary {
        Summary {
            title: "Report".to_string(),
            items: vec![
                Line {
                    label: "x".to_string(),
                },
                Line {
                    label: "y".to_string(),
                },
            ],
        }
    }

    fn template() -> MemWorkbook {
        let mut wb = MemWorkbook::new();
        wb.add_sheet("Sheet1")
            .unwrap()
            .write_str(0, 0, "title")
            .write_str(1, 0, "items");
        wb.add_sheet("items").unwrap().write_str(0, 0, "label");
        wb.add_sheet("REPORT_KEYS").unwrap().write_str(0, 0, "Key name");
        wb
    }

    #[test]
    fn fills_content_and_strips_auxiliary_sheets() {
        let report = Report::new(summary()).unwrap();
        let mut wb = template();

        let fill_report = report.fill_workbook(&mut wb).unwrap();

        let l_names: Vec<&str> = wb.sheets().iter().map(|s| s.name()).collect();
        assert_eq!(l_names, vec!["Sheet1"]);
        assert_eq!(
            wb.sheet("Sheet1").unwrap().to_string_grid(),
            vec![vec!["Report"], vec!["x"], vec!["y"]]
        );
        assert_eq!(fill_report.cnt_elements_expanded, 2);
    }

    #[test]
    fn invalid_template_is_left_untouched() {
        let report = Report::new(summary()).unwrap();
        let mut wb = template();
        wb.sheet_mut("Sheet1")
            .unwrap()
            .write_str(2, 0, "key_counter");
        let wb_before = wb.clone();

        let err = report.fill_workbook(&mut wb).unwrap_err();

        assert!(matches!(
            err,
            ReportError::TemplateStructure(EnumTemplateViolation::CounterOutsideComplex { .. })
        ));
        assert_eq!(wb, wb_before);
    }

    #[test]
    fn build_template_lists_keys() {
        let report = Report::new(summary()).unwrap();
        let wb = report.build_template().unwrap();
        let l_names: Vec<&str> = wb.sheets().iter().map(|s| s.name()).collect();
        assert_eq!(l_names, vec!["Sheet1", "items", "REPORT_KEYS"]);
        assert_eq!(report.schema().len(), 3);
    }

    #[test]
    fn out_of_range_options_are_rejected() {
        let options = SpecReportOptions {
            utc_offset_seconds: 25 * 3600,
            ..Default::default()
        };
        assert!(matches!(
            Report::with_options(summary(), options),
            Err(ReportError::InvalidOptions(_))
        ));

        let options = SpecReportOptions {
            policy_autofit: SpecAutofitCellsPolicy {
                width_cell_min: 50,
                width_cell_max: 10,
                width_cell_padding: 2,
            },
            ..Default::default()
        };
        assert!(matches!(
            Report::with_options(summary(), options),
            Err(ReportError::InvalidOptions(_))
        ));

        let options = SpecReportOptions {
            sheet_default: "REPORT_KEYS".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            Report::with_options(summary(), options),
            Err(ReportError::InvalidOptions(_))
        ));
    }

    #[test]
    fn offset_within_a_day_is_accepted() {
        let options = SpecReportOptions {
            utc_offset_seconds: -5 * 3600,
            ..Default::default()
        };
        let report = Report::with_options(summary(), options).unwrap();
        assert_eq!(report.options().utc_offset_seconds, -5 * 3600);
        assert_eq!(report.data().title, "Report");
    }
}
