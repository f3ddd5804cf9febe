//! Persist a [`MemWorkbook`] as `.xlsx` with `rust_xlsxwriter`.

use std::collections::BTreeSet;
use std::path::PathBuf;

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Formula, Image, Workbook, Worksheet, XlsxError};
use tracing::debug;

use crate::conf::{C_NUM_FORMAT_DATETIME_DEFAULT, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX};
use crate::grid::{MemCell, MemSheet, MemWorkbook};
use crate::spec::{EnumCellError, EnumCellValue, ReportError, SpecCellFormat, SpecCellRange};
use crate::util::{derive_excel_serial_from_datetime, validate_sheet_name};

/// Stateful workbook writer.
pub struct XlsxWriter {
    path_file_out: PathBuf,
    workbook: Workbook,
    set_sheet_names_existing: BTreeSet<String>,
    if_closed: bool,
}

impl XlsxWriter {
    /// Create writer bound to output path.
    ///
    /// The workbook is buffered in memory until [`Self::close`] is called.
    pub fn new(path_file_out: PathBuf) -> Self {
        Self {
            path_file_out,
            workbook: Workbook::new(),
            set_sheet_names_existing: BTreeSet::new(),
            if_closed: false,
        }
    }

    /// Return output file path as string.
    pub fn file_out(&self) -> String {
        self.path_file_out.to_string_lossy().to_string()
    }

    /// Flush workbook to disk. Idempotent.
    pub fn close(&mut self) -> Result<(), ReportError> {
        if self.if_closed {
            return Ok(());
        }
        self.workbook
            .save(&self.path_file_out)
            .map_err(derive_xlsx_error)?;
        self.if_closed = true;
        debug!(path = %self.file_out(), "workbook saved");
        Ok(())
    }

    /// Serialize the buffered workbook without touching disk.
    pub fn to_buffer(&mut self) -> Result<Vec<u8>, ReportError> {
        self.workbook.save_to_buffer().map_err(derive_xlsx_error)
    }

    /// Write every sheet, in workbook order.
    pub fn write_workbook(&mut self, wb: &MemWorkbook) -> Result<(), ReportError> {
        for sheet in wb.sheets() {
            self.write_sheet(sheet)?;
        }
        Ok(())
    }

    /// Write one sheet: widths, heights, merges, cells, then images.
    pub fn write_sheet(&mut self, sheet: &MemSheet) -> Result<(), ReportError> {
        let c_name = sheet.name();
        validate_sheet_name(c_name).map_err(ReportError::Xlsx)?;
        if !self.set_sheet_names_existing.insert(c_name.to_string()) {
            return Err(ReportError::Xlsx(format!("duplicate sheet name: {c_name:?}")));
        }

        let worksheet = self.workbook.add_worksheet();
        worksheet.set_name(c_name).map_err(derive_xlsx_error)?;

        for (n_col, f_width) in sheet.col_widths() {
            worksheet
                .set_column_width(n_col, f_width)
                .map_err(derive_xlsx_error)?;
        }
        for (n_row, row) in sheet.rows() {
            if let Some(f_height) = row.height_pt {
                worksheet
                    .set_row_height(n_row, f_height)
                    .map_err(derive_xlsx_error)?;
            }
        }

        let l_merged: Vec<SpecCellRange> = sheet
            .merged()
            .iter()
            .filter(|r| r.first_row != r.last_row || r.first_col != r.last_col)
            .copied()
            .collect();
        for region in &l_merged {
            let format = sheet
                .cell(region.first_row, region.first_col)
                .map(|cell| derive_rust_xlsx_format(&cell.format))
                .unwrap_or_default();
            worksheet
                .merge_range(
                    region.first_row,
                    region.first_col,
                    region.last_row,
                    region.last_col,
                    "",
                    &format,
                )
                .map_err(derive_xlsx_error)?;
        }

        let mut n_cells = 0_usize;
        for (n_row, row) in sheet.rows() {
            for (n_col, cell) in &row.cells {
                let n_col = *n_col;
                let if_covered = l_merged.iter().any(|r| {
                    r.contains(n_row, n_col) && (r.first_row, r.first_col) != (n_row, n_col)
                });
                if if_covered {
                    continue;
                }
                validate_cell_position(n_row, n_col)?;
                write_cell_with_format(worksheet, n_row, n_col, cell)?;
                n_cells += 1;
            }
        }

        for image in sheet.images() {
            let image_xlsx = Image::new_from_buffer(&image.bytes)
                .map_err(derive_xlsx_error)?
                .set_scale_width(image.scale_width)
                .set_scale_height(image.scale_height);
            worksheet
                .insert_image(image.anchor_row, image.anchor_col, &image_xlsx)
                .map_err(derive_xlsx_error)?;
        }

        debug!(
            sheet = c_name,
            n_cells,
            n_merged = l_merged.len(),
            n_images = sheet.images().len(),
            "sheet written"
        );
        Ok(())
    }
}

/// Write `wb` to `path_file_out`.
pub fn save_workbook_xlsx(wb: &MemWorkbook, path_file_out: PathBuf) -> Result<(), ReportError> {
    let mut writer = XlsxWriter::new(path_file_out);
    writer.write_workbook(wb)?;
    writer.close()
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &MemCell,
) -> Result<(), ReportError> {
    let format = derive_rust_xlsx_format(&cell.format);
    match &cell.value {
        EnumCellValue::None => {
            if cell.format != SpecCellFormat::default() {
                worksheet
                    .write_blank(row, col, &format)
                    .map_err(derive_xlsx_error)?;
            }
        }
        EnumCellValue::String(val) => {
            worksheet
                .write_string_with_format(row, col, val, &format)
                .map_err(derive_xlsx_error)?;
        }
        EnumCellValue::Number(val) => {
            worksheet
                .write_number_with_format(row, col, *val, &format)
                .map_err(derive_xlsx_error)?;
        }
        EnumCellValue::Bool(val) => {
            worksheet
                .write_boolean_with_format(row, col, *val, &format)
                .map_err(derive_xlsx_error)?;
        }
        EnumCellValue::DateTime(dt) => {
            let format = if cell.format.num_format.is_some() {
                format
            } else {
                derive_rust_xlsx_format(&cell.format.with_(SpecCellFormat::with_num_format(
                    C_NUM_FORMAT_DATETIME_DEFAULT,
                )))
            };
            worksheet
                .write_number_with_format(row, col, derive_excel_serial_from_datetime(dt), &format)
                .map_err(derive_xlsx_error)?;
        }
        EnumCellValue::Error(err) => {
            worksheet
                .write_formula_with_format(row, col, derive_error_formula(*err), &format)
                .map_err(derive_xlsx_error)?;
        }
    }
    Ok(())
}

/// Formula evaluating to `err`, with the error cached as its result.
fn derive_error_formula(err: EnumCellError) -> Formula {
    Formula::new(format!("={}", err.as_str())).set_result(err.as_str())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }

    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }

    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        0 => FormatBorder::None,
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        8 => FormatBorder::MediumDashed,
        9 => FormatBorder::DashDot,
        10 => FormatBorder::MediumDashDot,
        11 => FormatBorder::DashDotDot,
        12 => FormatBorder::MediumDashDotDot,
        13 => FormatBorder::SlantDashDot,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "fill" => Some(FormatAlign::Fill),
        "justify" => Some(FormatAlign::Justify),
        "center_across" => Some(FormatAlign::CenterAcross),
        "distributed" => Some(FormatAlign::Distributed),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        "vjustify" | "vertical_justify" => Some(FormatAlign::VerticalJustify),
        "vdistributed" | "vertical_distributed" => Some(FormatAlign::VerticalDistributed),
        _ => None,
    }
}

fn validate_cell_position(row: u32, col: u16) -> Result<(), ReportError> {
    if row >= N_NROWS_EXCEL_MAX || col >= N_NCOLS_EXCEL_MAX {
        return Err(ReportError::Xlsx(format!(
            "cell ({row}, {col}) is outside the Excel grid"
        )));
    }
    Ok(())
}

fn derive_xlsx_error(err: XlsxError) -> ReportError {
    ReportError::Xlsx(format!("xlsx write error: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_template_xlsx_from_bytes;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn border_and_align_lookup() {
        assert_eq!(derive_format_border(1), FormatBorder::Thin);
        assert_eq!(derive_format_border(99), FormatBorder::None);
        assert_eq!(derive_format_align(" Center "), Some(FormatAlign::Center));
        assert_eq!(derive_format_align("sideways"), None);
    }

    #[test]
    fn cells_and_merges_survive_a_write_read_cycle() {
        let dt = NaiveDate::from_ymd_opt(2022, 2, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let mut wb = MemWorkbook::new();
        wb.add_sheet("Data")
            .unwrap()
            .write_str(0, 0, "title")
            .write(1, 0, EnumCellValue::Number(10.5))
            .write(1, 1, EnumCellValue::Bool(true))
            .write(2, 0, EnumCellValue::Error(EnumCellError::Num))
            .write(3, 0, EnumCellValue::DateTime(dt))
            .merge(SpecCellRange::new(0, 0, 0, 2))
            .set_col_width(0, 20.0);

        let mut writer = XlsxWriter::new(PathBuf::from("unused.xlsx"));
        writer.write_workbook(&wb).unwrap();
        let bytes = writer.to_buffer().unwrap();

        let wb_read = read_template_xlsx_from_bytes(&bytes).unwrap();
        let sheet = wb_read.sheet("Data").unwrap();
        assert_eq!(sheet.value(0, 0), Some(&EnumCellValue::String("title".to_string())));
        assert_eq!(sheet.value(1, 0), Some(&EnumCellValue::Number(10.5)));
        assert_eq!(sheet.value(1, 1), Some(&EnumCellValue::Bool(true)));
        assert_eq!(sheet.merged(), &[SpecCellRange::new(0, 0, 0, 2)]);
    }

    #[test]
    fn invalid_and_duplicate_sheet_names_are_rejected() {
        let mut wb = MemWorkbook::new();
        wb.add_sheet("bad/name").unwrap();
        let mut writer = XlsxWriter::new(PathBuf::from("unused.xlsx"));
        assert!(matches!(writer.write_workbook(&wb), Err(ReportError::Xlsx(_))));

        let mut wb = MemWorkbook::new();
        wb.add_sheet("S").unwrap();
        let mut writer = XlsxWriter::new(PathBuf::from("unused.xlsx"));
        writer.write_workbook(&wb).unwrap();
        assert!(matches!(writer.write_workbook(&wb), Err(ReportError::Xlsx(_))));
    }
}
