//! Load `.xlsx` templates into a [`MemWorkbook`].
//!
//! Cell values, merged regions, cell styles, custom column widths and custom
//! row heights are read, so a filled template keeps its look and a date
//! format on a placeholder cell selects native temporal output.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use calamine_styles::{
    BorderStyle as CalBorderStyle, CellErrorType, Color, Data, FillPattern, FontStyle,
    FontWeight, HorizontalAlignment, Reader, Style, StyleRange, VerticalAlignment,
    WorksheetLayout, Xlsx,
};
use tracing::debug;

use crate::conf::{F_COL_WIDTH_PADDING_TOL, TUP_COL_WIDTH_PADDINGS_STORED};
use crate::grid::{MemSheet, MemWorkbook};
use crate::spec::{EnumCellError, EnumCellValue, ReportError, SpecCellFormat, SpecCellRange};
use crate::util::derive_datetime_from_excel_serial;

/// Read a template file.
pub fn read_template_xlsx(path: impl AsRef<Path>) -> Result<MemWorkbook, ReportError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| {
        ReportError::Xlsx(format!("failed to open template {}: {err}", path.display()))
    })?;
    let workbook = Xlsx::new(BufReader::new(file)).map_err(|err| {
        ReportError::Xlsx(format!("failed to open template {}: {err}", path.display()))
    })?;
    load_workbook(workbook)
}

/// Read a template from in-memory `.xlsx` bytes.
pub fn read_template_xlsx_from_bytes(bytes: &[u8]) -> Result<MemWorkbook, ReportError> {
    let workbook = Xlsx::new(Cursor::new(bytes))
        .map_err(|err| ReportError::Xlsx(format!("failed to open template bytes: {err}")))?;
    load_workbook(workbook)
}

fn load_workbook<RS: Read + Seek>(mut workbook: Xlsx<RS>) -> Result<MemWorkbook, ReportError> {
    workbook
        .load_merged_regions()
        .map_err(|err| ReportError::Xlsx(format!("failed to load merged regions: {err}")))?;

    let mut wb = MemWorkbook::new();
    for c_sheet in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&c_sheet)
            .map_err(|err| ReportError::Xlsx(format!("failed to read sheet {c_sheet:?}: {err}")))?;
        let l_merged = workbook
            .worksheet_merge_cells(&c_sheet)
            .unwrap_or(Ok(Vec::new()))
            .map_err(|err| ReportError::Xlsx(format!("failed to read merges of {c_sheet:?}: {err}")))?;
        let styles = workbook
            .worksheet_style(&c_sheet)
            .map_err(|err| ReportError::Xlsx(format!("failed to read styles of {c_sheet:?}: {err}")))?;
        let layout = workbook
            .worksheet_layout(&c_sheet)
            .map_err(|err| ReportError::Xlsx(format!("failed to read layout of {c_sheet:?}: {err}")))?;

        // Styled blank cells only matter inside the used area.
        let mut n_row_last = range.end().map_or(0, |(n_row, _)| n_row);
        let mut n_col_last = range.end().map_or(0, |(_, n_col)| n_col);
        for dims in &l_merged {
            n_row_last = n_row_last.max(dims.end.0);
            n_col_last = n_col_last.max(dims.end.1);
        }

        let sheet = wb.add_sheet(&c_sheet)?;
        if let Some((n_row_start, n_col_start)) = range.start() {
            for (n_row_rel, n_col_rel, data) in range.cells() {
                let value = convert_calamine_data(data);
                if value == EnumCellValue::None {
                    continue;
                }
                let n_row = n_row_start + n_row_rel as u32;
                let n_col = cast_col_num(n_col_start + n_col_rel as u32)?;
                sheet.write(n_row, n_col, value);
            }
        }
        for dims in &l_merged {
            sheet.merge(SpecCellRange::new(
                dims.start.0,
                dims.end.0,
                cast_col_num(dims.start.1)?,
                cast_col_num(dims.end.1)?,
            ));
        }
        let n_styled = load_cell_styles(sheet, &styles, n_row_last, n_col_last)?;
        load_layout(sheet, &layout, n_row_last, n_col_last)?;
        debug!(
            sheet = %c_sheet,
            n_merged = l_merged.len(),
            n_styled,
            "template sheet loaded"
        );
    }
    Ok(wb)
}

/// Copy every non-default cell style up to the last used row and column.
fn load_cell_styles(
    sheet: &mut MemSheet,
    styles: &StyleRange,
    n_row_last: u32,
    n_col_last: u32,
) -> Result<usize, ReportError> {
    let Some((n_row_origin, n_col_origin)) = styles.start() else {
        return Ok(0);
    };
    let mut n_styled = 0;
    for n_row in n_row_origin..=n_row_last {
        for n_col in n_col_origin..=n_col_last {
            let pos = ((n_row - n_row_origin) as usize, (n_col - n_col_origin) as usize);
            let Some(style) = styles.get(pos) else {
                continue;
            };
            let format = convert_calamine_style(style);
            if format == SpecCellFormat::default() {
                continue;
            }
            sheet.set_format(n_row, cast_col_num(n_col)?, format);
            n_styled += 1;
        }
    }
    Ok(n_styled)
}

/// Copy custom column widths and row heights up to the last used row and column.
fn load_layout(
    sheet: &mut MemSheet,
    layout: &WorksheetLayout,
    n_row_last: u32,
    n_col_last: u32,
) -> Result<(), ReportError> {
    for n_col in 0..=n_col_last {
        if let Some(width) = layout
            .get_column_width(n_col)
            .filter(|cw| cw.custom_width)
        {
            sheet.set_col_width(cast_col_num(n_col)?, strip_col_width_padding(width.width));
        }
    }
    for n_row in 0..=n_row_last {
        if let Some(height) = layout
            .get_row_height(n_row)
            .filter(|rh| rh.custom_height)
        {
            sheet.set_row_height(n_row, height.height);
        }
    }
    Ok(())
}

/// Convert one calamine cell to a grid value.
pub fn convert_calamine_data(data: &Data) -> EnumCellValue {
    match data {
        Data::Empty => EnumCellValue::None,
        Data::String(s) => EnumCellValue::String(s.clone()),
        Data::Float(x) => EnumCellValue::Number(*x),
        Data::Int(n) => EnumCellValue::Number(*n as f64),
        Data::Bool(b) => EnumCellValue::Bool(*b),
        Data::DateTime(dt) => match derive_datetime_from_excel_serial(dt.as_f64()) {
            Some(dt) => EnumCellValue::DateTime(dt),
            None => EnumCellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => EnumCellValue::String(s.clone()),
        Data::Error(err) => EnumCellValue::Error(convert_calamine_error(err)),
    }
}

/// Convert one calamine cell style to a grid cell format.
///
/// Defaults (`General` number format, no fill, general/bottom alignment, no
/// border) are left unset so they do not override the writer's defaults.
pub fn convert_calamine_style(style: &Style) -> SpecCellFormat {
    let mut format = SpecCellFormat::default();

    if let Some(font) = &style.font {
        if font.weight == FontWeight::Bold {
            format.bold = Some(true);
        }
        if font.style == FontStyle::Italic {
            format.italic = Some(true);
        }
        format.font_name = font.name.clone();
        format.font_size = font.size.map(|f_size| f_size.round() as i64);
        format.font_color = font.color.as_ref().map(derive_color_hex);
    }
    if let Some(fill) = &style.fill
        && fill.pattern != FillPattern::None
    {
        format.bg_color = fill.get_color().as_ref().map(derive_color_hex);
    }
    if let Some(nf) = &style.number_format
        && nf.format_code != "General"
    {
        format.num_format = Some(nf.format_code.clone());
    }
    if let Some(alignment) = &style.alignment {
        format.align = derive_align_name(&alignment.horizontal).map(str::to_string);
        format.valign = derive_valign_name(&alignment.vertical).map(str::to_string);
        if alignment.wrap_text {
            format.text_wrap = Some(true);
        }
    }
    if let Some(borders) = &style.borders {
        format.border = derive_border_code([
            &borders.top.style,
            &borders.bottom.style,
            &borders.left.style,
            &borders.right.style,
        ]);
    }
    format
}

fn derive_color_hex(color: &Color) -> String {
    format!("#{:02X}{:02X}{:02X}", color.red, color.green, color.blue)
}

fn derive_align_name(align: &HorizontalAlignment) -> Option<&'static str> {
    match align {
        HorizontalAlignment::General => None,
        HorizontalAlignment::Left => Some("left"),
        HorizontalAlignment::Center => Some("center"),
        HorizontalAlignment::Right => Some("right"),
        HorizontalAlignment::Justify => Some("justify"),
        HorizontalAlignment::Distributed => Some("distributed"),
        HorizontalAlignment::Fill => Some("fill"),
    }
}

fn derive_valign_name(align: &VerticalAlignment) -> Option<&'static str> {
    match align {
        VerticalAlignment::Bottom => None,
        VerticalAlignment::Top => Some("top"),
        VerticalAlignment::Center => Some("vcenter"),
        VerticalAlignment::Justify => Some("vjustify"),
        VerticalAlignment::Distributed => Some("vdistributed"),
    }
}

/// Border code of the first styled edge (top, bottom, left, right).
///
/// Grid formats carry one border style for all sides.
fn derive_border_code(l_edges: [&CalBorderStyle; 4]) -> Option<i64> {
    l_edges
        .into_iter()
        .find(|style| **style != CalBorderStyle::None)
        .map(|style| match style {
            CalBorderStyle::None => 0,
            CalBorderStyle::Thin => 1,
            CalBorderStyle::Medium => 2,
            CalBorderStyle::Dashed => 3,
            CalBorderStyle::Dotted => 4,
            CalBorderStyle::Thick => 5,
            CalBorderStyle::Double => 6,
            CalBorderStyle::Hair => 7,
            CalBorderStyle::MediumDashed => 8,
            CalBorderStyle::DashDot => 9,
            CalBorderStyle::DashDotDot => 11,
            CalBorderStyle::SlantDashDot => 13,
        })
}

/// Column width in character units without the stored font-metric padding.
fn strip_col_width_padding(width_raw: f64) -> f64 {
    let f_frac = width_raw % 1.0;
    for f_padding in TUP_COL_WIDTH_PADDINGS_STORED {
        if (f_frac - f_padding).abs() < F_COL_WIDTH_PADDING_TOL && width_raw >= f_padding {
            return ((width_raw - f_padding) * 10_000.0).round() / 10_000.0;
        }
    }
    (width_raw * 10_000.0).round() / 10_000.0
}

fn convert_calamine_error(err: &CellErrorType) -> EnumCellError {
    match err {
        CellErrorType::Div0 => EnumCellError::Div0,
        CellErrorType::NA | CellErrorType::GettingData => EnumCellError::Na,
        CellErrorType::Name => EnumCellError::Name,
        CellErrorType::Null => EnumCellError::Null,
        CellErrorType::Num => EnumCellError::Num,
        CellErrorType::Ref => EnumCellError::Ref,
        CellErrorType::Value => EnumCellError::Value,
    }
}

fn cast_col_num(value: u32) -> Result<u16, ReportError> {
    u16::try_from(value).map_err(|_| ReportError::Xlsx(format!("column index overflow: {value}")))
}
