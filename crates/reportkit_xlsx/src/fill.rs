//! Template filling: placeholder resolution, list expansion and coercion.
//!
//! Placeholders of a sheet are collected row-major before any mutation.
//! Every resolution reports how it moved the rows below it, and the pending
//! positions are adjusted so later placeholders are still found after rows
//! are inserted or deleted above them.

use std::any::Any;
use std::io;

use tracing::{debug, warn};

use crate::conf::C_KEY_COUNTER;
use crate::grid::GridWorkbook;
use crate::record::{EnumAccessError, EnumFieldValue};
use crate::schema::{KeySchema, SpecKeyBinding};
use crate::spec::{
    EnumCellValue, EnumDataType, EnumKeyKind, EnumTemplateViolation, ReportError, SpecFillReport,
    SpecImageHandle, SpecReportOptions,
};
use crate::util::{
    convert_field_value_to_millis, convert_field_value_to_number,
    convert_millis_to_local_datetime, convert_number_to_cell_value, format_datetime_with_pattern,
    is_text_num_format, plan_image_scale_by_width, plan_image_scale_in_box,
};

////////////////////////////////////////////////////////////////////////////////
// #region FillState

#[derive(Debug, Clone)]
struct SpecPendingCell {
    row: u32,
    col: u16,
    key: String,
    if_alive: bool,
}

/// Row movement caused by resolving one placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SpecRowEffect {
    /// Row of the placeholder, when that row no longer exists.
    row_removed: Option<u32>,
    /// Shift applied to every row below the placeholder row.
    delta_below: i64,
}

impl SpecRowEffect {
    const NONE: Self = Self {
        row_removed: None,
        delta_below: 0,
    };
}

struct SpecScope<'d> {
    data: &'d dyn Any,
    counter: usize,
}

fn derive_row_offset(row: u32, delta: i64) -> Result<u32, ReportError> {
    u32::try_from(i64::from(row) + delta)
        .map_err(|_| ReportError::Grid(format!("row offset out of bounds: {row} by {delta}")))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TemplateFiller

/// Fills content sheets of a validated template from a root record.
pub struct TemplateFiller<'a> {
    schema: &'a KeySchema,
    options: &'a SpecReportOptions,
}

impl<'a> TemplateFiller<'a> {
    /// Filler over a schema.
    pub fn new(schema: &'a KeySchema, options: &'a SpecReportOptions) -> Self {
        Self { schema, options }
    }

    /// Fill every content sheet, in workbook order.
    ///
    /// The catalogue sheet and row-template sheets are left untouched.
    pub fn fill<W: GridWorkbook + ?Sized>(
        &self,
        wb: &mut W,
        root: &dyn Any,
    ) -> Result<SpecFillReport, ReportError> {
        let mut report = SpecFillReport::default();
        let scope = SpecScope {
            data: root,
            counter: 0,
        };

        for c_sheet in wb.sheet_names() {
            if c_sheet == self.options.sheet_report_keys || self.schema.is_complex(&c_sheet) {
                continue;
            }
            let Some(n_row_last) = wb.last_row(&c_sheet) else {
                continue;
            };
            let l_cells = self.collect_placeholders(wb, &c_sheet, 0, n_row_last);
            debug!(sheet = %c_sheet, n_placeholders = l_cells.len(), "filling sheet");
            self.resolve_cells(wb, &c_sheet, l_cells, &scope, &mut report)?;
        }
        Ok(report)
    }

    fn collect_placeholders<W: GridWorkbook + ?Sized>(
        &self,
        wb: &W,
        sheet: &str,
        first_row: u32,
        last_row: u32,
    ) -> Vec<SpecPendingCell> {
        let mut l_cells = Vec::new();
        for n_row in first_row..=last_row {
            for n_col in wb.row_columns(sheet, n_row) {
                if let Some(c_text) = wb.cell_string(sheet, n_row, n_col)
                    && self.schema.is_placeholder(&c_text)
                {
                    l_cells.push(SpecPendingCell {
                        row: n_row,
                        col: n_col,
                        key: c_text,
                        if_alive: true,
                    });
                }
            }
        }
        l_cells
    }

    /// Resolve placeholders in order; return the net row shift they caused.
    fn resolve_cells<W: GridWorkbook + ?Sized>(
        &self,
        wb: &mut W,
        sheet: &str,
        mut l_cells: Vec<SpecPendingCell>,
        scope: &SpecScope<'_>,
        report: &mut SpecFillReport,
    ) -> Result<i64, ReportError> {
        let mut n_delta_total = 0_i64;

        for n_idx in 0..l_cells.len() {
            if !l_cells[n_idx].if_alive {
                continue;
            }
            let effect = self.resolve_cell(wb, sheet, &l_cells, n_idx, scope, report)?;
            if effect == SpecRowEffect::NONE {
                continue;
            }

            let n_row_origin = l_cells[n_idx].row;
            let c_key_origin = l_cells[n_idx].key.clone();
            for (n_other, cell) in l_cells.iter_mut().enumerate() {
                if !cell.if_alive {
                    continue;
                }
                if effect.row_removed.is_some() && cell.row == n_row_origin {
                    if n_other > n_idx {
                        record_warning(
                            report,
                            format!(
                                "placeholder {:?} on sheet {sheet:?} was removed together with the row of {c_key_origin:?}",
                                cell.key
                            ),
                        );
                    }
                    cell.if_alive = false;
                } else if cell.row > n_row_origin {
                    cell.row = derive_row_offset(cell.row, effect.delta_below)?;
                }
            }
            n_delta_total += effect.delta_below;
        }
        Ok(n_delta_total)
    }

    fn resolve_cell<W: GridWorkbook + ?Sized>(
        &self,
        wb: &mut W,
        sheet: &str,
        l_cells: &[SpecPendingCell],
        n_idx: usize,
        scope: &SpecScope<'_>,
        report: &mut SpecFillReport,
    ) -> Result<SpecRowEffect, ReportError> {
        let cell = &l_cells[n_idx];
        if cell.key == C_KEY_COUNTER {
            wb.set_cell_value(
                sheet,
                cell.row,
                cell.col,
                EnumCellValue::Number(scope.counter as f64),
            )?;
            report.cnt_cells_filled += 1;
            return Ok(SpecRowEffect::NONE);
        }

        let Some(binding) = self.schema.get(&cell.key) else {
            return Ok(SpecRowEffect::NONE);
        };
        match binding.key_kind() {
            EnumKeyKind::Single => self.fill_single(wb, sheet, l_cells, n_idx, binding, scope, report),
            EnumKeyKind::Complex => {
                self.fill_complex(wb, sheet, l_cells, n_idx, binding, scope, report)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn fill_single<W: GridWorkbook + ?Sized>(
        &self,
        wb: &mut W,
        sheet: &str,
        l_cells: &[SpecPendingCell],
        n_idx: usize,
        binding: &SpecKeyBinding,
        scope: &SpecScope<'_>,
        report: &mut SpecFillReport,
    ) -> Result<SpecRowEffect, ReportError> {
        let cell = &l_cells[n_idx];
        let value = match binding.read_value(scope.data) {
            Ok(value) => value,
            Err(EnumAccessError::Unavailable(c_reason)) => {
                record_warning(
                    report,
                    format!("key {:?} is unavailable ({c_reason}); treated as absent", binding.name),
                );
                None
            }
            Err(EnumAccessError::ScopeMismatch { .. }) => {
                return Err(EnumTemplateViolation::SingleKeyOutOfScope {
                    key: binding.name.clone(),
                    sheet: sheet.to_string(),
                }
                .into());
            }
        };

        match value {
            Some(value) => {
                self.write_value(wb, sheet, cell.row, cell.col, binding, &value)?;
                report.cnt_cells_filled += 1;
                Ok(SpecRowEffect::NONE)
            }
            None if binding.if_temporary() => self.delete_or_blank(wb, sheet, l_cells, n_idx, report),
            None => {
                blank_cell(wb, sheet, cell.row, cell.col, report)?;
                Ok(SpecRowEffect::NONE)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn fill_complex<W: GridWorkbook + ?Sized>(
        &self,
        wb: &mut W,
        sheet: &str,
        l_cells: &[SpecPendingCell],
        n_idx: usize,
        binding: &SpecKeyBinding,
        scope: &SpecScope<'_>,
        report: &mut SpecFillReport,
    ) -> Result<SpecRowEffect, ReportError> {
        let cell = &l_cells[n_idx];
        let c_key = binding.name.as_str();

        let l_elements = match binding.read_list(scope.data) {
            Ok(l_elements) => l_elements.unwrap_or_default(),
            Err(EnumAccessError::Unavailable(c_reason)) => {
                record_warning(
                    report,
                    format!("key {c_key:?} is unavailable ({c_reason}); treated as empty"),
                );
                Vec::new()
            }
            Err(EnumAccessError::ScopeMismatch { .. }) => {
                return Err(EnumTemplateViolation::ComplexKeyOutOfScope {
                    key: c_key.to_string(),
                    sheet: sheet.to_string(),
                }
                .into());
            }
        };

        if l_elements.is_empty() {
            if binding.if_temporary() {
                return self.delete_or_blank(wb, sheet, l_cells, n_idx, report);
            }
            blank_cell(wb, sheet, cell.row, cell.col, report)?;
            return Ok(SpecRowEffect::NONE);
        }

        if !wb.has_sheet(c_key) {
            record_warning(
                report,
                format!("no row-template sheet for complex key {c_key:?}; placeholder blanked"),
            );
            blank_cell(wb, sheet, cell.row, cell.col, report)?;
            return Ok(SpecRowEffect::NONE);
        }

        let n_rows_block = prepare_row_template(wb, c_key)?;
        let n_row_placeholder = cell.row;
        let mut n_row_cursor = n_row_placeholder;

        for (n_pos, element) in l_elements.iter().enumerate() {
            if n_rows_block > 0 {
                let n_row_last = wb.last_row(sheet).unwrap_or(n_row_cursor);
                wb.shift_rows(sheet, n_row_cursor, n_row_last, i64::from(n_rows_block))?;
                wb.copy_rows(c_key, 0, n_rows_block - 1, sheet, n_row_cursor)?;

                let n_row_block_first = n_row_cursor;
                n_row_cursor += n_rows_block;
                let l_block_cells =
                    self.collect_placeholders(wb, sheet, n_row_block_first, n_row_cursor - 1);
                let child = SpecScope {
                    data: *element,
                    counter: n_pos + 1,
                };
                let n_delta = self.resolve_cells(wb, sheet, l_block_cells, &child, report)?;
                n_row_cursor = derive_row_offset(n_row_cursor, n_delta)?;
            }
            report.cnt_elements_expanded += 1;
        }

        delete_row(wb, sheet, n_row_cursor)?;
        report.cnt_rows_deleted += 1;
        debug!(
            sheet,
            key = c_key,
            n_elements = l_elements.len(),
            n_rows_block,
            "list expanded"
        );

        Ok(SpecRowEffect {
            row_removed: Some(n_row_placeholder),
            delta_below: i64::from(n_row_cursor) - i64::from(n_row_placeholder) - 1,
        })
    }

    fn delete_or_blank<W: GridWorkbook + ?Sized>(
        &self,
        wb: &mut W,
        sheet: &str,
        l_cells: &[SpecPendingCell],
        n_idx: usize,
        report: &mut SpecFillReport,
    ) -> Result<SpecRowEffect, ReportError> {
        let cell = &l_cells[n_idx];
        if !self.is_row_deletable(wb, sheet, l_cells, n_idx) {
            blank_cell(wb, sheet, cell.row, cell.col, report)?;
            return Ok(SpecRowEffect::NONE);
        }

        delete_row(wb, sheet, cell.row)?;
        report.cnt_rows_deleted += 1;
        debug!(sheet, row = cell.row, key = %cell.key, "optional placeholder row deleted");
        Ok(SpecRowEffect {
            row_removed: Some(cell.row),
            delta_below: -1,
        })
    }

    /// A row may go only when nothing else in it depends on the template:
    /// no merged region reaches into it from elsewhere and no other
    /// placeholder shares it.
    fn is_row_deletable<W: GridWorkbook + ?Sized>(
        &self,
        wb: &W,
        sheet: &str,
        l_cells: &[SpecPendingCell],
        n_idx: usize,
    ) -> bool {
        let cell = &l_cells[n_idx];

        let if_merge_crossing = wb
            .merged_regions(sheet)
            .iter()
            .any(|region| region.contains_row(cell.row) && !region.contains(cell.row, cell.col));
        if if_merge_crossing {
            return false;
        }

        let if_sibling_tracked = l_cells
            .iter()
            .enumerate()
            .any(|(n_other, other)| n_other != n_idx && other.if_alive && other.row == cell.row);
        if if_sibling_tracked {
            return false;
        }

        !wb.row_columns(sheet, cell.row).into_iter().any(|n_col| {
            n_col != cell.col
                && wb
                    .cell_string(sheet, cell.row, n_col)
                    .is_some_and(|c_text| self.schema.is_placeholder(&c_text))
        })
    }

    fn write_value<W: GridWorkbook + ?Sized>(
        &self,
        wb: &mut W,
        sheet: &str,
        row: u32,
        col: u16,
        binding: &SpecKeyBinding,
        value: &EnumFieldValue,
    ) -> Result<(), ReportError> {
        let value_cell = match binding.data_type() {
            EnumDataType::Text => EnumCellValue::String(value.to_string()),
            EnumDataType::Numeric => {
                let f_value = convert_field_value_to_number(value)
                    .map_err(|_| derive_value_format_error(binding, value))?;
                convert_number_to_cell_value(f_value)
            }
            EnumDataType::Date | EnumDataType::Time => {
                let n_millis = convert_field_value_to_millis(value)
                    .map_err(|_| derive_value_format_error(binding, value))?;
                let dt = convert_millis_to_local_datetime(n_millis, self.options.utc_offset_seconds)
                    .map_err(|_| derive_value_format_error(binding, value))?;
                if is_text_num_format(wb.cell_num_format(sheet, row, col).as_deref()) {
                    EnumCellValue::String(format_datetime_with_pattern(
                        &dt,
                        binding.temporal_pattern(),
                    ))
                } else {
                    EnumCellValue::DateTime(dt)
                }
            }
            EnumDataType::Image => {
                return self.write_image(wb, sheet, row, col, &value.to_string());
            }
        };
        wb.set_cell_value(sheet, row, col, value_cell)
    }

    fn write_image<W: GridWorkbook + ?Sized>(
        &self,
        wb: &mut W,
        sheet: &str,
        row: u32,
        col: u16,
        path: &str,
    ) -> Result<(), ReportError> {
        let bytes = std::fs::read(path)
            .map_err(|err| io::Error::new(err.kind(), format!("cannot read image {path:?}: {err}")))?;
        wb.set_cell_value(sheet, row, col, EnumCellValue::None)?;
        let handle = wb.insert_image(sheet, bytes, row, col)?;
        fit_image(wb, sheet, row, col, handle)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region GridEdits

fn record_warning(report: &mut SpecFillReport, msg: String) {
    warn!("{msg}");
    report.warn(msg);
}

fn blank_cell<W: GridWorkbook + ?Sized>(
    wb: &mut W,
    sheet: &str,
    row: u32,
    col: u16,
    report: &mut SpecFillReport,
) -> Result<(), ReportError> {
    wb.set_cell_value(sheet, row, col, EnumCellValue::None)?;
    report.cnt_cells_blanked += 1;
    Ok(())
}

/// Make every row of a row-template sheet exist; return the block height.
fn prepare_row_template<W: GridWorkbook + ?Sized>(wb: &mut W, sheet: &str) -> Result<u32, ReportError> {
    let Some(n_row_last) = wb.last_row(sheet) else {
        return Ok(0);
    };
    for n_row in 0..=n_row_last {
        if !wb.row_exists(sheet, n_row) {
            wb.create_row(sheet, n_row)?;
        }
    }
    Ok(n_row_last + 1)
}

/// Drop the merged regions touching `row`, then close the gap.
fn delete_row<W: GridWorkbook + ?Sized>(wb: &mut W, sheet: &str, row: u32) -> Result<(), ReportError> {
    for region in wb.merged_regions(sheet) {
        if region.contains_row(row) {
            wb.remove_merged_region(sheet, region)?;
        }
    }
    match wb.last_row(sheet) {
        Some(n_row_last) if n_row_last > row => wb.shift_rows(sheet, row + 1, n_row_last, -1),
        _ => wb.remove_row(sheet, row),
    }
}

/// Shrink an image to its cell, or to the merged region holding the cell.
fn fit_image<W: GridWorkbook + ?Sized>(
    wb: &mut W,
    sheet: &str,
    row: u32,
    col: u16,
    handle: SpecImageHandle,
) -> Result<(), ReportError> {
    let (f_width_img, f_height_img) = wb
        .image_size_px(sheet, handle)
        .ok_or_else(|| ReportError::Grid(format!("image not found: {}", handle.0)))?;

    let region = wb
        .merged_regions(sheet)
        .into_iter()
        .find(|region| region.contains(row, col));

    let f_ratio = match region {
        None => plan_image_scale_in_box(
            f_width_img,
            f_height_img,
            wb.column_width_px(sheet, col),
            wb.row_height_px(sheet, row),
        ),
        Some(region) => {
            let f_width_box: f64 = (region.first_col..=region.last_col)
                .map(|n_col| wb.column_width_px(sheet, n_col))
                .sum();
            if region.first_row == region.last_row {
                let (f_ratio, f_height_row) =
                    plan_image_scale_by_width(f_width_img, f_height_img, f_width_box);
                wb.set_row_height_px(sheet, row, f_height_row)?;
                f_ratio
            } else {
                let f_height_box: f64 = (region.first_row..=region.last_row)
                    .map(|n_row| wb.row_height_px(sheet, n_row))
                    .sum();
                plan_image_scale_in_box(f_width_img, f_height_img, f_width_box, f_height_box)
            }
        }
    };

    wb.resize_image(sheet, handle, f_ratio, f_ratio)?;
    debug!(sheet, row, col, f_ratio, "image placed");
    Ok(())
}

fn derive_value_format_error(binding: &SpecKeyBinding, value: &EnumFieldValue) -> ReportError {
    ReportError::ValueFormat {
        key: binding.name.clone(),
        data_type: binding.data_type().as_str(),
        value: value.to_string(),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
