//! Spreadsheet grid abstraction and its in-memory implementation.
//!
//! The filler only talks to [`GridWorkbook`]. [`MemWorkbook`] keeps cells,
//! formats, merged regions, row heights, column widths and images in memory;
//! it is loaded by the reader and persisted by the writer.

use std::collections::BTreeMap;

use rust_xlsxwriter::Image;

use crate::conf::{F_COL_WIDTH_DEFAULT_CHARS, F_ROW_HEIGHT_DEFAULT_PT, N_NROWS_EXCEL_MAX};
use crate::spec::{
    EnumCellValue, ReportError, SpecCellFormat, SpecCellRange, SpecImageHandle, SpecSheetImage,
};
use crate::util::{convert_col_width_to_pixels, convert_pixels_to_points, convert_points_to_pixels};

////////////////////////////////////////////////////////////////////////////////
// #region GridContract

/// Operations the filler needs from a spreadsheet.
///
/// Rows and columns are zero-based. Sheet lookups by unknown name fail with
/// [`ReportError::Grid`] on mutating calls and yield empty results on reads.
pub trait GridWorkbook {
    /// Sheet names in workbook order.
    fn sheet_names(&self) -> Vec<String>;

    /// Whether a sheet exists.
    fn has_sheet(&self, sheet: &str) -> bool {
        self.sheet_names().iter().any(|c_name| c_name == sheet)
    }

    /// Append an empty sheet.
    fn create_sheet(&mut self, sheet: &str) -> Result<(), ReportError>;

    /// Remove a sheet.
    fn remove_sheet(&mut self, sheet: &str) -> Result<(), ReportError>;

    /// Index of the last existing row.
    fn last_row(&self, sheet: &str) -> Option<u32>;

    /// Whether a row exists.
    fn row_exists(&self, sheet: &str, row: u32) -> bool;

    /// Create an empty row if missing.
    fn create_row(&mut self, sheet: &str, row: u32) -> Result<(), ReportError>;

    /// Columns holding a cell in `row`, ascending.
    fn row_columns(&self, sheet: &str, row: u32) -> Vec<u16>;

    /// Cell value.
    fn cell_value(&self, sheet: &str, row: u32, col: u16) -> Option<EnumCellValue>;

    /// Cell text when the cell holds a string.
    fn cell_string(&self, sheet: &str, row: u32, col: u16) -> Option<String> {
        match self.cell_value(sheet, row, col) {
            Some(EnumCellValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Number format code of a cell, `None` meaning General.
    fn cell_num_format(&self, sheet: &str, row: u32, col: u16) -> Option<String>;

    /// Write a value, keeping the cell's format.
    fn set_cell_value(
        &mut self,
        sheet: &str,
        row: u32,
        col: u16,
        value: EnumCellValue,
    ) -> Result<(), ReportError>;

    /// Merged regions of a sheet.
    fn merged_regions(&self, sheet: &str) -> Vec<SpecCellRange>;

    /// Add a merged region.
    fn add_merged_region(&mut self, sheet: &str, region: SpecCellRange) -> Result<(), ReportError>;

    /// Remove a merged region equal to `region`.
    fn remove_merged_region(
        &mut self,
        sheet: &str,
        region: SpecCellRange,
    ) -> Result<(), ReportError>;

    /// Move rows `first_row..=last_row` by `delta`, overwriting the destination.
    fn shift_rows(
        &mut self,
        sheet: &str,
        first_row: u32,
        last_row: u32,
        delta: i64,
    ) -> Result<(), ReportError>;

    /// Copy rows `first_row..=last_row` of `src_sheet` to `dst_sheet` from `dst_row`.
    ///
    /// Values, formats, heights and merged regions inside the block are copied.
    fn copy_rows(
        &mut self,
        src_sheet: &str,
        first_row: u32,
        last_row: u32,
        dst_sheet: &str,
        dst_row: u32,
    ) -> Result<(), ReportError>;

    /// Remove a row without shifting.
    fn remove_row(&mut self, sheet: &str, row: u32) -> Result<(), ReportError>;

    /// Column width in pixels.
    fn column_width_px(&self, sheet: &str, col: u16) -> f64;

    /// Row height in pixels.
    fn row_height_px(&self, sheet: &str, row: u32) -> f64;

    /// Set row height in pixels.
    fn set_row_height_px(&mut self, sheet: &str, row: u32, height_px: f64)
    -> Result<(), ReportError>;

    /// Place an image anchored at a cell.
    fn insert_image(
        &mut self,
        sheet: &str,
        bytes: Vec<u8>,
        row: u32,
        col: u16,
    ) -> Result<SpecImageHandle, ReportError>;

    /// Natural image size in pixels.
    fn image_size_px(&self, sheet: &str, handle: SpecImageHandle) -> Option<(f64, f64)>;

    /// Apply scale factors to an image.
    fn resize_image(
        &mut self,
        sheet: &str,
        handle: SpecImageHandle,
        scale_width: f64,
        scale_height: f64,
    ) -> Result<(), ReportError>;
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MemoryModel

/// One stored cell.
#[derive(Debug, Clone, PartialEq)]
pub struct MemCell {
    /// Value.
    pub value: EnumCellValue,
    /// Format.
    pub format: SpecCellFormat,
}

/// One stored row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MemRow {
    /// Explicit height in points.
    pub height_pt: Option<f64>,
    /// Cells by column.
    pub cells: BTreeMap<u16, MemCell>,
}

/// In-memory worksheet.
#[derive(Debug, Clone, PartialEq)]
pub struct MemSheet {
    name: String,
    dict_rows: BTreeMap<u32, MemRow>,
    dict_col_widths: BTreeMap<u16, f64>,
    l_merged: Vec<SpecCellRange>,
    l_images: Vec<SpecSheetImage>,
}

impl MemSheet {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dict_rows: BTreeMap::new(),
            dict_col_widths: BTreeMap::new(),
            l_merged: Vec::new(),
            l_images: Vec::new(),
        }
    }

    /// Sheet name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write a value, keeping any existing format.
    pub fn write(&mut self, row: u32, col: u16, value: EnumCellValue) -> &mut Self {
        let row_entry = self.dict_rows.entry(row).or_default();
        match row_entry.cells.get_mut(&col) {
            Some(cell) => cell.value = value,
            None => {
                row_entry.cells.insert(
                    col,
                    MemCell {
                        value,
                        format: SpecCellFormat::default(),
                    },
                );
            }
        }
        self
    }

    /// Write a string value.
    pub fn write_str(&mut self, row: u32, col: u16, text: &str) -> &mut Self {
        self.write(row, col, EnumCellValue::String(text.to_string()))
    }

    /// Set a cell's format, creating a blank cell if missing.
    pub fn set_format(&mut self, row: u32, col: u16, format: SpecCellFormat) -> &mut Self {
        let row_entry = self.dict_rows.entry(row).or_default();
        row_entry
            .cells
            .entry(col)
            .or_insert_with(|| MemCell {
                value: EnumCellValue::None,
                format: SpecCellFormat::default(),
            })
            .format = format;
        self
    }

    /// Set column width in character units.
    pub fn set_col_width(&mut self, col: u16, width_chars: f64) -> &mut Self {
        self.dict_col_widths.insert(col, width_chars);
        self
    }

    /// Set row height in points.
    pub fn set_row_height(&mut self, row: u32, height_pt: f64) -> &mut Self {
        self.dict_rows.entry(row).or_default().height_pt = Some(height_pt);
        self
    }

    /// Add a merged region.
    pub fn merge(&mut self, region: SpecCellRange) -> &mut Self {
        if !self.l_merged.contains(&region) {
            self.l_merged.push(region);
        }
        self
    }

    /// Stored cell.
    pub fn cell(&self, row: u32, col: u16) -> Option<&MemCell> {
        self.dict_rows.get(&row).and_then(|r| r.cells.get(&col))
    }

    /// Stored value.
    pub fn value(&self, row: u32, col: u16) -> Option<&EnumCellValue> {
        self.cell(row, col).map(|cell| &cell.value)
    }

    /// Rows in ascending order.
    pub fn rows(&self) -> impl Iterator<Item = (u32, &MemRow)> {
        self.dict_rows.iter().map(|(n_row, row)| (*n_row, row))
    }

    /// Explicit column widths in character units.
    pub fn col_widths(&self) -> impl Iterator<Item = (u16, f64)> + '_ {
        self.dict_col_widths.iter().map(|(n_col, w)| (*n_col, *w))
    }

    /// Merged regions.
    pub fn merged(&self) -> &[SpecCellRange] {
        &self.l_merged
    }

    /// Placed images.
    pub fn images(&self) -> &[SpecSheetImage] {
        &self.l_images
    }

    /// Last existing row.
    pub fn last_row(&self) -> Option<u32> {
        self.dict_rows.keys().next_back().copied()
    }

    /// Row-major dump of string cells, for diagnostics and assertions.
    pub fn to_string_grid(&self) -> Vec<Vec<String>> {
        let Some(n_row_last) = self.last_row() else {
            return vec![];
        };
        let n_col_last = self
            .dict_rows
            .values()
            .filter_map(|row| row.cells.keys().next_back().copied())
            .max()
            .unwrap_or(0);
        (0..=n_row_last)
            .map(|n_row| {
                (0..=n_col_last)
                    .map(|n_col| match self.value(n_row, n_col) {
                        Some(EnumCellValue::String(s)) => s.clone(),
                        Some(EnumCellValue::Number(x)) => x.to_string(),
                        Some(EnumCellValue::Bool(b)) => b.to_string(),
                        Some(EnumCellValue::DateTime(dt)) => dt.to_string(),
                        Some(EnumCellValue::Error(err)) => err.as_str().to_string(),
                        Some(EnumCellValue::None) | None => String::new(),
                    })
                    .collect()
            })
            .collect()
    }

    fn shift_rows(&mut self, first_row: u32, last_row: u32, delta: i64) -> Result<(), ReportError> {
        if delta == 0 || first_row > last_row {
            return Ok(());
        }
        let n_dst_first = derive_shifted_row(first_row, delta)?;
        let n_dst_last = derive_shifted_row(last_row, delta)?;

        let l_rows_moved: Vec<u32> = self
            .dict_rows
            .range(first_row..=last_row)
            .map(|(n_row, _)| *n_row)
            .collect();
        let mut l_moved: Vec<(u32, MemRow)> = Vec::with_capacity(l_rows_moved.len());
        for n_row in l_rows_moved {
            if let Some(row) = self.dict_rows.remove(&n_row) {
                l_moved.push((n_row, row));
            }
        }
        let l_overwritten: Vec<u32> = self
            .dict_rows
            .range(n_dst_first..=n_dst_last)
            .map(|(n_row, _)| *n_row)
            .collect();
        for n_row in l_overwritten {
            self.dict_rows.remove(&n_row);
        }
        for (n_row, row) in l_moved {
            self.dict_rows.insert(derive_shifted_row(n_row, delta)?, row);
        }

        let mut l_merged = Vec::with_capacity(self.l_merged.len());
        for region in self.l_merged.drain(..) {
            if region.first_row >= first_row && region.last_row <= last_row {
                l_merged.push(SpecCellRange {
                    first_row: derive_shifted_row(region.first_row, delta)?,
                    last_row: derive_shifted_row(region.last_row, delta)?,
                    ..region
                });
            } else if region.last_row < n_dst_first || region.first_row > n_dst_last {
                l_merged.push(region);
            }
        }
        self.l_merged = l_merged;

        for image in &mut self.l_images {
            if image.anchor_row >= first_row && image.anchor_row <= last_row {
                image.anchor_row = derive_shifted_row(image.anchor_row, delta)?;
            }
        }
        Ok(())
    }
}

fn derive_shifted_row(row: u32, delta: i64) -> Result<u32, ReportError> {
    let n_row = i64::from(row) + delta;
    if n_row < 0 || n_row >= i64::from(N_NROWS_EXCEL_MAX) {
        return Err(ReportError::Grid(format!(
            "row shift out of bounds: {row} by {delta}"
        )));
    }
    Ok(n_row as u32)
}

/// In-memory workbook.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MemWorkbook {
    l_sheets: Vec<MemSheet>,
}

impl MemWorkbook {
    /// Empty workbook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sheet and return it for editing.
    pub fn add_sheet(&mut self, name: &str) -> Result<&mut MemSheet, ReportError> {
        if self.sheet(name).is_some() {
            return Err(ReportError::Grid(format!("sheet already exists: {name:?}")));
        }
        self.l_sheets.push(MemSheet::new(name));
        let n_idx = self.l_sheets.len() - 1;
        Ok(&mut self.l_sheets[n_idx])
    }

    /// Sheet by name.
    pub fn sheet(&self, name: &str) -> Option<&MemSheet> {
        self.l_sheets.iter().find(|sheet| sheet.name == name)
    }

    /// Mutable sheet by name.
    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut MemSheet> {
        self.l_sheets.iter_mut().find(|sheet| sheet.name == name)
    }

    /// Sheets in workbook order.
    pub fn sheets(&self) -> &[MemSheet] {
        &self.l_sheets
    }

    fn sheet_or_err(&self, name: &str) -> Result<&MemSheet, ReportError> {
        self.sheet(name)
            .ok_or_else(|| ReportError::Grid(format!("sheet not found: {name:?}")))
    }

    fn sheet_mut_or_err(&mut self, name: &str) -> Result<&mut MemSheet, ReportError> {
        self.sheet_mut(name)
            .ok_or_else(|| ReportError::Grid(format!("sheet not found: {name:?}")))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region GridImpl

impl GridWorkbook for MemWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.l_sheets.iter().map(|sheet| sheet.name.clone()).collect()
    }

    fn has_sheet(&self, sheet: &str) -> bool {
        self.sheet(sheet).is_some()
    }

    fn create_sheet(&mut self, sheet: &str) -> Result<(), ReportError> {
        self.add_sheet(sheet).map(|_| ())
    }

    fn remove_sheet(&mut self, sheet: &str) -> Result<(), ReportError> {
        let n_len_before = self.l_sheets.len();
        self.l_sheets.retain(|s| s.name != sheet);
        if self.l_sheets.len() == n_len_before {
            return Err(ReportError::Grid(format!("sheet not found: {sheet:?}")));
        }
        Ok(())
    }

    fn last_row(&self, sheet: &str) -> Option<u32> {
        self.sheet(sheet).and_then(MemSheet::last_row)
    }

    fn row_exists(&self, sheet: &str, row: u32) -> bool {
        self.sheet(sheet)
            .is_some_and(|s| s.dict_rows.contains_key(&row))
    }

    fn create_row(&mut self, sheet: &str, row: u32) -> Result<(), ReportError> {
        self.sheet_mut_or_err(sheet)?
            .dict_rows
            .entry(row)
            .or_default();
        Ok(())
    }

    fn row_columns(&self, sheet: &str, row: u32) -> Vec<u16> {
        self.sheet(sheet)
            .and_then(|s| s.dict_rows.get(&row))
            .map(|r| r.cells.keys().copied().collect())
            .unwrap_or_default()
    }

    fn cell_value(&self, sheet: &str, row: u32, col: u16) -> Option<EnumCellValue> {
        self.sheet(sheet)
            .and_then(|s| s.value(row, col))
            .cloned()
    }

    fn cell_num_format(&self, sheet: &str, row: u32, col: u16) -> Option<String> {
        self.sheet(sheet)
            .and_then(|s| s.cell(row, col))
            .and_then(|cell| cell.format.num_format.clone())
    }

    fn set_cell_value(
        &mut self,
        sheet: &str,
        row: u32,
        col: u16,
        value: EnumCellValue,
    ) -> Result<(), ReportError> {
        self.sheet_mut_or_err(sheet)?.write(row, col, value);
        Ok(())
    }

    fn merged_regions(&self, sheet: &str) -> Vec<SpecCellRange> {
        self.sheet(sheet)
            .map(|s| s.l_merged.clone())
            .unwrap_or_default()
    }

    fn add_merged_region(&mut self, sheet: &str, region: SpecCellRange) -> Result<(), ReportError> {
        self.sheet_mut_or_err(sheet)?.merge(region);
        Ok(())
    }

    fn remove_merged_region(
        &mut self,
        sheet: &str,
        region: SpecCellRange,
    ) -> Result<(), ReportError> {
        self.sheet_mut_or_err(sheet)?
            .l_merged
            .retain(|r| *r != region);
        Ok(())
    }

    fn shift_rows(
        &mut self,
        sheet: &str,
        first_row: u32,
        last_row: u32,
        delta: i64,
    ) -> Result<(), ReportError> {
        self.sheet_mut_or_err(sheet)?
            .shift_rows(first_row, last_row, delta)
    }

    fn copy_rows(
        &mut self,
        src_sheet: &str,
        first_row: u32,
        last_row: u32,
        dst_sheet: &str,
        dst_row: u32,
    ) -> Result<(), ReportError> {
        if first_row > last_row {
            return Ok(());
        }
        let src = self.sheet_or_err(src_sheet)?;
        let l_rows: Vec<(u32, MemRow)> = (first_row..=last_row)
            .map(|n_row| {
                (
                    n_row - first_row,
                    src.dict_rows.get(&n_row).cloned().unwrap_or_default(),
                )
            })
            .collect();
        let l_merged: Vec<SpecCellRange> = src
            .l_merged
            .iter()
            .filter(|r| r.first_row >= first_row && r.last_row <= last_row)
            .copied()
            .collect();

        let dst = self.sheet_mut_or_err(dst_sheet)?;
        for (n_offset, row) in l_rows {
            let n_row = derive_shifted_row(dst_row, i64::from(n_offset))?;
            dst.dict_rows.insert(n_row, row);
        }
        let n_delta = i64::from(dst_row) - i64::from(first_row);
        for region in l_merged {
            dst.merge(SpecCellRange {
                first_row: derive_shifted_row(region.first_row, n_delta)?,
                last_row: derive_shifted_row(region.last_row, n_delta)?,
                ..region
            });
        }
        Ok(())
    }

    fn remove_row(&mut self, sheet: &str, row: u32) -> Result<(), ReportError> {
        self.sheet_mut_or_err(sheet)?.dict_rows.remove(&row);
        Ok(())
    }

    fn column_width_px(&self, sheet: &str, col: u16) -> f64 {
        let f_width_chars = self
            .sheet(sheet)
            .and_then(|s| s.dict_col_widths.get(&col).copied())
            .unwrap_or(F_COL_WIDTH_DEFAULT_CHARS);
        convert_col_width_to_pixels(f_width_chars)
    }

    fn row_height_px(&self, sheet: &str, row: u32) -> f64 {
        let f_height_pt = self
            .sheet(sheet)
            .and_then(|s| s.dict_rows.get(&row))
            .and_then(|r| r.height_pt)
            .unwrap_or(F_ROW_HEIGHT_DEFAULT_PT);
        convert_points_to_pixels(f_height_pt)
    }

    fn set_row_height_px(
        &mut self,
        sheet: &str,
        row: u32,
        height_px: f64,
    ) -> Result<(), ReportError> {
        self.sheet_mut_or_err(sheet)?
            .set_row_height(row, convert_pixels_to_points(height_px));
        Ok(())
    }

    fn insert_image(
        &mut self,
        sheet: &str,
        bytes: Vec<u8>,
        row: u32,
        col: u16,
    ) -> Result<SpecImageHandle, ReportError> {
        let image = Image::new_from_buffer(&bytes)
            .map_err(|err| ReportError::Grid(format!("unsupported image data: {err}")))?;
        let (f_width, f_height) = (image.width(), image.height());

        let target = self.sheet_mut_or_err(sheet)?;
        target.l_images.push(SpecSheetImage {
            bytes,
            anchor_row: row,
            anchor_col: col,
            width_px: f_width,
            height_px: f_height,
            scale_width: 1.0,
            scale_height: 1.0,
        });
        Ok(SpecImageHandle(target.l_images.len() - 1))
    }

    fn image_size_px(&self, sheet: &str, handle: SpecImageHandle) -> Option<(f64, f64)> {
        self.sheet(sheet)
            .and_then(|s| s.l_images.get(handle.0))
            .map(|image| (image.width_px, image.height_px))
    }

    fn resize_image(
        &mut self,
        sheet: &str,
        handle: SpecImageHandle,
        scale_width: f64,
        scale_height: f64,
    ) -> Result<(), ReportError> {
        let image = self
            .sheet_mut_or_err(sheet)?
            .l_images
            .get_mut(handle.0)
            .ok_or_else(|| ReportError::Grid(format!("image not found: {}", handle.0)))?;
        image.scale_width = scale_width;
        image.scale_height = scale_height;
        Ok(())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn build_column(n_rows: u32) -> MemWorkbook {
        let mut wb = MemWorkbook::new();
        let sheet = wb.add_sheet("S").unwrap();
        for n_row in 0..n_rows {
            sheet.write_str(n_row, 0, &format!("r{n_row}"));
        }
        wb
    }

    fn column_text(wb: &MemWorkbook) -> Vec<String> {
        wb.sheet("S")
            .unwrap()
            .to_string_grid()
            .into_iter()
            .map(|row| row.join(""))
            .collect()
    }

    #[test]
    fn shift_down_opens_a_gap() {
        let mut wb = build_column(3);
        wb.shift_rows("S", 1, 2, 2).unwrap();
        assert_eq!(column_text(&wb), vec!["r0", "", "", "r1", "r2"]);
        assert!(!wb.row_exists("S", 1));
        assert_eq!(wb.last_row("S"), Some(4));
    }

    #[test]
    fn shift_up_overwrites_destination() {
        let mut wb = build_column(4);
        wb.shift_rows("S", 2, 3, -1).unwrap();
        assert_eq!(column_text(&wb), vec!["r0", "r2", "r3"]);
    }

    #[test]
    fn shift_moves_contained_merges_and_drops_overwritten_ones() {
        let mut wb = build_column(6);
        wb.add_merged_region("S", SpecCellRange::new(3, 4, 0, 1)).unwrap();
        wb.add_merged_region("S", SpecCellRange::new(1, 1, 0, 2)).unwrap();
        wb.add_merged_region("S", SpecCellRange::new(0, 0, 0, 1)).unwrap();

        wb.shift_rows("S", 2, 5, -1).unwrap();
        assert_eq!(
            wb.merged_regions("S"),
            vec![SpecCellRange::new(2, 3, 0, 1), SpecCellRange::new(0, 0, 0, 1)]
        );
    }

    #[test]
    fn shift_rejects_negative_rows() {
        let mut wb = build_column(2);
        assert!(matches!(
            wb.shift_rows("S", 0, 1, -1),
            Err(ReportError::Grid(_))
        ));
    }

    #[test]
    fn copy_rows_clones_values_formats_heights_and_merges() {
        let mut wb = MemWorkbook::new();
        {
            let src = wb.add_sheet("T").unwrap();
            src.write_str(0, 0, "a")
                .set_format(0, 0, SpecCellFormat::with_num_format("@"))
                .set_row_height(0, 30.0)
                .write_str(1, 1, "b")
                .merge(SpecCellRange::new(1, 1, 1, 2))
                .merge(SpecCellRange::new(1, 2, 0, 0));
        }
        wb.add_sheet("S").unwrap();
        wb.copy_rows("T", 0, 1, "S", 5).unwrap();

        let dst = wb.sheet("S").unwrap();
        assert_eq!(dst.value(5, 0), Some(&EnumCellValue::String("a".to_string())));
        assert_eq!(wb.cell_num_format("S", 5, 0).as_deref(), Some("@"));
        assert_eq!(wb.row_height_px("S", 5), 40.0);
        assert_eq!(dst.value(6, 1), Some(&EnumCellValue::String("b".to_string())));
        assert_eq!(dst.merged(), &[SpecCellRange::new(6, 6, 1, 2)]);
    }

    #[test]
    fn default_geometry_in_pixels() {
        let mut wb = build_column(1);
        assert_eq!(wb.column_width_px("S", 0), 64.0);
        assert_eq!(wb.row_height_px("S", 0), 20.0);
        wb.sheet_mut("S").unwrap().set_col_width(0, 20.0);
        assert_eq!(wb.column_width_px("S", 0), 145.0);
        wb.set_row_height_px("S", 0, 100.0).unwrap();
        assert_eq!(wb.row_height_px("S", 0), 100.0);
    }

    #[test]
    fn sheets_are_unique_and_removable() {
        let mut wb = MemWorkbook::new();
        wb.create_sheet("A").unwrap();
        assert!(wb.create_sheet("A").is_err());
        wb.create_sheet("B").unwrap();
        wb.remove_sheet("A").unwrap();
        assert_eq!(wb.sheet_names(), vec!["B".to_string()]);
        assert!(wb.remove_sheet("A").is_err());
    }

    #[test]
    fn set_cell_value_keeps_format() {
        let mut wb = build_column(1);
        wb.sheet_mut("S")
            .unwrap()
            .set_format(0, 0, SpecCellFormat::with_num_format("0.00"));
        wb.set_cell_value("S", 0, 0, EnumCellValue::Number(1.5)).unwrap();
        assert_eq!(wb.cell_num_format("S", 0, 0).as_deref(), Some("0.00"));
        assert_eq!(wb.cell_value("S", 0, 0), Some(EnumCellValue::Number(1.5)));
    }
}
