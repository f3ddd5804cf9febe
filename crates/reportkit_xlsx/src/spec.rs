//! Shared report models, options and the error taxonomy.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::conf::{
    C_PATTERN_DATE_DEFAULT, C_PATTERN_TIME_DEFAULT, C_SHEET_DEFAULT, C_SHEET_REPORT_KEYS,
};

////////////////////////////////////////////////////////////////////////////////
// #region KeyAnnotation

/// How a key binds to its field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EnumKeyKind {
    /// Scalar value written into one cell.
    #[default]
    Single,
    /// Ordered list of sub-records expanded through a row-template sheet.
    Complex,
}

impl EnumKeyKind {
    /// Catalogue label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "SINGLE",
            Self::Complex => "COMPLEX",
        }
    }
}

/// Value coercion applied when a single key is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EnumDataType {
    /// String form of the value.
    #[default]
    Text,
    /// 64-bit float.
    Numeric,
    /// Millisecond timestamp rendered with the date pattern.
    Date,
    /// Millisecond timestamp rendered with the time pattern.
    Time,
    /// Path of an image file inserted at the cell.
    Image,
}

impl EnumDataType {
    /// Catalogue label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Numeric => "NUMERIC",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Image => "IMAGE",
        }
    }
}

/// Per-field key declaration.
///
/// Unset `name`/`description` are derived from the declaring type and field
/// name when the schema is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecReportKey {
    /// Explicit key name.
    pub name: Option<String>,
    /// Explicit human-readable description.
    pub description: Option<String>,
    /// Binding kind.
    pub key_kind: EnumKeyKind,
    /// Coercion target for single keys.
    pub data_type: EnumDataType,
    /// Remove the placeholder (row if safe) when the value is absent.
    pub if_temporary: bool,
    /// Pattern used for Date keys written into text-formatted cells.
    pub date_pattern: String,
    /// Pattern used for Time keys written into text-formatted cells.
    pub time_pattern: String,
}

impl Default for SpecReportKey {
    fn default() -> Self {
        Self {
            name: None,
            description: None,
            key_kind: EnumKeyKind::Single,
            data_type: EnumDataType::Text,
            if_temporary: false,
            date_pattern: C_PATTERN_DATE_DEFAULT.to_string(),
            time_pattern: C_PATTERN_TIME_DEFAULT.to_string(),
        }
    }
}

impl SpecReportKey {
    /// Single Text key with default naming.
    pub fn single() -> Self {
        Self::default()
    }

    /// Complex key with default naming.
    pub fn complex() -> Self {
        Self {
            key_kind: EnumKeyKind::Complex,
            ..Self::default()
        }
    }

    /// Set an explicit key name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set an explicit description.
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the data type.
    pub fn typed(mut self, data_type: EnumDataType) -> Self {
        self.data_type = data_type;
        self
    }

    /// Mark the key as temporary (optional).
    pub fn temporary(mut self) -> Self {
        self.if_temporary = true;
        self
    }

    /// Override the date pattern.
    pub fn with_date_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.date_pattern = pattern.into();
        self
    }

    /// Override the time pattern.
    pub fn with_time_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.time_pattern = pattern.into();
        self
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportOptions

/// Autofit policy for generated catalogue columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecAutofitCellsPolicy {
    /// Minimum final width.
    pub width_cell_min: usize,
    /// Maximum final width.
    pub width_cell_max: usize,
    /// Width padding added after inference.
    pub width_cell_padding: usize,
}

impl Default for SpecAutofitCellsPolicy {
    fn default() -> Self {
        Self {
            width_cell_min: 8,
            width_cell_max: 90,
            width_cell_padding: 2,
        }
    }
}

/// Report-wide options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecReportOptions {
    /// Offset from UTC applied to millisecond timestamps before rendering.
    pub utc_offset_seconds: i32,
    /// Name of the key catalogue sheet.
    pub sheet_report_keys: String,
    /// Name of the content sheet created by `create_template`.
    pub sheet_default: String,
    /// Catalogue column autofit policy.
    pub policy_autofit: SpecAutofitCellsPolicy,
}

impl Default for SpecReportOptions {
    fn default() -> Self {
        Self {
            utc_offset_seconds: 0,
            sheet_report_keys: C_SHEET_REPORT_KEYS.to_string(),
            sheet_default: C_SHEET_DEFAULT.to_string(),
            policy_autofit: SpecAutofitCellsPolicy::default(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellModels

/// Cell format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }

    /// Format with only a number format set.
    pub fn with_num_format(num_format: impl Into<String>) -> SpecCellFormat {
        SpecCellFormat {
            num_format: Some(num_format.into()),
            ..Default::default()
        }
    }
}

/// Spreadsheet error values that a grid can store natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumCellError {
    /// `#NUM!`
    Num,
    /// `#DIV/0!`
    Div0,
    /// `#VALUE!`
    Value,
    /// `#N/A`
    Na,
    /// `#REF!`
    Ref,
    /// `#NAME?`
    Name,
    /// `#NULL!`
    Null,
}

impl EnumCellError {
    /// Display text of the error value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Num => "#NUM!",
            Self::Div0 => "#DIV/0!",
            Self::Value => "#VALUE!",
            Self::Na => "#N/A",
            Self::Ref => "#REF!",
            Self::Name => "#NAME?",
            Self::Null => "#NULL!",
        }
    }
}

/// Typed cell value stored in a grid.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Blank cell.
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Bool(bool),
    /// Native temporal value (local wall-clock time).
    DateTime(NaiveDateTime),
    /// Native error value.
    Error(EnumCellError),
}

impl EnumCellValue {
    /// Text content, if the value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Inclusive rectangular range, zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpecCellRange {
    /// First row (inclusive).
    pub first_row: u32,
    /// Last row (inclusive).
    pub last_row: u32,
    /// First column (inclusive).
    pub first_col: u16,
    /// Last column (inclusive).
    pub last_col: u16,
}

impl SpecCellRange {
    /// Build a range from inclusive corners.
    pub fn new(first_row: u32, last_row: u32, first_col: u16, last_col: u16) -> Self {
        Self {
            first_row,
            last_row,
            first_col,
            last_col,
        }
    }

    /// Whether `(row, col)` lies inside the range.
    pub fn contains(&self, row: u32, col: u16) -> bool {
        self.contains_row(row) && col >= self.first_col && col <= self.last_col
    }

    /// Whether the range spans `row`.
    pub fn contains_row(&self, row: u32) -> bool {
        row >= self.first_row && row <= self.last_row
    }

    /// Number of rows spanned.
    pub fn height(&self) -> u32 {
        self.last_row - self.first_row + 1
    }
}

/// Handle of an image placed on a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecImageHandle(pub usize);

/// Image placed on a sheet, anchored at a cell's top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecSheetImage {
    /// Raw image bytes.
    pub bytes: Vec<u8>,
    /// Anchor row.
    pub anchor_row: u32,
    /// Anchor column.
    pub anchor_col: u16,
    /// Natural width in pixels.
    pub width_px: f64,
    /// Natural height in pixels.
    pub height_px: f64,
    /// Horizontal scale factor.
    pub scale_width: f64,
    /// Vertical scale factor.
    pub scale_height: f64,
}

impl SpecSheetImage {
    /// Displayed width in pixels.
    pub fn display_width_px(&self) -> f64 {
        self.width_px * self.scale_width
    }

    /// Displayed height in pixels.
    pub fn display_height_px(&self) -> f64 {
        self.height_px * self.scale_height
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FillReport

/// Counters and diagnostics for one fill run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecFillReport {
    /// Placeholder cells written with data or a counter.
    pub cnt_cells_filled: u64,
    /// List elements expanded into row blocks.
    pub cnt_elements_expanded: u64,
    /// Rows removed (optional placeholders and expanded list rows).
    pub cnt_rows_deleted: u64,
    /// Placeholder cells blanked instead of filled.
    pub cnt_cells_blanked: u64,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecFillReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_cells_filled".to_string(), self.cnt_cells_filled);
        dict_counts.insert(
            "cnt_elements_expanded".to_string(),
            self.cnt_elements_expanded,
        );
        dict_counts.insert("cnt_rows_deleted".to_string(), self.cnt_rows_deleted);
        dict_counts.insert("cnt_cells_blanked".to_string(), self.cnt_cells_blanked);
        dict_counts.insert("cnt_warnings".to_string(), self.warnings.len() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} filled={} expanded={} deleted={} blanked={} warnings={}",
            self.cnt_cells_filled,
            self.cnt_elements_expanded,
            self.cnt_rows_deleted,
            self.cnt_cells_blanked,
            self.warnings.len()
        )
    }
}

impl fmt::Display for SpecFillReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[REPORT]"))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Structural template defects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumTemplateViolation {
    /// A row-template sheet references its own complex key.
    SelfReference {
        /// Offending sheet.
        sheet: String,
    },
    /// The counter placeholder sits on a sheet that is not a row-template sheet.
    CounterOutsideComplex {
        /// Offending sheet.
        sheet: String,
    },
    /// Row-template sheets reference each other in a cycle.
    LoopedComplexKeys {
        /// Open path ending with the revisited sheet.
        chain: Vec<String>,
    },
    /// A single key is used where the scope object cannot supply it.
    SingleKeyOutOfScope {
        /// Key name.
        key: String,
        /// Sheet being filled.
        sheet: String,
    },
    /// A complex key is used where the scope object cannot supply it.
    ComplexKeyOutOfScope {
        /// Key name.
        key: String,
        /// Sheet being filled.
        sheet: String,
    },
}

impl fmt::Display for EnumTemplateViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfReference { sheet } => write!(
                f,
                "The sheet {sheet:?} contains a complex key that references the same sheet."
            ),
            Self::CounterOutsideComplex { sheet } => write!(
                f,
                "The counter key is located outside the complex sheets (sheet {sheet:?})."
            ),
            Self::LoopedComplexKeys { chain } => write!(
                f,
                "Complex keys have looped references: {}",
                chain.join(" -> ")
            ),
            Self::SingleKeyOutOfScope { key, sheet } => write!(
                f,
                "Incorrect use of the single key {key:?}. There is no access to the data object in sheet {sheet:?}."
            ),
            Self::ComplexKeyOutOfScope { key, sheet } => write!(
                f,
                "Incorrect use of the complex key {key:?}. There is no access to the data object in sheet {sheet:?}."
            ),
        }
    }
}

/// Errors raised by schema construction, validation, filling and persistence.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Two reachable fields resolve to the same key name.
    #[error("Annotated fields have the identical names of ReportKey: {key:?}")]
    DuplicateKey {
        /// Colliding key name.
        key: String,
    },
    /// Key kind does not match the declared field shape.
    #[error("The annotation ReportKey does not match the field {type_name}.{field_name}: {message}")]
    InvalidKeyPlacement {
        /// Declaring type.
        type_name: String,
        /// Field name.
        field_name: String,
        /// Mismatch detail.
        message: String,
    },
    /// Template structure cannot be filled.
    #[error("{0}")]
    TemplateStructure(EnumTemplateViolation),
    /// A value cannot be coerced to the key's data type.
    #[error("Field datatype does not match the ReportKey datatype: key {key:?} ({data_type}) got {value:?}")]
    ValueFormat {
        /// Key name.
        key: String,
        /// Declared data type label.
        data_type: &'static str,
        /// Offending source text.
        value: String,
    },
    /// Report options are out of range.
    #[error("invalid report options: {0}")]
    InvalidOptions(String),
    /// Grid collaborator rejected an operation.
    #[error("grid error: {0}")]
    Grid(String),
    /// Workbook read/write failure.
    #[error("xlsx error: {0}")]
    Xlsx(String),
    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<EnumTemplateViolation> for ReportError {
    fn from(value: EnumTemplateViolation) -> Self {
        Self::TemplateStructure(value)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_report_to_dict_and_format() {
        let mut report = SpecFillReport {
            cnt_cells_filled: 5,
            cnt_elements_expanded: 2,
            cnt_rows_deleted: 3,
            cnt_cells_blanked: 1,
            warnings: vec![],
        };
        report.warn("w");

        let dict_counts = report.to_dict();
        assert_eq!(dict_counts["cnt_cells_filled"], 5);
        assert_eq!(dict_counts["cnt_elements_expanded"], 2);
        assert_eq!(dict_counts["cnt_rows_deleted"], 3);
        assert_eq!(dict_counts["cnt_cells_blanked"], 1);
        assert_eq!(dict_counts["cnt_warnings"], 1);
        assert_eq!(
            report.to_string(),
            "[REPORT] filled=5 expanded=2 deleted=3 blanked=1 warnings=1"
        );
    }

    #[test]
    fn cell_format_merge_prefers_right_side() {
        let base = SpecCellFormat {
            font_name: Some("Arial".to_string()),
            num_format: Some("@".to_string()),
            ..Default::default()
        };
        let merged = base.with_(SpecCellFormat::with_num_format("0.00"));
        assert_eq!(merged.font_name.as_deref(), Some("Arial"));
        assert_eq!(merged.num_format.as_deref(), Some("0.00"));
    }

    #[test]
    fn cell_range_membership() {
        let range = SpecCellRange::new(2, 4, 1, 3);
        assert!(range.contains(2, 1));
        assert!(range.contains(4, 3));
        assert!(!range.contains(5, 1));
        assert!(!range.contains(3, 0));
        assert!(range.contains_row(3));
        assert_eq!(range.height(), 3);
    }

    #[test]
    fn report_key_builders() {
        let key = SpecReportKey::complex().named("rows").temporary();
        assert_eq!(key.key_kind, EnumKeyKind::Complex);
        assert_eq!(key.name.as_deref(), Some("rows"));
        assert!(key.if_temporary);
        assert_eq!(key.date_pattern, "dd.MM.yyyy");
        assert_eq!(key.time_pattern, "HH:mm:ss");
    }
}
