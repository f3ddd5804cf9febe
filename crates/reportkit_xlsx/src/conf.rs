//! Reserved names, defaults and geometry constants.

use crate::spec::SpecCellFormat;

////////////////////////////////////////////////////////////////////////////////
// #region ReservedNames

/// Metadata (key catalogue) sheet name. Never part of a delivered report.
pub const C_SHEET_REPORT_KEYS: &str = "REPORT_KEYS";
/// Default content sheet created by `create_template`.
pub const C_SHEET_DEFAULT: &str = "Sheet1";
/// Reserved counter placeholder, resolved to the 1-based list position.
pub const C_KEY_COUNTER: &str = "key_counter";
/// Prefix of derived names for single keys.
pub const C_PREFIX_KEY_SINGLE: &str = "key_";
/// Prefix of derived names for complex keys.
pub const C_PREFIX_KEY_COMPLEX: &str = "complex_";

/// Default pattern for Date keys.
pub const C_PATTERN_DATE_DEFAULT: &str = "dd.MM.yyyy";
/// Default pattern for Time keys.
pub const C_PATTERN_TIME_DEFAULT: &str = "HH:mm:ss";

/// Catalogue column headers, in sheet order.
pub const TUP_CATALOGUE_HEADERS: [&str; 7] = [
    "Key name",
    "Key type",
    "Data type",
    "Temporary key",
    "Date format",
    "Time format",
    "Key description",
];

/// Description written next to the counter placeholder in the catalogue.
pub const C_COUNTER_DESCRIPTION: &str =
    "This is a universal key that can be used in complex sheets to count the element number.";

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ExcelLimits

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: u32 = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: u16 = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Display formats treated as "text" when deciding how to write temporal values.
pub const TUP_NUM_FORMATS_TEXT: [&str; 2] = ["General", "@"];

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Geometry

/// Default row height in points.
pub const F_ROW_HEIGHT_DEFAULT_PT: f64 = 15.0;
/// Default column width in character units.
pub const F_COL_WIDTH_DEFAULT_CHARS: f64 = 8.43;
/// Screen resolution used for pixel conversions.
pub const F_DPI_SCREEN: f64 = 96.0;
/// Points per inch.
pub const F_POINTS_PER_INCH: f64 = 72.0;
/// Pixel width of one character unit of the default font.
pub const F_PIXELS_PER_CHAR: f64 = 7.0;
/// Fixed cell padding in pixels added to column widths of at least one character.
pub const F_PIXELS_COL_PADDING: f64 = 5.0;
/// Font-metric padding fractions that writers add to stored column widths.
pub const TUP_COL_WIDTH_PADDINGS_STORED: [f64; 2] = [0.832_031_25, 0.710_937_5];
/// Tolerance when matching a stored width fraction against a known padding.
pub const F_COL_WIDTH_PADDING_TOL: f64 = 0.0005;

/// Excel serial day of the Unix epoch (1970-01-01) in the 1900 date system.
pub const F_EXCEL_SERIAL_UNIX_EPOCH: f64 = 25_569.0;
/// Milliseconds per day.
pub const N_MILLIS_PER_DAY: i64 = 86_400_000;

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Presets

/// Number format written on native temporal cells that had no explicit format.
pub const C_NUM_FORMAT_DATETIME_DEFAULT: &str = "dd.mm.yyyy hh:mm:ss";

/// Header format used on the catalogue sheet.
pub fn derive_catalogue_header_format() -> SpecCellFormat {
    SpecCellFormat {
        bold: Some(true),
        align: Some("center".to_string()),
        border: Some(1),
        ..Default::default()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
