//! Stateless helper utilities used by the filler, catalogue and writer.

use chrono::{DateTime, FixedOffset, NaiveDateTime};

use crate::conf::{
    F_DPI_SCREEN, F_EXCEL_SERIAL_UNIX_EPOCH, F_PIXELS_COL_PADDING, F_PIXELS_PER_CHAR,
    F_POINTS_PER_INCH, N_LEN_EXCEL_SHEET_NAME_MAX, N_MILLIS_PER_DAY, TUP_EXCEL_ILLEGAL,
    TUP_NUM_FORMATS_TEXT,
};
use crate::record::EnumFieldValue;
use crate::spec::{EnumCellError, EnumCellValue, SpecAutofitCellsPolicy};

////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

/// Map `NaN`/`Inf` to the spreadsheet error value; return error for finite values.
pub fn convert_nan_inf_to_error(x: f64) -> Result<EnumCellError, String> {
    if x.is_nan() {
        return Ok(EnumCellError::Num);
    }
    if x.is_infinite() {
        return Ok(EnumCellError::Div0);
    }
    Err("Input is neither NaN nor Inf.".to_string())
}

/// Numeric cell value; non-finite numbers become error values.
pub fn convert_number_to_cell_value(x: f64) -> EnumCellValue {
    match convert_nan_inf_to_error(x) {
        Ok(err) => EnumCellValue::Error(err),
        Err(_) => EnumCellValue::Number(x),
    }
}

/// Coerce a field value to a float.
pub fn convert_field_value_to_number(value: &EnumFieldValue) -> Result<f64, String> {
    match value {
        EnumFieldValue::Float(x) => Ok(*x),
        EnumFieldValue::Integer(n) => Ok(*n as f64),
        EnumFieldValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("not a number: {s:?}")),
        EnumFieldValue::Bool(b) => Err(format!("not a number: {b}")),
    }
}

/// Coerce a field value to epoch milliseconds.
pub fn convert_field_value_to_millis(value: &EnumFieldValue) -> Result<i64, String> {
    match value {
        EnumFieldValue::Integer(n) => Ok(*n),
        EnumFieldValue::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("not a millisecond timestamp: {s:?}")),
        EnumFieldValue::Float(x)
            if x.is_finite() && x.fract() == 0.0 && x.abs() < i64::MAX as f64 =>
        {
            Ok(*x as i64)
        }
        other => Err(format!("not a millisecond timestamp: {other}")),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Temporal

/// Epoch milliseconds to wall-clock time at a fixed UTC offset.
pub fn convert_millis_to_local_datetime(
    millis: i64,
    utc_offset_seconds: i32,
) -> Result<NaiveDateTime, String> {
    let offset = FixedOffset::east_opt(utc_offset_seconds)
        .ok_or_else(|| format!("invalid UTC offset: {utc_offset_seconds}s"))?;
    let dt_utc = DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| format!("timestamp out of range: {millis}"))?;
    Ok(dt_utc.with_timezone(&offset).naive_local())
}

/// Translate an LDML date pattern (`dd.MM.yyyy`, `h:mm:ss aaa`) to strftime.
///
/// Quoted text (`'at'`) is literal and `''` is a single quote. Unknown
/// letters pass through unchanged.
pub fn convert_date_pattern_to_strftime(pattern: &str) -> String {
    let l_chars: Vec<char> = pattern.chars().collect();
    let mut c_out = String::with_capacity(pattern.len() * 2);
    let mut n_idx = 0;

    while n_idx < l_chars.len() {
        let chr = l_chars[n_idx];

        if chr == '\'' {
            if l_chars.get(n_idx + 1) == Some(&'\'') {
                c_out.push('\'');
                n_idx += 2;
                continue;
            }
            n_idx += 1;
            while n_idx < l_chars.len() {
                if l_chars[n_idx] == '\'' {
                    if l_chars.get(n_idx + 1) == Some(&'\'') {
                        c_out.push('\'');
                        n_idx += 2;
                        continue;
                    }
                    n_idx += 1;
                    break;
                }
                push_literal(&mut c_out, l_chars[n_idx]);
                n_idx += 1;
            }
            continue;
        }

        if !chr.is_ascii_alphabetic() {
            push_literal(&mut c_out, chr);
            n_idx += 1;
            continue;
        }

        let mut n_run = 1;
        while l_chars.get(n_idx + n_run) == Some(&chr) {
            n_run += 1;
        }
        match derive_strftime_token(chr, n_run) {
            Some(c_token) => c_out.push_str(c_token),
            None => (0..n_run).for_each(|_| push_literal(&mut c_out, chr)),
        }
        n_idx += n_run;
    }
    c_out
}

fn derive_strftime_token(letter: char, n_run: usize) -> Option<&'static str> {
    let c_token = match (letter, n_run) {
        ('y' | 'u', 2) => "%y",
        ('y' | 'u', _) => "%Y",
        ('M' | 'L', 1) => "%-m",
        ('M' | 'L', 2) => "%m",
        ('M' | 'L', 3) => "%b",
        ('M' | 'L', _) => "%B",
        ('d', 1) => "%-d",
        ('d', _) => "%d",
        ('D', _) => "%j",
        ('E', 1..=3) => "%a",
        ('E', _) => "%A",
        ('a', _) => "%p",
        ('H', 1) => "%-H",
        ('H', _) => "%H",
        ('h', 1) => "%-I",
        ('h', _) => "%I",
        ('m', 1) => "%-M",
        ('m', _) => "%M",
        ('s', 1) => "%-S",
        ('s', _) => "%S",
        ('S', _) => "%3f",
        ('Z', _) => "%z",
        _ => return None,
    };
    Some(c_token)
}

fn push_literal(c_out: &mut String, chr: char) {
    if chr == '%' {
        c_out.push_str("%%");
    } else {
        c_out.push(chr);
    }
}

/// Render a wall-clock time with an LDML pattern.
pub fn format_datetime_with_pattern(dt: &NaiveDateTime, pattern: &str) -> String {
    let c_strftime = convert_date_pattern_to_strftime(pattern);
    dt.format(&c_strftime).to_string()
}

/// Whether a cell's number format renders values as plain text.
pub fn is_text_num_format(num_format: Option<&str>) -> bool {
    match num_format {
        None => true,
        Some(c_fmt) => TUP_NUM_FORMATS_TEXT
            .iter()
            .any(|c_text| c_text.eq_ignore_ascii_case(c_fmt.trim())),
    }
}

/// Wall-clock time to an Excel serial day number (1900 date system).
pub fn derive_excel_serial_from_datetime(dt: &NaiveDateTime) -> f64 {
    let n_millis = dt.and_utc().timestamp_millis();
    n_millis as f64 / N_MILLIS_PER_DAY as f64 + F_EXCEL_SERIAL_UNIX_EPOCH
}

/// Excel serial day number to wall-clock time, millisecond precision.
pub fn derive_datetime_from_excel_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let f_millis = ((serial - F_EXCEL_SERIAL_UNIX_EPOCH) * N_MILLIS_PER_DAY as f64).round();
    if f_millis.abs() >= i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(f_millis as i64).map(|dt| dt.naive_utc())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Geometry

/// Column width in character units to pixels.
pub fn convert_col_width_to_pixels(width_chars: f64) -> f64 {
    if width_chars <= 0.0 {
        return 0.0;
    }
    if width_chars < 1.0 {
        return (width_chars * (F_PIXELS_PER_CHAR + F_PIXELS_COL_PADDING)).round();
    }
    (width_chars * F_PIXELS_PER_CHAR + F_PIXELS_COL_PADDING).round()
}

/// Points to pixels.
pub fn convert_points_to_pixels(points: f64) -> f64 {
    points * F_DPI_SCREEN / F_POINTS_PER_INCH
}

/// Pixels to points.
pub fn convert_pixels_to_points(pixels: f64) -> f64 {
    pixels * F_POINTS_PER_INCH / F_DPI_SCREEN
}

/// Uniform shrink-only scale fitting an image inside a box.
pub fn plan_image_scale_in_box(width_img: f64, height_img: f64, width_box: f64, height_box: f64) -> f64 {
    if width_img <= 0.0 || height_img <= 0.0 {
        return 1.0;
    }
    let f_ratio_width = width_box / width_img;
    let f_ratio_height = height_box / height_img;
    if f_ratio_width < 1.0 || f_ratio_height < 1.0 {
        f_ratio_width.min(f_ratio_height)
    } else {
        1.0
    }
}

/// Shrink-only scale fitting an image to a width, with the row height in
/// pixels that shows the scaled image fully.
pub fn plan_image_scale_by_width(width_img: f64, height_img: f64, width_box: f64) -> (f64, f64) {
    if width_img <= 0.0 {
        return (1.0, height_img);
    }
    let f_ratio = (width_box / width_img).min(1.0);
    (f_ratio, height_img * f_ratio)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Autofit

/// Displayed width units of a string; non-ASCII glyphs count wider.
pub fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
}

/// Final column width from the longest content length.
pub fn derive_autofit_width(n_len_content: usize, policy: &SpecAutofitCellsPolicy) -> f64 {
    let n_width = n_len_content + policy.width_cell_padding;
    n_width.clamp(policy.width_cell_min, policy.width_cell_max) as f64
}

/// Validate autofit bounds.
pub fn validate_policy_autofit(policy: &SpecAutofitCellsPolicy) -> Result<(), String> {
    if policy.width_cell_min > policy.width_cell_max {
        return Err(format!(
            "Invalid autofit policy: width_cell_min ({}) > width_cell_max ({}).",
            policy.width_cell_min, policy.width_cell_max
        ));
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNames

/// Validate an Excel sheet name.
pub fn validate_sheet_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Sheet name must not be empty.".to_string());
    }
    if name.chars().count() > N_LEN_EXCEL_SHEET_NAME_MAX {
        return Err(format!(
            "Sheet name {name:?} exceeds {N_LEN_EXCEL_SHEET_NAME_MAX} characters."
        ));
    }
    if let Some(c_illegal) = TUP_EXCEL_ILLEGAL.iter().find(|c| name.contains(**c)) {
        return Err(format!(
            "Sheet name {name:?} contains illegal character {c_illegal:?}."
        ));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(format!(
            "Sheet name {name:?} must not start or end with an apostrophe."
        ));
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
