//! `reportkit_xlsx` v1:
//! Bind annotated record graphs to spreadsheet templates.
//!
//! Architecture:
//! - `conf`      : constants and default presets
//! - `spec`      : specs/models/options and the error taxonomy
//! - `record`    : `ReportRecord` binding tables and typed accessors
//! - `schema`    : key schema builder
//! - `grid`      : grid primitives trait and the in-memory workbook
//! - `validate`  : template structure checks
//! - `fill`      : template filler
//! - `catalogue` : blank template and key catalogue generation
//! - `util`      : pure helper functions
//! - `reader`    : `.xlsx` template reader
//! - `writer`    : `.xlsx` writer kernel
//! - `report`    : report facade
pub mod catalogue;
pub mod conf;
pub mod fill;
pub mod grid;
pub mod reader;
pub mod record;
pub mod report;
pub mod schema;
pub mod spec;
pub mod util;
pub mod validate;
pub mod writer;

pub use conf::{
    C_KEY_COUNTER, C_SHEET_DEFAULT, C_SHEET_REPORT_KEYS, N_LEN_EXCEL_SHEET_NAME_MAX,
    N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL,
};
pub use fill::TemplateFiller;
pub use grid::{GridWorkbook, MemCell, MemRow, MemSheet, MemWorkbook};
pub use reader::{read_template_xlsx, read_template_xlsx_from_bytes};
pub use record::{
    EnumAccessError, EnumFieldAccessor, EnumFieldValue, IntoFieldValue, ReportRecord,
    SpecFieldDecl, SpecFieldTable, SpecTypeInfo,
};
pub use report::Report;
pub use schema::{KeySchema, SpecKeyBinding};
pub use spec::{
    EnumCellError, EnumCellValue, EnumDataType, EnumKeyKind, EnumTemplateViolation, ReportError,
    SpecAutofitCellsPolicy, SpecCellFormat, SpecCellRange, SpecFillReport, SpecImageHandle,
    SpecReportKey, SpecReportOptions, SpecSheetImage,
};
pub use validate::validate_template;
pub use writer::{XlsxWriter, save_workbook_xlsx};
