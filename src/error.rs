use thiserror::Error;

/// Errors raised while loading, querying or exporting an asset register.
///
/// Missing columns, non-numeric financial values and malformed coordinates are
/// not errors: those surface as `None` from the relevant accessor.
#[derive(Debug, Error)]
pub enum AppError {
    /// The uploaded file could not be read as a workbook.
    #[error("could not read the file: {0}")]
    Load(String),

    #[error("unsupported file extension: {0}")]
    UnsupportedFormat(String),

    /// The sheet has no usable data rows.
    #[error("the sheet is empty")]
    EmptySheet,

    /// The configured header row is outside the sheet.
    #[error("no header found at sheet row {0}")]
    MissingHeader(usize),

    #[error("column '{0}' does not exist in the uploaded file")]
    UnknownColumn(String),

    #[error("unknown canonical field '{0}'")]
    UnknownField(String),

    #[error("asset '{0}' not found")]
    AssetNotFound(String),

    /// Building an export document failed; nothing is delivered.
    #[error("export failed: {0}")]
    Export(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<calamine::Error> for AppError {
    fn from(e: calamine::Error) -> Self {
        AppError::Load(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for AppError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        AppError::Export(e.to_string())
    }
}

impl From<lopdf::Error> for AppError {
    fn from(e: lopdf::Error) -> Self {
        AppError::Export(e.to_string())
    }
}

impl From<qrcode::types::QrError> for AppError {
    fn from(e: qrcode::types::QrError) -> Self {
        AppError::Export(format!("qr code: {}", e))
    }
}

impl From<handlebars::RenderError> for AppError {
    fn from(e: handlebars::RenderError) -> Self {
        AppError::Template(e.to_string())
    }
}

impl From<handlebars::TemplateError> for AppError {
    fn from(e: handlebars::TemplateError) -> Self {
        AppError::Template(e.to_string())
    }
}

impl AppError {
    /// Whether the failure was caused by the user's input rather than the server.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AppError::Load(_)
                | AppError::UnsupportedFormat(_)
                | AppError::EmptySheet
                | AppError::MissingHeader(_)
                | AppError::UnknownColumn(_)
                | AppError::UnknownField(_)
        )
    }
}
