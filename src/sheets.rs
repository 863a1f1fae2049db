use crate::models::SheetDescriptor;
use calamine::{Reader, Xls, Xlsx};
use std::io::Cursor;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Spreadsheet parse error: {0}")]
    Workbook(String),
    #[error("Spreadsheet has no worksheets")]
    NoSheets,
    #[error("Unsupported file type: {0}")]
    Unsupported(String),
}

/// File types accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Xls,
    Xlsx,
    Csv,
    Pdf,
}

impl FileKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "xls" => Some(FileKind::Xls),
            "xlsx" => Some(FileKind::Xlsx),
            "csv" => Some(FileKind::Csv),
            "pdf" => Some(FileKind::Pdf),
            _ => None,
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            "application/vnd.ms-excel" => Some(FileKind::Xls),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                Some(FileKind::Xlsx)
            }
            "text/csv" => Some(FileKind::Csv),
            "application/pdf" => Some(FileKind::Pdf),
            _ => None,
        }
    }

    pub fn is_spreadsheet(self) -> bool {
        matches!(self, FileKind::Xls | FileKind::Xlsx)
    }
}

/// Display name for one worksheet: `<stem>_<sheet>` with underscores as spaces.
pub fn sheet_title(file_name: &str, sheet: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    format!("{}_{}", stem, sheet).replace('_', " ")
}

/// Build descriptors for `file_name` from its bytes. Spreadsheets get one
/// descriptor per worksheet; CSV and PDF files get a single descriptor.
pub fn extract(file_name: &str, bytes: &[u8]) -> Result<Vec<SheetDescriptor>, SheetError> {
    let kind =
        FileKind::from_name(file_name).ok_or_else(|| SheetError::Unsupported(file_name.into()))?;
    if !kind.is_spreadsheet() {
        return Ok(vec![SheetDescriptor {
            name: file_name.to_string(),
            title: file_name.to_string(),
            file: file_name.to_string(),
            sheet: None,
        }]);
    }

    let names = sheet_names(kind, bytes)?;
    if names.is_empty() {
        return Err(SheetError::NoSheets);
    }
    Ok(names
        .into_iter()
        .map(|sheet| {
            let title = sheet_title(file_name, &sheet);
            SheetDescriptor {
                name: title.clone(),
                title,
                file: file_name.to_string(),
                sheet: Some(sheet),
            }
        })
        .collect())
}

fn sheet_names(kind: FileKind, bytes: &[u8]) -> Result<Vec<String>, SheetError> {
    let cursor = Cursor::new(bytes);
    match kind {
        FileKind::Xlsx => Xlsx::new(cursor)
            .map(|wb| wb.sheet_names())
            .map_err(|e| SheetError::Workbook(e.to_string())),
        FileKind::Xls => Xls::new(cursor)
            .map(|wb| wb.sheet_names())
            .map_err(|e| SheetError::Workbook(e.to_string())),
        other => Err(SheetError::Unsupported(format!("{:?}", other))),
    }
}

/// Read `path` and extract its descriptors without blocking the runtime.
pub async fn read(path: &Path) -> Result<Vec<SheetDescriptor>, SheetError> {
    let file_name = file_name(path);
    let bytes = tokio::fs::read(path).await.map_err(|source| SheetError::Io {
        path: path.display().to_string(),
        source,
    })?;
    tokio::task::spawn_blocking(move || extract(&file_name, &bytes))
        .await
        .map_err(|e| SheetError::Workbook(format!("extraction task failed: {}", e)))?
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}
