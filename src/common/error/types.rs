//! Error types for longan.
//!
//! A single error enum covers malformed references, structural limits,
//! sheet lookup, stream writer sequencing and the package/XML layers.
use thiserror::Error;

/// Main error type for longan operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// XML parse or write error
    #[error("XML error: {0}")]
    XmlError(String),

    /// ZIP container error
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// A cell name that does not match `[$]Letters[$]Digits`.
    #[error("invalid cell name {0:?}")]
    InvalidCellName(String),

    /// A cell name failed to convert to coordinates.
    #[error("cannot convert cell {cell:?} to coordinates: {source}")]
    CellNameToCoordinates {
        cell: String,
        #[source]
        source: Box<Error>,
    },

    /// Column letters are empty or contain non-letters.
    #[error("invalid column name {0:?}")]
    InvalidColumnName(String),

    /// Row number below 1.
    #[error("invalid row number {0}")]
    InvalidRowNumber(i64),

    /// Coordinates below 1.
    #[error("invalid cell reference [{col}, {row}]")]
    InvalidCoordinates { col: i64, row: i64 },

    /// A range that does not consist of two cell names.
    #[error("invalid range reference {0:?}")]
    InvalidRange(String),

    #[error("the column number must be greater than or equal to 1 and less than or equal to 16384")]
    ColumnOutOfRange,

    #[error("row number exceeds maximum limit")]
    RowOutOfRange,

    #[error("the height of the row must be less than or equal to 409 points")]
    RowHeightTooLarge,

    #[error("the width of the column must be less than or equal to 255 characters")]
    ColumnWidthTooLarge,

    /// Named worksheet does not exist.
    #[error("sheet {0} does not exist")]
    SheetNotFound(String),

    #[error("sheet {0} already exists")]
    SheetExists(String),

    #[error("invalid sheet name {0:?}")]
    InvalidSheetName(String),

    /// Grid access to a sheet with an active stream writer.
    #[error("sheet {0} is being written by a stream writer")]
    SheetStreaming(String),

    #[error("column widths must be set before the first row is written")]
    ColumnWidthAfterRowsWritten,

    #[error("a table can only be added after rows have been written")]
    TableBeforeRows,

    #[error("only one table is allowed per stream writer")]
    TableAlreadyAdded,

    #[error("stream writer has already been flushed")]
    StreamWriterFlushed,

    /// Cumulative uncompressed size crossed the configured ceiling.
    #[error("unzip size exceeds the {0} bytes limit")]
    UnzipSizeLimitExceeded(u64),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// A required package part is missing.
    #[error("missing package part: {0}")]
    MissingPart(String),
}

/// Result type for longan operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap a codec failure with the cell name that triggered it.
    pub(crate) fn cell_to_coordinates(cell: &str, source: Error) -> Self {
        Error::CellNameToCoordinates {
            cell: cell.to_string(),
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_conversion_error_names_the_literal() {
        let err = Error::cell_to_coordinates("A", Error::InvalidCellName("A".to_string()));
        assert_eq!(
            err.to_string(),
            r#"cannot convert cell "A" to coordinates: invalid cell name "A""#
        );
    }
}
