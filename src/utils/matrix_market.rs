//! This module loads sparse test matrices stored in the Matrix Market exchange format.
//!
//! Only the coordinate format with real values is supported, which covers the symmetric
//! positive-definite matrices of the SuiteSparse collection. Symmetric files store one
//! triangle; the missing half is mirrored on load.

use faer::sparse::{SparseColMat, Triplet};
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};
use thiserror::Error;

/// Represents all possible errors that can occur while reading a Matrix Market file.
#[derive(Error, Debug)]
pub enum MatrixMarketError {
    /// Wraps a standard I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Occurs when a string cannot be parsed into an integer.
    #[error("Parse error: Failed to parse integer from '{0}'")]
    ParseInt(String),
    /// Occurs when a string cannot be parsed into a float.
    #[error("Parse error: Failed to parse float from '{0}'")]
    ParseFloat(String),
    /// Occurs if the `%%MatrixMarket` banner is missing.
    #[error("Format error: The '%%MatrixMarket' header line was not found.")]
    HeaderMissing,
    /// Occurs for dense, complex, pattern or skew-symmetric files.
    #[error("Format error: Unsupported Matrix Market format '{0}'.")]
    UnsupportedFormat(String),
    /// Occurs when the end of a file is reached unexpectedly during parsing.
    #[error("Format error: Unexpected end of file while reading data.")]
    UnexpectedEof,
    /// Occurs when an entry lies outside the declared dimensions.
    #[error("Entry ({row}, {col}) lies outside a {nrows}x{ncols} matrix.")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        nrows: usize,
        ncols: usize,
    },
    /// Occurs if the sparse matrix construction fails internally.
    #[error("Internal error: Failed to construct the sparse matrix from triplets.")]
    SparseMatrixConstructionError,
}

fn parse_usize(token: Option<&str>) -> Result<usize, MatrixMarketError> {
    let token = token.ok_or(MatrixMarketError::UnexpectedEof)?;
    token
        .parse::<usize>()
        .map_err(|_| MatrixMarketError::ParseInt(token.to_string()))
}

/// Parses Matrix Market data from any buffered reader.
///
/// # Returns
/// The matrix with duplicate entries summed, as `try_new_from_triplets` does.
pub fn parse_matrix_market(
    reader: impl BufRead,
) -> Result<SparseColMat<usize, f64>, MatrixMarketError> {
    let mut lines = reader.lines();

    let header = lines.next().ok_or(MatrixMarketError::HeaderMissing)??;
    let banner: Vec<String> = header
        .split_whitespace()
        .map(|token| token.to_ascii_lowercase())
        .collect();
    if banner.first().map(String::as_str) != Some("%%matrixmarket") {
        return Err(MatrixMarketError::HeaderMissing);
    }
    let symmetric = match banner.get(1..5) {
        Some([object, format, field, symmetry])
            if object == "matrix" && format == "coordinate" && field == "real" =>
        {
            match symmetry.as_str() {
                "general" => false,
                "symmetric" => true,
                _ => return Err(MatrixMarketError::UnsupportedFormat(header.clone())),
            }
        }
        _ => return Err(MatrixMarketError::UnsupportedFormat(header.clone())),
    };

    // Skip comments up to the size line.
    let size_line = loop {
        let line = lines.next().ok_or(MatrixMarketError::UnexpectedEof)??;
        let trimmed = line.trim();
        if !trimmed.is_empty() && !trimmed.starts_with('%') {
            break line;
        }
    };
    let mut parts = size_line.split_whitespace();
    let nrows = parse_usize(parts.next())?;
    let ncols = parse_usize(parts.next())?;
    let nnz = parse_usize(parts.next())?;

    let capacity = if symmetric { 2 * nnz } else { nnz };
    let mut triplets: Vec<Triplet<usize, usize, f64>> = Vec::with_capacity(capacity);
    let mut entries_read = 0;
    for line in lines {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('%') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        // Indices are 1-based in the file.
        let row = parse_usize(parts.next())?;
        let col = parse_usize(parts.next())?;
        if row == 0 || col == 0 || row > nrows || col > ncols {
            return Err(MatrixMarketError::IndexOutOfBounds {
                row,
                col,
                nrows,
                ncols,
            });
        }
        let token = parts.next().ok_or(MatrixMarketError::UnexpectedEof)?;
        let val = token
            .parse::<f64>()
            .map_err(|_| MatrixMarketError::ParseFloat(token.to_string()))?;

        let (row, col) = (row - 1, col - 1);
        triplets.push(Triplet { row, col, val });
        if symmetric && row != col {
            triplets.push(Triplet {
                row: col,
                col: row,
                val,
            });
        }
        entries_read += 1;
        if entries_read == nnz {
            break;
        }
    }

    if entries_read < nnz {
        return Err(MatrixMarketError::UnexpectedEof);
    }

    SparseColMat::try_new_from_triplets(nrows, ncols, &triplets)
        .map_err(|_| MatrixMarketError::SparseMatrixConstructionError)
}

/// Loads a Matrix Market file from disk.
pub fn load_matrix_market(
    path: impl AsRef<Path>,
) -> Result<SparseColMat<usize, f64>, MatrixMarketError> {
    let file = File::open(path)?;
    parse_matrix_market(BufReader::new(file))
}
