//! Core types shared by the sheetlink crates: cell grids and logging setup.

pub mod grid;
pub mod tracing;

pub use grid::{CellGrid, CellValue, to_tsv};
pub use tracing::{LogFormat, TracingConfig, TracingError, init_tracing};
