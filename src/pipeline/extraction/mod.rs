pub mod columns;
pub mod sheet;

pub use columns::*;
pub use sheet::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Workbook could not be read: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Workbook has no sheets")]
    NoSheets,

    #[error("Sheet '{sheet}' has no recognizable {missing} column")]
    MissingColumns { sheet: String, missing: String },
}
