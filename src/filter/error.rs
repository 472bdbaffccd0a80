use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Unsafe sort parameter: {0}")]
    UnsafeSort(String),

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Invalid column name: {0}")]
    InvalidColumn(String),
}
