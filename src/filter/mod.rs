pub mod types;
pub mod filter;
pub mod filter_order;
pub mod query_string;
pub mod error;

pub use types::*;
pub use error::FilterError;
pub use filter_order::FilterOrder;
pub use query_string::QueryString;
