pub mod envelope;
pub mod json;

pub use envelope::{ApiResult, Envelope};
pub use json::JsonBody;
