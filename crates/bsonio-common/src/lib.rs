pub mod error;
pub mod types;
pub mod config;

pub use error::{CommonError, CommonResult};
pub use types::*;
pub use config::*;
