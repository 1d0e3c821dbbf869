pub mod error;
pub mod openai;
pub mod util;

pub use error::{AiError, Result};
pub use openai::OpenAi;
pub use util::error_excerpt;
