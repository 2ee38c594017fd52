pub mod error;
pub mod version;

pub use error::{Error, Result};
pub use version::{Direction, NO_VERSION, Version};
