mod error;
mod history;
mod settings;

pub use error::*;
pub use history::*;
pub use settings::*;
