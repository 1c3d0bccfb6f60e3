pub mod github;
pub mod repository;
pub mod settings;

pub use github::*;
pub use repository::*;
pub use settings::*;
