pub mod config;
pub mod error;
pub mod logging;
pub mod table;

pub use config::{Delimiter, ImportConfig, ImportOptions};
pub use error::TableError;
pub use table::{prepare_table, TableBuilder};
