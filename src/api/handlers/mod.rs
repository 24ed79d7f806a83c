mod admin;
mod files;

pub use admin::{health, index_stats, list_audit};
pub use files::{create_file, download, get_file, search, upload_blob};
