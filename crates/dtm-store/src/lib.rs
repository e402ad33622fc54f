pub mod mirrored;
pub mod schema;
pub mod store;
pub mod tsv;

pub use mirrored::MirroredLog;
pub use store::SqliteLog;
pub use tsv::TsvLog;
