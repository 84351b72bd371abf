mod model_file;
pub use model_file::*;

pub mod import_uid;
pub mod scene_patch;
pub mod export;
pub mod config;
pub mod model_swap;
