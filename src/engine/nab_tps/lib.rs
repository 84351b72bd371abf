pub mod app;
pub mod toml_io;
