use crate::export::ExportMode;
use nab_tps::toml_io::{TomlRead, TomlReadError};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Component, Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError
{
    NotFound(PathBuf),
    ReadError
    {
        path: PathBuf,
        error: TomlReadError,
    },
    InvalidModelDir(PathBuf),
}
impl Error for ConfigError { }
impl Display for ConfigError
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result
    {
        match self
        {
            ConfigError::NotFound(path) => write!(f, "Config file {path:?} does not exist"),
            ConfigError::ReadError { path, error } => write!(f, "Failed to load config {path:?}: {error}"),
            ConfigError::InvalidModelDir(dir) => write!(f, "model_dir {dir:?} must be a relative path inside the project"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SwapConfig
{
    pub project_root: PathBuf,
    pub scene_path: PathBuf, // relative to project_root
    pub model_dir: PathBuf, // relative to project_root, also the res:// directory
    pub model_extension: String,
    pub godot_exe: PathBuf,
    pub build_dir: PathBuf, // relative to project_root
    pub export_preset: String,
    pub export_mode: ExportMode,
    pub build_name_prefix: String,
    pub build_extension: String,
}
impl Default for SwapConfig
{
    fn default() -> Self
    {
        Self
        {
            project_root: PathBuf::from("."),
            scene_path: PathBuf::from("Assets/character_model/character_model.tscn"),
            model_dir: PathBuf::from("Assets/character_model"),
            model_extension: "fbx".to_string(),
            godot_exe: PathBuf::from("godot"),
            build_dir: PathBuf::from("build"),
            export_preset: "Windows Desktop".to_string(),
            export_mode: ExportMode::Release,
            build_name_prefix: "game-".to_string(),
            build_extension: "exe".to_string(),
        }
    }
}
impl TomlRead for SwapConfig { }
impl SwapConfig
{
    pub const FILE_NAME: &'static str = "model_swap.toml";

    // Load the config from `explicit` if given, otherwise the first of
    // `./model_swap.toml` and `<user config dir>/model_swap.toml` that exists, otherwise the defaults
    pub fn locate(explicit: Option<&Path>) -> Result<Self, ConfigError>
    {
        if let Some(path) = explicit
        {
            if !path.is_file()
            {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Self::load_from(path);
        }

        let user_config = directories::ProjectDirs::from("", "", "model_swap")
            .map(|dirs| dirs.config_dir().join(Self::FILE_NAME));

        for candidate in std::iter::once(PathBuf::from(Self::FILE_NAME)).chain(user_config)
        {
            if candidate.is_file()
            {
                return Self::load_from(&candidate);
            }
        }

        log::debug!("No {} found, using defaults", Self::FILE_NAME);
        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError>
    {
        log::debug!("Loading config from {path:?}");
        Self::load_file(path).map_err(|error| ConfigError::ReadError
        {
            path: path.to_path_buf(),
            error,
        })
    }

    pub fn scene_file(&self) -> PathBuf { self.project_root.join(&self.scene_path) }
    pub fn model_dir_path(&self) -> PathBuf { self.project_root.join(&self.model_dir) }
    pub fn build_dir_path(&self) -> PathBuf { self.project_root.join(&self.build_dir) }

    // e.g. build/game-alien.exe
    pub fn build_output(&self, build_suffix: &str) -> PathBuf
    {
        let extension = self.build_extension.trim_start_matches('.');
        let file_name = match extension.is_empty()
        {
            true => format!("{}{}", self.build_name_prefix, build_suffix),
            false => format!("{}{}.{}", self.build_name_prefix, build_suffix, extension),
        };
        self.build_dir_path().join(file_name)
    }

    // The model directory as Godot addresses it, e.g. res://Assets/character_model
    pub fn res_model_dir(&self) -> Result<String, ConfigError>
    {
        let mut parts = Vec::new();
        for component in self.model_dir.components()
        {
            match component
            {
                Component::Normal(part) => parts.push(part.to_string_lossy()),
                Component::CurDir => { }
                _ => return Err(ConfigError::InvalidModelDir(self.model_dir.clone())),
            }
        }
        if parts.is_empty()
        {
            return Err(ConfigError::InvalidModelDir(self.model_dir.clone()));
        }
        Ok(format!("res://{}", parts.join("/")))
    }
}
