// Swaps the character model referenced by the scene and exports a build of the project.

use crate::config::{ConfigError, SwapConfig};
use crate::export::{ExportError, GodotExporter};
use crate::import_uid::{resolve_model_reference, ModelReference, ResolveError};
use crate::scene_patch::{ExtReference, PatchError, ScenePatcher, WriteMode};
use crate::ModelFile;
use nab_tps::app::FatalErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use walkdir::WalkDir;

#[derive(Debug)]
pub enum SwapError
{
    MissingArgument,
    Config(ConfigError),
    ModelFileNotFound
    {
        model_path: PathBuf,
        available: Vec<String>,
    },
    ImportMetadataMissing(ResolveError),
    IdentifierNotFound(ResolveError),
    ReferenceNotFound(PatchError),
    SceneIo(PatchError),
    BuildFailed(ExportError),
}
impl Error for SwapError
{
    fn source(&self) -> Option<&(dyn Error + 'static)>
    {
        match self
        {
            SwapError::MissingArgument | SwapError::ModelFileNotFound { .. } => None,
            SwapError::Config(err) => Some(err),
            SwapError::ImportMetadataMissing(err) | SwapError::IdentifierNotFound(err) => Some(err),
            SwapError::ReferenceNotFound(err) | SwapError::SceneIo(err) => Some(err),
            SwapError::BuildFailed(err) => Some(err),
        }
    }
}
impl Display for SwapError
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result
    {
        match self
        {
            SwapError::MissingArgument => f.write_str("A model name is required"),
            SwapError::Config(err) => Display::fmt(err, f),
            SwapError::ModelFileNotFound { model_path, available } =>
            {
                write!(f, "Model file not found: {model_path:?}")?;
                match available.is_empty()
                {
                    true => f.write_str("\n(no model files found)"),
                    false =>
                    {
                        f.write_str("\nAvailable models:")?;
                        available.iter().try_for_each(|m| write!(f, "\n  - {m}"))
                    }
                }
            }
            SwapError::ImportMetadataMissing(err) | SwapError::IdentifierNotFound(err) => Display::fmt(err, f),
            SwapError::ReferenceNotFound(err) | SwapError::SceneIo(err) => Display::fmt(err, f),
            SwapError::BuildFailed(err) => Display::fmt(err, f),
        }
    }
}
impl FatalErrorCode for SwapError
{
    fn error_code(&self) -> u16
    {
        match self
        {
            SwapError::MissingArgument => 2,
            SwapError::Config(_) => 3,
            SwapError::ModelFileNotFound { .. } => 4,
            SwapError::ImportMetadataMissing(_) => 5,
            SwapError::IdentifierNotFound(_) => 6,
            SwapError::ReferenceNotFound(_) => 7,
            SwapError::SceneIo(_) => 8,
            SwapError::BuildFailed(_) => 9,
        }
    }
}
impl From<ConfigError> for SwapError
{
    fn from(err: ConfigError) -> Self { SwapError::Config(err) }
}
impl From<ResolveError> for SwapError
{
    fn from(err: ResolveError) -> Self
    {
        match err
        {
            ResolveError::IdentifierNotFound { .. } => SwapError::IdentifierNotFound(err),
            ResolveError::ImportMetadataMissing { .. } | ResolveError::ImportMetadataRead { .. } => SwapError::ImportMetadataMissing(err),
        }
    }
}
impl From<PatchError> for SwapError
{
    fn from(err: PatchError) -> Self
    {
        match err
        {
            PatchError::ReferenceNotFound { .. } => SwapError::ReferenceNotFound(err),
            _ => SwapError::SceneIo(err),
        }
    }
}
impl From<ExportError> for SwapError
{
    fn from(err: ExportError) -> Self { SwapError::BuildFailed(err) }
}

#[derive(Debug, Clone, Default)]
pub struct SwapRequest
{
    pub model_name: String,
    pub build_suffix: Option<String>, // defaults to the model name without its extension
    pub dry_run: bool, // compute the patch but write and build nothing
    pub skip_build: bool,
}

#[derive(Debug)]
pub struct SwapReport
{
    pub model: ModelReference,
    pub build_suffix: String,
    pub scene_path: PathBuf,
    pub backup_path: Option<PathBuf>,
    pub previous: ExtReference,
    pub replaced: ExtReference,
    pub removed_bone_overrides: usize,
    pub removed_armature_transform: bool,
    pub build_output: Option<PathBuf>,
}

pub struct ModelSwap
{
    config: SwapConfig,
    patcher: ScenePatcher,
    exporter: GodotExporter,
}
impl ModelSwap
{
    pub fn new(config: SwapConfig) -> Result<Self, SwapError>
    {
        let res_model_dir = config.res_model_dir()?;
        let patcher = ScenePatcher::new(&res_model_dir, &config.model_extension)
            .map_err(|_| ConfigError::InvalidModelDir(config.model_dir.clone()))?;
        let exporter = GodotExporter::new(&config.godot_exe, config.export_mode);

        Ok(Self
        {
            config,
            patcher,
            exporter,
        })
    }

    // The model files (with the configured extension) in the model directory, sorted by name
    pub fn available_models(&self) -> Vec<String>
    {
        WalkDir::new(self.config.model_dir_path())
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file() && ModelFile::has_extension(entry.path(), &self.config.model_extension))
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect()
    }

    pub fn verify_model(&self, model: &ModelFile) -> Result<PathBuf, SwapError>
    {
        let model_path = self.config.model_dir_path().join(model.file_name());
        if !model_path.is_file()
        {
            return Err(SwapError::ModelFileNotFound
            {
                model_path,
                available: self.available_models(),
            });
        }
        log::info!("Model exists: {model_path:?}");
        Ok(model_path)
    }

    pub fn run(&self, request: &SwapRequest) -> Result<SwapReport, SwapError>
    {
        let model = ModelFile::new(&request.model_name, &self.config.model_extension);
        let build_suffix = request.build_suffix.clone().unwrap_or_else(|| model.stem().to_string());
        log::info!("Model: {model}, build suffix: {build_suffix}");

        self.verify_model(&model)?;

        let reference = resolve_model_reference(&self.config.model_dir_path(), &model)?;

        let scene_path = self.config.scene_file();
        let write_mode = match request.dry_run
        {
            true => WriteMode::DryRun,
            false => WriteMode::Write,
        };
        let file_patch = self.patcher.patch_file(&scene_path, &reference, write_mode)?;

        let build_output = match request.dry_run || request.skip_build
        {
            true =>
            {
                log::info!("Skipping export");
                None
            }
            false =>
            {
                let output_path = self.config.build_output(&build_suffix);
                let output = self.exporter.export(&self.config.project_root, &self.config.export_preset, &output_path)?;
                if !output.stderr.trim().is_empty()
                {
                    log::debug!("Export diagnostics:\n{}", output.stderr);
                }
                Some(output.output_path)
            }
        };

        Ok(SwapReport
        {
            model: reference,
            build_suffix,
            scene_path,
            backup_path: file_patch.backup_path,
            previous: file_patch.patch.previous,
            replaced: file_patch.patch.replaced,
            removed_bone_overrides: file_patch.patch.removed_bone_overrides,
            removed_armature_transform: file_patch.patch.removed_armature_transform,
            build_output,
        })
    }
}
