// Line-oriented patching of a Godot .tscn scene. Lines keep their own terminators and
// only a few well-known lines are replaced or dropped, so unmatched bytes survive untouched.

use crate::import_uid::ModelReference;
use crate::ModelFile;
use regex::Regex;
use std::borrow::Cow;
use std::error::Error;
use std::ffi::OsString;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static SKELETON_NODE: LazyLock<Regex> = LazyLock::new(||
    Regex::new(r#"^\[node (?:[^\]]* )?(?:name|type)="Skeleton3D""#).expect("Invalid skeleton node pattern"));
static BONE_OVERRIDE: LazyLock<Regex> = LazyLock::new(||
    Regex::new(r"^bones/\d+/\w+\s*=").expect("Invalid bone override pattern"));
// "Amature" shows up in older exports
static ARMATURE_NODE: LazyLock<Regex> = LazyLock::new(||
    Regex::new(r#"^\[node (?:[^\]]* )?name="(?:Armature|Amature)""#).expect("Invalid armature node pattern"));
static TRANSFORM_OVERRIDE: LazyLock<Regex> = LazyLock::new(||
    Regex::new(r"^transform\s*=").expect("Invalid transform pattern"));

pub const BACKUP_EXTENSION: &str = "backup";
const PACKED_SCENE: &str = "PackedScene";

#[derive(Debug)]
pub enum PatchError
{
    ReferenceNotFound
    {
        res_model_dir: String,
        model_extension: String,
    },
    SceneRead(io::Error),
    BackupWrite
    {
        backup_path: PathBuf,
        error: io::Error,
    },
    SceneWrite(io::Error),
}
impl Error for PatchError { }
impl Display for PatchError
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result
    {
        match self
        {
            PatchError::ReferenceNotFound { res_model_dir, model_extension } =>
                write!(f, "No [ext_resource type=\"{PACKED_SCENE}\" ...] referencing a .{model_extension} model under {res_model_dir}/ was found in the scene; the scene was not modified"),
            PatchError::SceneRead(err) => write!(f, "Failed to read the scene: {err}"),
            PatchError::BackupWrite { backup_path, error } =>
                write!(f, "Failed to write the scene backup {backup_path:?}: {error}; the scene was not modified"),
            PatchError::SceneWrite(err) => write!(f, "Failed to write the patched scene: {err}"),
        }
    }
}

// One `[ext_resource type="PackedScene" ...]` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtReference
{
    pub uid: Option<String>,
    pub path: String,
    pub id: String,
}
impl Display for ExtReference
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result
    {
        write!(f, "[ext_resource type=\"{PACKED_SCENE}\"")?;
        if let Some(uid) = &self.uid
        {
            write!(f, " uid=\"{uid}\"")?;
        }
        write!(f, " path=\"{}\" id=\"{}\"]", self.path, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenePatch
{
    pub text: String,
    pub previous: ExtReference,
    pub replaced: ExtReference,
    pub removed_bone_overrides: usize,
    pub removed_armature_transform: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode
{
    Write,
    DryRun,
}

#[derive(Debug)]
pub struct FilePatch
{
    pub patch: ScenePatch,
    pub backup_path: Option<PathBuf>, // none on dry runs
}

pub struct ScenePatcher
{
    res_model_dir: String,
    model_extension: String,
    reference_line: Regex,
}
impl ScenePatcher
{
    // `res_model_dir` is the `res://` directory that holds the models, e.g. `res://Assets/character_model`
    pub fn new(res_model_dir: &str, model_extension: &str) -> Result<Self, regex::Error>
    {
        let res_model_dir = res_model_dir.trim_end_matches('/').to_string();
        let model_extension = model_extension.trim_start_matches('.').to_string();

        // groups: 1 = whole declaration, 2 = uid, 3 = path, 4 = local id
        let reference_line = Regex::new(&format!(
            r#"^[ \t]*(\[ext_resource type="{}"(?: uid="([^"]*)")? path="({}/[^"]+\.(?i:{}))" id="([^"]+)"\])"#,
            PACKED_SCENE,
            regex::escape(&res_model_dir),
            regex::escape(&model_extension)))?;

        Ok(Self
        {
            res_model_dir,
            model_extension,
            reference_line,
        })
    }

    pub fn model_path(&self, model: &ModelFile) -> String
    {
        format!("{}/{}", self.res_model_dir, model.file_name())
    }

    // Point the scene's model reference at `reference` and drop the old model's bone and armature overrides
    pub fn patch(&self, scene: &str, reference: &ModelReference) -> Result<ScenePatch, PatchError>
    {
        let mut lines: Vec<Cow<str>> = scene.split_inclusive('\n').map(Cow::Borrowed).collect();

        let (previous, replaced) = self.replace_reference(&mut lines, reference)?;
        let removed_bone_overrides = strip_bone_overrides(&mut lines);
        let removed_armature_transform = strip_armature_transform(&mut lines);

        Ok(ScenePatch
        {
            text: lines.concat(),
            previous,
            replaced,
            removed_bone_overrides,
            removed_armature_transform,
        })
    }

    // Patch the scene file in place. The original is copied to the backup path first;
    // nothing is written if the scene has no model reference.
    pub fn patch_file(&self, scene_path: &Path, reference: &ModelReference, mode: WriteMode) -> Result<FilePatch, PatchError>
    {
        let original = std::fs::read_to_string(scene_path).map_err(PatchError::SceneRead)?;
        let patch = self.patch(&original, reference)?;

        log::info!("Replacing {} with {}", patch.previous, patch.replaced);
        log::info!("Removed {} bone override(s){}",
            patch.removed_bone_overrides,
            if patch.removed_armature_transform { " and the armature transform" } else { "" });

        if mode == WriteMode::DryRun
        {
            log::info!("Dry run, {scene_path:?} left untouched");
            return Ok(FilePatch { patch, backup_path: None });
        }

        let backup_path = backup_path(scene_path);
        std::fs::write(&backup_path, &original).map_err(|error| PatchError::BackupWrite
        {
            backup_path: backup_path.clone(),
            error,
        })?;
        log::info!("Backup saved to {backup_path:?}");

        write_replacing(scene_path, &patch.text).map_err(PatchError::SceneWrite)?;
        log::info!("Patched {scene_path:?}");

        Ok(FilePatch { patch, backup_path: Some(backup_path) })
    }

    fn replace_reference(&self, lines: &mut [Cow<str>], reference: &ModelReference) -> Result<(ExtReference, ExtReference), PatchError>
    {
        // only the first reference is replaced
        for line in lines.iter_mut()
        {
            let Some(caps) = self.reference_line.captures(&**line) else { continue; };
            let (Some(decl), Some(path), Some(id)) = (caps.get(1), caps.get(3), caps.get(4)) else { continue; };

            let previous = ExtReference
            {
                uid: caps.get(2).map(|m| m.as_str().to_string()),
                path: path.as_str().to_string(),
                id: id.as_str().to_string(),
            };
            let replaced = ExtReference
            {
                uid: Some(reference.uid.clone()),
                path: self.model_path(&reference.model),
                id: previous.id.clone(),
            };

            let new_line = format!("{}{}{}", &line[..decl.start()], replaced, &line[decl.end()..]);
            *line = Cow::Owned(new_line);
            return Ok((previous, replaced));
        }

        Err(PatchError::ReferenceNotFound
        {
            res_model_dir: self.res_model_dir.clone(),
            model_extension: self.model_extension.clone(),
        })
    }
}

// `<scene>.backup`, next to the scene
pub fn backup_path(scene_path: &Path) -> PathBuf
{
    let mut path = OsString::from(scene_path.as_os_str());
    path.push(".");
    path.push(BACKUP_EXTENSION);
    PathBuf::from(path)
}

// Write through a sibling temp file so the scene is never left half-written
fn write_replacing(path: &Path, contents: &str) -> io::Result<()>
{
    let mut temp_path = OsString::from(path.as_os_str());
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);

    std::fs::write(&temp_path, contents)?;
    if let Err(err) = std::fs::rename(&temp_path, path)
    {
        let _ = std::fs::remove_file(&temp_path);
        return Err(err);
    }
    Ok(())
}

#[inline]
fn line_body(line: &str) -> &str { line.trim_end_matches(['\n', '\r']) }

// A new `[...]` declaration or a blank line ends a node's property block
#[inline]
fn ends_block(line: &str) -> bool
{
    let body = line_body(line);
    body.starts_with('[') || body.trim().is_empty()
}

// Drop `bones/N/...` lines inside skeleton node blocks, returns the number of lines dropped
fn strip_bone_overrides(lines: &mut Vec<Cow<str>>) -> usize
{
    let mut in_skeleton = false;
    let mut removed = 0;
    lines.retain(|line|
    {
        if in_skeleton && ends_block(line)
        {
            in_skeleton = false;
        }

        if !in_skeleton
        {
            in_skeleton = SKELETON_NODE.is_match(line);
            return true;
        }

        if BONE_OVERRIDE.is_match(line)
        {
            removed += 1;
            return false;
        }
        true
    });
    removed
}

// Drop the first `transform = ...` in the body of the first armature node
fn strip_armature_transform(lines: &mut Vec<Cow<str>>) -> bool
{
    let Some(header) = lines.iter().position(|l| ARMATURE_NODE.is_match(l)) else { return false; };
    let body_start = header + 1;
    let body_len = lines[body_start..].iter().position(|l| ends_block(l)).unwrap_or(lines.len() - body_start);

    match lines[body_start..body_start + body_len].iter().position(|l| TRANSFORM_OVERRIDE.is_match(l))
    {
        Some(t) =>
        {
            lines.remove(body_start + t);
            true
        }
        None => false,
    }
}
