// Reads the UID that Godot's importer assigned to a model from its `.import` sidecar.

use crate::ModelFile;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static UID_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(||
    Regex::new(r#"\buid="([^"]+)""#).expect("Invalid UID pattern"));

const REMAP_SECTION: &str = "[remap]";
const PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReference
{
    pub model: ModelFile,
    pub uid: String,
}

#[derive(Debug)]
pub enum ResolveError
{
    ImportMetadataMissing
    {
        import_path: PathBuf,
    },
    ImportMetadataRead
    {
        import_path: PathBuf,
        error: io::Error,
    },
    IdentifierNotFound
    {
        import_path: PathBuf,
        preview: String, // the start of the sidecar, for diagnostics
    },
}
impl Error for ResolveError { }
impl Display for ResolveError
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result
    {
        match self
        {
            ResolveError::ImportMetadataMissing { import_path } =>
                write!(f, "Import file not found: {import_path:?} (has the model been imported by Godot?)"),
            ResolveError::ImportMetadataRead { import_path, error } =>
                write!(f, "Failed to read import file {import_path:?}: {error}"),
            ResolveError::IdentifierNotFound { import_path, .. } =>
                write!(f, "Could not find a uid=\"...\" assignment in {import_path:?}"),
        }
    }
}

// The `.import` sidecar lives next to the model, with `.import` appended to the full file name
pub fn import_path(model_dir: &Path, model: &ModelFile) -> PathBuf
{
    model_dir.join(format!("{}.import", model.file_name()))
}

pub fn resolve_model_reference(model_dir: &Path, model: &ModelFile) -> Result<ModelReference, ResolveError>
{
    let import_path = import_path(model_dir, model);
    log::debug!("Looking for import file {import_path:?}");

    let import_text = match std::fs::read_to_string(&import_path)
    {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound =>
        {
            return Err(ResolveError::ImportMetadataMissing { import_path });
        }
        Err(error) =>
        {
            return Err(ResolveError::ImportMetadataRead { import_path, error });
        }
    };

    match find_import_uid(&import_text)
    {
        Some(uid) =>
        {
            log::info!("Found UID for {model}: {uid}");
            Ok(ModelReference
            {
                model: model.clone(),
                uid: uid.to_string(),
            })
        }
        None => Err(ResolveError::IdentifierNotFound
        {
            import_path,
            preview: import_text.chars().take(PREVIEW_CHARS).collect(),
        }),
    }
}

// Find the model UID in the text of an `.import` file.
// The `[remap]` section is searched first, then the whole file.
pub fn find_import_uid(import_text: &str) -> Option<&str>
{
    remap_section(import_text)
        .and_then(first_uid)
        .or_else(|| first_uid(import_text))
}

fn first_uid(text: &str) -> Option<&str>
{
    UID_ASSIGNMENT.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

// The body of the `[remap]` section, up to the next section header or EOF
fn remap_section(text: &str) -> Option<&str>
{
    let mut offset = 0;
    let mut body_start = None;
    for line in text.split_inclusive('\n')
    {
        let trimmed = line.trim();
        match body_start
        {
            None if trimmed == REMAP_SECTION => { body_start = Some(offset + line.len()); }
            Some(start) if trimmed.starts_with('[') => { return Some(&text[start..offset]); }
            _ => { }
        }
        offset += line.len();
    }
    body_start.map(|start| &text[start..])
}

#[cfg(test)]
mod tests
{
    use super::*;

    const IMPORT_FILE: &str = r#"[remap]

importer="scene"
importer_version=1
type="PackedScene"
uid="uid://ABC"
path="res://.godot/imported/alien.fbx-0123.scn"

[deps]

source_file="res://Assets/character_model/alien.fbx"
dest_files=["res://.godot/imported/alien.fbx-0123.scn"]

[params]

nodes/root_type=""
_subresources={}
uid="uid://ZZZ"
"#;

    #[test]
    fn remap_section_takes_priority()
    {
        assert_eq!(Some("uid://ABC"), find_import_uid(IMPORT_FILE));

        let reordered = "[params]\nuid=\"uid://ZZZ\"\n\n[remap]\nuid=\"uid://ABC\"\n";
        assert_eq!(Some("uid://ABC"), find_import_uid(reordered));
    }

    #[test]
    fn falls_back_to_whole_file()
    {
        let no_remap = "[deps]\nsource_file=\"res://a.fbx\"\n\n[params]\nuid=\"uid://FALLBACK\"\n";
        assert_eq!(Some("uid://FALLBACK"), find_import_uid(no_remap));

        let remap_without_uid = "[remap]\nimporter=\"scene\"\n\n[params]\nuid=\"uid://LATER\"\n";
        assert_eq!(Some("uid://LATER"), find_import_uid(remap_without_uid));
    }

    #[test]
    fn no_uid()
    {
        assert_eq!(None, find_import_uid("[remap]\nimporter=\"scene\"\n"));
        assert_eq!(None, find_import_uid(""));
        assert_eq!(None, find_import_uid("importer_uid=\"uid://NOPE\"\n"));
    }

    #[test]
    fn crlf_sections()
    {
        let text = "[params]\r\nuid=\"uid://ZZZ\"\r\n[remap]\r\nuid=\"uid://ABC\"\r\n";
        assert_eq!(Some("uid://ABC"), find_import_uid(text));
    }

    #[test]
    fn resolve_from_disk()
    {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("alien.fbx.import"), IMPORT_FILE).unwrap();

        let with_ext = resolve_model_reference(dir.path(), &ModelFile::new("alien.fbx", "fbx")).unwrap();
        let without_ext = resolve_model_reference(dir.path(), &ModelFile::new("alien", "fbx")).unwrap();
        assert_eq!(with_ext, without_ext);
        assert_eq!("uid://ABC", with_ext.uid);
        assert_eq!("alien.fbx", with_ext.model.file_name());
    }

    #[test]
    fn missing_sidecar()
    {
        let dir = tempfile::tempdir().unwrap();
        let Err(ResolveError::ImportMetadataMissing { import_path }) =
            resolve_model_reference(dir.path(), &ModelFile::new("ghost", "fbx")) else { panic!("expected missing metadata"); };
        assert_eq!(dir.path().join("ghost.fbx.import"), import_path);
    }

    #[test]
    fn sidecar_without_uid()
    {
        let dir = tempfile::tempdir().unwrap();
        let contents = "[remap]\nimporter=\"scene\"\n";
        std::fs::write(dir.path().join("bare.fbx.import"), contents).unwrap();

        let Err(ResolveError::IdentifierNotFound { preview, .. }) =
            resolve_model_reference(dir.path(), &ModelFile::new("bare", "fbx")) else { panic!("expected no identifier"); };
        assert_eq!(contents, preview);
    }
}
