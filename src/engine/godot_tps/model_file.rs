use std::fmt::{Display, Formatter};
use std::path::Path;
use unicase::UniCase;

// A model file name that always carries the model extension
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelFile
{
    file_name: String,
    stem_len: usize,
}
impl ModelFile
{
    // Normalize `name` so that it ends with `.{extension}` (compared case-insensitively)
    pub fn new(name: &str, extension: &str) -> Self
    {
        let extension = extension.trim_start_matches('.');
        match Self::strip_extension(name, extension)
        {
            Some(stem) => Self
            {
                file_name: name.to_string(),
                stem_len: stem.len(),
            },
            None => Self
            {
                file_name: format!("{name}.{extension}"),
                stem_len: name.len(),
            },
        }
    }

    #[inline] #[must_use]
    pub fn file_name(&self) -> &str { &self.file_name }

    // The file name without the model extension
    #[inline] #[must_use]
    pub fn stem(&self) -> &str { &self.file_name[..self.stem_len] }

    pub fn has_extension(path: &Path, extension: &str) -> bool
    {
        let extension = extension.trim_start_matches('.');
        path.extension().is_some_and(|ext| match ext.to_str()
        {
            None => false,
            Some(e) => UniCase::new(e) == UniCase::new(extension),
        })
    }

    fn strip_extension<'n>(name: &'n str, extension: &str) -> Option<&'n str>
    {
        let (stem, ext) = name.rsplit_once('.')?;
        (UniCase::new(ext) == UniCase::new(extension)).then_some(stem)
    }
}
impl Display for ModelFile
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(&self.file_name) }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn appends_missing_extension()
    {
        let model = ModelFile::new("alien_soldier", "fbx");
        assert_eq!("alien_soldier.fbx", model.file_name());
        assert_eq!("alien_soldier", model.stem());
    }

    #[test]
    fn keeps_existing_extension()
    {
        let model = ModelFile::new("alien_soldier.FBX", "fbx");
        assert_eq!("alien_soldier.FBX", model.file_name());
        assert_eq!("alien_soldier", model.stem());
    }

    #[test]
    fn normalization_is_idempotent()
    {
        for name in ["x", "x.fbx", "x.Fbx", "x.glb", "a.b.c", ".fbx", "x."]
        {
            let once = ModelFile::new(name, "fbx");
            let twice = ModelFile::new(once.file_name(), "fbx");
            assert_eq!(once, twice, "{name}");
        }
    }

    #[test]
    fn other_extensions_are_kept_in_the_stem()
    {
        let model = ModelFile::new("char.glb", ".fbx");
        assert_eq!("char.glb.fbx", model.file_name());
        assert_eq!("char.glb", model.stem());
    }

    #[test]
    fn path_extension()
    {
        assert!(ModelFile::has_extension(Path::new("dir/a.fbx"), "fbx"));
        assert!(ModelFile::has_extension(Path::new("dir/a.FBX"), ".fbx"));
        assert!(!ModelFile::has_extension(Path::new("dir/a.fbx.import"), "fbx"));
        assert!(!ModelFile::has_extension(Path::new("dir/fbx"), "fbx"));
    }
}
