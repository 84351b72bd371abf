use serde::de::DeserializeOwned;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::fs::File;
use std::io;
use std::io::Read;
use std::path::Path;

#[derive(Debug)]
pub enum TomlReadError
{
    IOError(io::Error),
    ParseError(toml::de::Error),
}
impl Error for TomlReadError
{
    fn source(&self) -> Option<&(dyn Error + 'static)>
    {
        match self
        {
            TomlReadError::IOError(err) => Some(err),
            TomlReadError::ParseError(err) => Some(err),
        }
    }
}
impl Display for TomlReadError
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result
    {
        match self
        {
            TomlReadError::IOError(err) => write!(f, "failed to read TOML: {err}"),
            TomlReadError::ParseError(err) => write!(f, "failed to parse TOML: {err}"),
        }
    }
}

pub trait TomlRead: DeserializeOwned
{
    fn load(reader: &mut impl Read) -> Result<Self, TomlReadError>
    {
        let mut buf = String::new();
        reader.read_to_string(&mut buf).map_err(TomlReadError::IOError)?;
        toml::from_str(&buf).map_err(TomlReadError::ParseError)
    }

    fn load_file(path: impl AsRef<Path>) -> Result<Self, TomlReadError>
    {
        let mut fin = File::open(path).map_err(TomlReadError::IOError)?;
        Self::load(&mut fin)
    }
}
