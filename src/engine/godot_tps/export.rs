use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode
{
    #[default]
    Release,
    Debug,
}
impl ExportMode
{
    pub fn flag(self) -> &'static str
    {
        match self
        {
            ExportMode::Release => "--export-release",
            ExportMode::Debug => "--export-debug",
        }
    }
}

#[derive(Debug)]
pub enum ExportError
{
    OutputDir
    {
        dir: PathBuf,
        error: io::Error,
    },
    Launch
    {
        godot_exe: PathBuf,
        error: io::Error,
    },
    Failed
    {
        status: ExitStatus,
        stderr: String,
    },
}
impl Error for ExportError { }
impl Display for ExportError
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result
    {
        match self
        {
            ExportError::OutputDir { dir, error } => write!(f, "Failed to create the build directory {dir:?}: {error}"),
            ExportError::Launch { godot_exe, error } => write!(f, "Failed to launch {godot_exe:?}: {error}"),
            ExportError::Failed { status, stderr } => write!(f, "Export failed ({status}):\n{stderr}"),
        }
    }
}

#[derive(Debug)]
pub struct ExportOutput
{
    pub output_path: PathBuf,
    pub stderr: String, // godot reports warnings here even on success
}

// Runs Godot headless to export a project through one of its export presets
#[derive(Debug, Clone)]
pub struct GodotExporter
{
    godot_exe: PathBuf,
    mode: ExportMode,
}
impl GodotExporter
{
    pub fn new(godot_exe: impl AsRef<Path>, mode: ExportMode) -> Self
    {
        Self
        {
            godot_exe: godot_exe.as_ref().to_path_buf(),
            mode,
        }
    }

    pub fn command(&self, project_path: &Path, preset: &str, output_path: &Path) -> Command
    {
        let mut cmd = Command::new(&self.godot_exe);
        cmd.arg("--headless")
            .arg("--path")
            .arg(project_path)
            .arg(self.mode.flag())
            .arg(preset)
            .arg(output_path);
        cmd
    }

    // Blocks until godot exits. Not retried on failure.
    pub fn export(&self, project_path: &Path, preset: &str, output_path: &Path) -> Result<ExportOutput, ExportError>
    {
        if let Some(dir) = output_path.parent().filter(|p| !p.as_os_str().is_empty())
        {
            std::fs::create_dir_all(dir).map_err(|error| ExportError::OutputDir
            {
                dir: dir.to_path_buf(),
                error,
            })?;
        }

        let mut cmd = self.command(project_path, preset, output_path);
        log::info!("Exporting {preset:?} to {output_path:?}");
        log::debug!("Running {cmd:?}");

        let output = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|error| ExportError::Launch
            {
                godot_exe: self.godot_exe.clone(),
                error,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success()
        {
            return Err(ExportError::Failed { status: output.status, stderr });
        }

        log::info!("Export successful: {output_path:?}");
        Ok(ExportOutput
        {
            output_path: output_path.to_path_buf(),
            stderr,
        })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn command_line()
    {
        let exporter = GodotExporter::new("godot", ExportMode::Release);
        let cmd = exporter.command(Path::new("proj"), "Windows Desktop", Path::new("out/game-x.exe"));
        assert_eq!(OsStr::new("godot"), cmd.get_program());
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(vec![
            OsStr::new("--headless"),
            OsStr::new("--path"),
            OsStr::new("proj"),
            OsStr::new("--export-release"),
            OsStr::new("Windows Desktop"),
            OsStr::new("out/game-x.exe"),
        ], args);
    }

    #[test]
    fn debug_mode()
    {
        let exporter = GodotExporter::new("godot", ExportMode::Debug);
        let cmd = exporter.command(Path::new("proj"), "Linux", Path::new("game"));
        assert!(cmd.get_args().any(|a| a == "--export-debug"));
        assert!(!cmd.get_args().any(|a| a == "--export-release"));
    }

    #[test]
    fn mode_from_toml()
    {
        #[derive(Deserialize)]
        struct Wrapper { mode: ExportMode }
        let wrapper: Wrapper = toml::from_str("mode = \"debug\"").unwrap();
        assert_eq!(ExportMode::Debug, wrapper.mode);
    }

    #[test]
    fn launch_failure()
    {
        let dir = tempfile::tempdir().unwrap();
        let exporter = GodotExporter::new(dir.path().join("no-such-godot"), ExportMode::Release);
        let Err(ExportError::Launch { .. }) = exporter.export(dir.path(), "Preset", &dir.path().join("build/game.exe"))
            else { panic!("expected a launch failure"); };
        assert!(dir.path().join("build").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn toolchain_success()
    {
        let dir = tempfile::tempdir().unwrap();
        let output_path = dir.path().join("build/game-x.exe");
        let exporter = GodotExporter::new("true", ExportMode::Release);
        let output = exporter.export(dir.path(), "Preset", &output_path).unwrap();
        assert_eq!(output_path, output.output_path);
    }

    #[cfg(unix)]
    #[test]
    fn toolchain_failure()
    {
        let dir = tempfile::tempdir().unwrap();
        let exporter = GodotExporter::new("false", ExportMode::Release);
        let Err(ExportError::Failed { status, .. }) = exporter.export(dir.path(), "Preset", &dir.path().join("game.exe"))
            else { panic!("expected a failed export"); };
        assert!(!status.success());
    }

    #[cfg(unix)]
    #[test]
    fn toolchain_stderr_is_captured()
    {
        // sh rejects the godot flags and complains on stderr
        let dir = tempfile::tempdir().unwrap();
        let exporter = GodotExporter::new("sh", ExportMode::Release);
        let Err(ExportError::Failed { status, stderr }) = exporter.export(dir.path(), "Nope", &dir.path().join("game.exe"))
            else { panic!("expected a failed export"); };
        assert!(!status.success());
        assert!(!stderr.trim().is_empty());
    }
}
