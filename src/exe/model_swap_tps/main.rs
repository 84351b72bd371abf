use clap::{CommandFactory, Parser};
use godot_tps::config::SwapConfig;
use godot_tps::export::ExportMode;
use godot_tps::model_swap::{ModelSwap, SwapError, SwapReport, SwapRequest};
use nab_tps::app::{set_panic_hook, AppRun, ExitReason, FatalErrorCode};
use std::fmt::Write;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(about = "Point the character scene at a different model and export a build of the game")]
#[command(after_help = "Examples:\n  model_swap alien_soldier\n  model_swap alien_soldier.fbx alien_v1\n  model_swap universal_char_model --skip-build")]
struct CliArgs
{
    #[arg(help = "Model file in the model directory (the extension is optional)")]
    model_name: Option<String>,

    #[arg(help = "Suffix of the build output name [default: the model name without its extension]")]
    build_suffix: Option<String>,

    #[arg(long, help = "Config file [default: ./model_swap.toml, then the user config dir]")]
    config: Option<PathBuf>,

    #[arg(long)]
    project_root: Option<PathBuf>,

    #[arg(long, help = "Path to the Godot editor executable")]
    godot: Option<PathBuf>,

    #[arg(long)]
    build_dir: Option<PathBuf>,

    #[arg(long, help = "Export preset name")]
    preset: Option<String>,

    #[arg(long)]
    mode: Option<ExportMode>,

    #[arg(long, help = "Resolve and patch in memory only; write and build nothing")]
    dry_run: bool,

    #[arg(long, help = "Patch the scene but don't export")]
    skip_build: bool,
}
impl CliArgs
{
    fn apply_overrides(&self, config: &mut SwapConfig)
    {
        if let Some(project_root) = &self.project_root { config.project_root = project_root.clone(); }
        if let Some(godot) = &self.godot { config.godot_exe = godot.clone(); }
        if let Some(build_dir) = &self.build_dir { config.build_dir = build_dir.clone(); }
        if let Some(preset) = &self.preset { config.export_preset = preset.clone(); }
        if let Some(mode) = self.mode { config.export_mode = mode; }
    }
}

fn run(args: &CliArgs) -> Result<SwapReport, SwapError>
{
    let Some(model_name) = &args.model_name else
    {
        let _ = CliArgs::command().print_help();
        return Err(SwapError::MissingArgument);
    };

    let mut config = SwapConfig::locate(args.config.as_deref())?;
    args.apply_overrides(&mut config);
    log::debug!("{config:#?}");

    let swap = ModelSwap::new(config)?;
    swap.run(&SwapRequest
    {
        model_name: model_name.clone(),
        build_suffix: args.build_suffix.clone(),
        dry_run: args.dry_run,
        skip_build: args.skip_build,
    })
}

fn report_text(report: &SwapReport) -> String
{
    let mut text = String::new();
    let _ = writeln!(text, "Model:        {} ({})", report.model.model, report.model.uid);
    let _ = writeln!(text, "Scene file:   {}", report.scene_path.display());
    if let Some(backup) = &report.backup_path
    {
        let _ = writeln!(text, "Backup:       {}", backup.display());
    }
    let _ = writeln!(text, "Reference:    {}", report.replaced);
    let _ = writeln!(text, "Cleaned up:   {} bone override(s), armature transform {}",
        report.removed_bone_overrides,
        if report.removed_armature_transform { "removed" } else { "untouched" });

    let _ = writeln!(text, "Game build:   {}", report.build_output.as_ref().map_or("skipped".to_string(), |b| b.display().to_string()));
    let _ = writeln!(text, "\nNext steps:");
    match &report.build_output
    {
        Some(output) => { let _ = writeln!(text, "  1. Test the game by running {}", output.display()); }
        None => { let _ = writeln!(text, "  1. Export a build (rerun without --skip-build/--dry-run) and run it"); }
    }
    let _ = writeln!(text, "  2. If the character is still invisible, open {} in the Godot editor:", report.scene_path.display());
    let _ = writeln!(text, "     - check that the model is visible in the 3D viewport");
    let _ = writeln!(text, "     - check the Materials tab for missing textures");
    text
}

fn main() -> ExitReason
{
    let app_run = AppRun::<CliArgs>::startup("Model Swap", env!("CARGO_PKG_VERSION"));
    set_panic_hook();

    let reason = match run(&app_run.args)
    {
        Ok(report) =>
        {
            print!("{}", report_text(&report));
            ExitReason::NormalExit
        }
        Err(err) =>
        {
            if let SwapError::IdentifierNotFound(godot_tps::import_uid::ResolveError::IdentifierNotFound { preview, .. }) = &err
            {
                log::error!("Import file contents preview:\n{preview}");
            }
            log::error!("{err}");
            ExitReason::Error(err.error_code())
        }
    };

    app_run.set_exit_reason(reason);
    reason
}

#[cfg(test)]
mod tests
{
    use super::*;
    use godot_tps::import_uid::ModelReference;
    use godot_tps::scene_patch::ExtReference;
    use godot_tps::ModelFile;

    #[test]
    fn cli_shape()
    {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn positional_args()
    {
        let args = CliArgs::try_parse_from(["model_swap", "alien_soldier.fbx", "alien_v1"]).unwrap();
        assert_eq!(Some("alien_soldier.fbx".to_string()), args.model_name);
        assert_eq!(Some("alien_v1".to_string()), args.build_suffix);
        assert!(!args.dry_run);

        let args = CliArgs::try_parse_from(["model_swap"]).unwrap();
        assert_eq!(None, args.model_name);
    }

    #[test]
    fn missing_model_name()
    {
        let args = CliArgs::try_parse_from(["model_swap"]).unwrap();
        let Err(SwapError::MissingArgument) = run(&args) else { panic!("expected a missing argument"); };
    }

    #[test]
    fn overrides()
    {
        let args = CliArgs::try_parse_from([
            "model_swap", "alien",
            "--project-root", "/games/tps-1",
            "--godot", "/opt/godot",
            "--preset", "Linux/X11",
            "--mode", "debug",
        ]).unwrap();

        let mut config = SwapConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(PathBuf::from("/games/tps-1"), config.project_root);
        assert_eq!(PathBuf::from("/opt/godot"), config.godot_exe);
        assert_eq!("Linux/X11", config.export_preset);
        assert_eq!(ExportMode::Debug, config.export_mode);
        assert_eq!(SwapConfig::default().build_dir, config.build_dir);
    }

    fn report(build_output: Option<PathBuf>) -> SwapReport
    {
        let previous = ExtReference
        {
            uid: Some("uid://OLD".to_string()),
            path: "res://Assets/character_model/old.fbx".to_string(),
            id: "2_x".to_string(),
        };
        SwapReport
        {
            model: ModelReference { model: ModelFile::new("alien", "fbx"), uid: "uid://NEW".to_string() },
            build_suffix: "alien".to_string(),
            scene_path: PathBuf::from("Assets/character_model/character_model.tscn"),
            backup_path: None,
            replaced: ExtReference { uid: Some("uid://NEW".to_string()), path: "res://Assets/character_model/alien.fbx".to_string(), ..previous.clone() },
            previous,
            removed_bone_overrides: 2,
            removed_armature_transform: true,
            build_output,
        }
    }

    #[test]
    fn report_ends_with_next_steps()
    {
        let built = report_text(&report(Some(PathBuf::from("build/game-alien.exe"))));
        assert!(built.contains("Game build:   build/game-alien.exe"));
        assert!(built.contains("Next steps:"));
        assert!(built.contains("Test the game by running build/game-alien.exe"));
        assert!(built.contains("Materials tab"));

        let skipped = report_text(&report(None));
        assert!(skipped.contains("Game build:   skipped"));
        assert!(skipped.contains("Next steps:"));
        assert!(!skipped.contains("Test the game by running"));
    }
}
