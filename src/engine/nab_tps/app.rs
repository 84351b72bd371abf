use std::fmt::Debug;
use std::panic::PanicHookInfo;
use std::process::ExitCode;
use std::sync::atomic::{AtomicI32, Ordering};

fn join_display<I>(separator: &str, iter: I) -> String
where I: Iterator,
      I::Item: std::fmt::Display
{
    let mut out = String::new();
    let mut first = true;
    for i in iter
    {
        match first
        {
            true => { first = false; }
            false => { out.push_str(separator); }
        };
        out.push_str(i.to_string().as_str());
    }
    out
}

pub trait CliArgs: clap::Parser + Debug { }
impl<T: clap::Parser + Debug> CliArgs for T { }

fn crate_name<T>() -> &'static str // hacky
{
    let name = std::any::type_name::<T>();
    name.split("::").next().unwrap_or(name)
}

// Modules logged at the verbose level, everything else only logs warnings
fn verbose_modules<TCliArgs>() -> [&'static str; 3]
{
    [crate_name::<TCliArgs>(), crate_name::<ExitReason>(), "godot_tps"]
}

#[derive(Debug)]
pub struct AppRun<TCliArgs: CliArgs>
{
    pub app_name: &'static str,
    pub version_str: &'static str,

    pub start_time: chrono::DateTime<chrono::Local>,
    pub args: TCliArgs,
    pub pid: u32,
    pub is_elevated: bool,

    exit_reason: AtomicI32,
}
impl<TCliArgs: CliArgs> AppRun<TCliArgs>
{
    pub fn startup(app_name: &'static str, app_version: &'static str) -> Self
    {
        #[cfg(debug_assertions)]
        let default_log_levels = (log::LevelFilter::Warn, log::LevelFilter::Debug);
        #[cfg(not(debug_assertions))]
        let default_log_levels = (log::LevelFilter::Warn, log::LevelFilter::Info);
        let mut log_builder = colog::basic_builder();
        log_builder.filter_level(default_log_levels.0);
        for module in verbose_modules::<TCliArgs>()
        {
            log_builder.filter_module(module, default_log_levels.1);
        }
        log_builder.parse_default_env().init();

        let app_run = Self
        {
            app_name,
            version_str: app_version,
            start_time: chrono::Local::now(),
            args: TCliArgs::parse(),
            pid: std::process::id(),
            is_elevated: is_root::is_root(),
            exit_reason: AtomicI32::new(ExitReason::NormalExit.code()),
        };

        log::info!(target: Self::log_target(),
            "=== Starting {} v{} [{}] (PID {}){} at {} ===",
            app_run.app_name,
            app_run.version_str,
            join_display(" ", std::env::args()),
            app_run.pid,
            if app_run.is_elevated { " elevated" } else { "" },
            app_run.start_time);

        app_run
    }

    fn log_target() -> &'static str { crate_name::<TCliArgs>() }

    pub fn set_exit_reason(&self, exit_reason: ExitReason)
    {
        self.exit_reason.store(exit_reason.code(), Ordering::SeqCst);
    }
    pub fn get_exit_reason(&self) -> ExitReason
    {
        ExitReason::from_code(self.exit_reason.load(Ordering::SeqCst))
    }
}
impl<TCliArgs: CliArgs> Drop for AppRun<TCliArgs>
{
    fn drop(&mut self)
    {
        log::info!(target: Self::log_target(),
            "Exiting {} (PID {}) at {} with reason {:?}",
            self.app_name,
            self.pid,
            chrono::Local::now(),
            self.get_exit_reason());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason
{
    NormalExit,
    // A handled error, carrying the error's process exit code
    Error(u16),
    Panic,
}
impl ExitReason
{
    const PANIC_CODE: i32 = 99;

    pub fn code(self) -> i32
    {
        match self
        {
            ExitReason::NormalExit => 0,
            ExitReason::Error(code) => code as i32,
            ExitReason::Panic => Self::PANIC_CODE,
        }
    }

    fn from_code(code: i32) -> Self
    {
        match code
        {
            0 => ExitReason::NormalExit,
            Self::PANIC_CODE => ExitReason::Panic,
            c => ExitReason::Error(c as u16),
        }
    }
}
impl std::process::Termination for ExitReason
{
    fn report(self) -> ExitCode
    {
        (self.code() as u8).into()
    }
}

pub trait FatalErrorCode: Debug
{
    fn error_code(&self) -> u16;
}

#[derive(Clone, Copy)]
struct Panic<'p>(&'p PanicHookInfo<'p>);
impl FatalErrorCode for Panic<'_> { fn error_code(&self) -> u16 { 1u16 } }
impl Debug for Panic<'_>
{
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result
    {
        if let Some(payload_str) = self.0.payload().downcast_ref::<&str>()
        {
            f.write_fmt(format_args!("{payload_str}\n"))?;
        }
        else if let Some(payload_str) = self.0.payload().downcast_ref::<String>()
        {
            f.write_fmt(format_args!("{payload_str}\n"))?;
        }

        if let Some(location) = self.0.location()
        {
            Debug::fmt(&location, f)?
        }

        Ok(())
    }
}

pub fn set_panic_hook()
{
    let default_panic_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic|
    {
        default_panic_hook(panic);
        fatal_error(FatalError::Panic, Panic(panic))
    }));
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FatalError
{
    Panic,
}
impl FatalError
{
    pub fn short_name(self) -> &'static str
    {
        match self
        {
            FatalError::Panic => "PNC",
        }
    }
}

// Exit the process with a fatal error
pub fn fatal_error(fatal_error: FatalError, code: impl FatalErrorCode) -> !
{
    let mut error_msg = format!("{}-{:04X}", fatal_error.short_name(), code.error_code());
    if cfg!(debug_assertions)
    {
        error_msg.push_str(&format!("\n\n{:#?}", &code));
    }

    eprintln!("!!! FATAL: {}", error_msg);

    eprintln!("Exiting (PID {}) at {} with reason {:?}",
              std::process::id(),
              chrono::Local::now(),
              ExitReason::Panic);

    std::process::exit(ExitReason::Panic.code())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn exit_reason_codes()
    {
        for reason in [ExitReason::NormalExit, ExitReason::Error(7), ExitReason::Panic]
        {
            assert_eq!(reason, ExitReason::from_code(reason.code()));
        }
        assert_eq!(0, ExitReason::NormalExit.code());
        assert_ne!(0, ExitReason::Error(1).code());
    }

    #[test]
    fn exit_reason_terminates_with_its_code()
    {
        use std::process::Termination;
        assert_eq!(ExitCode::SUCCESS, ExitReason::NormalExit.report());
        assert_eq!(ExitCode::from(7), ExitReason::Error(7).report());
        assert_eq!(ExitCode::from(99), ExitReason::Panic.report());
    }

    #[derive(clap::Parser, Debug)]
    struct TestArgs { }

    #[test]
    fn app_log_target_is_verbose()
    {
        let target = AppRun::<TestArgs>::log_target();
        assert_eq!("nab_tps", target);
        assert!(verbose_modules::<TestArgs>().contains(&target));
        assert!(verbose_modules::<TestArgs>().contains(&"godot_tps"));
    }

    #[test]
    fn join()
    {
        assert_eq!("", join_display(" ", std::iter::empty::<&str>()));
        assert_eq!("a", join_display(" ", ["a"].iter()));
        assert_eq!("a b 3", join_display(" ", ["a".to_string(), "b".to_string(), 3.to_string()].iter()));
    }

    #[test]
    fn crate_names()
    {
        assert_eq!("nab_tps", crate_name::<ExitReason>());
        assert_eq!("alloc", crate_name::<String>());
    }
}
