use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, CommandFactory, Parser};
use netinst_remaster::config::{ConfigError, RawConfig};
use netinst_remaster::{pipeline, FailureKind, PipelineConfig};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Remaster a netinstall ISO with guest tooling and a kickstart file.
#[derive(Debug, Parser)]
#[command(name = "netinst-remaster", disable_help_flag = true)]
struct Cli {
    /// Base URL to fetch the ISO and checksum manifest from
    #[arg(long, value_name = "URL")]
    mirror: Option<String>,

    /// ISO file name on the mirror
    #[arg(long, value_name = "NAME")]
    iso: Option<String>,

    /// Checksum manifest file name on the mirror
    #[arg(long, value_name = "NAME")]
    checksum: Option<String>,

    /// Absolute path of the local download cache
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<String>,

    /// Absolute path used as the transient mount target
    #[arg(long, value_name = "DIR")]
    mount_point: Option<String>,

    /// Absolute path of the extracted and overlaid filesystem tree
    #[arg(long, value_name = "DIR")]
    layout_dir: Option<String>,

    /// File name for the produced ISO
    #[arg(long, value_name = "FILE")]
    output: Option<String>,

    /// Kickstart file copied to the ISO root [default: ks.cfg]
    #[arg(long, value_name = "FILE")]
    kickstart: Option<String>,

    /// Boot menu copied over isolinux/isolinux.cfg [default: isolinux.cfg]
    #[arg(long, value_name = "FILE")]
    boot_menu: Option<String>,

    /// Guest tooling directory copied into the ISO [default: guest-tools]
    #[arg(long, value_name = "DIR")]
    guest_tools: Option<String>,

    /// Volume label of the produced ISO [default: "CentOS 7 x86_64"]
    #[arg(long, value_name = "LABEL")]
    volume_label: Option<String>,

    /// TOML file with defaults for any of the above
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Do not require root (for hosts that grant mount rights otherwise)
    #[arg(long)]
    skip_root_check: bool,

    /// Log debug output, including every external command
    #[arg(short, long)]
    verbose: bool,

    /// Print usage and exit
    #[arg(short, long, action = ArgAction::SetTrue)]
    help: bool,
}

impl Cli {
    fn into_raw(self) -> (Option<PathBuf>, RawConfig) {
        let raw = RawConfig {
            mirror: self.mirror,
            iso: self.iso,
            checksum: self.checksum,
            cache_dir: self.cache_dir,
            mount_point: self.mount_point,
            layout_dir: self.layout_dir,
            output: self.output,
            kickstart: self.kickstart,
            boot_menu: self.boot_menu,
            guest_tools: self.guest_tools,
            volume_label: self.volume_label,
            require_root: self.skip_root_check.then_some(false),
            ..RawConfig::default()
        };
        (self.config, raw)
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve(config_file: Option<PathBuf>, flags: RawConfig) -> Result<PipelineConfig, ConfigError> {
    let base = match config_file {
        Some(path) => RawConfig::load(&path)?,
        None => RawConfig::default(),
    };
    let cwd = std::env::current_dir().map_err(ConfigError::CurrentDir)?;
    base.merge(flags).resolve(&cwd)
}

fn main() -> ExitCode {
    let usage_exit = ExitCode::from(FailureKind::Configuration.exit_code());

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return usage_exit;
        }
    };
    if cli.help {
        eprintln!("{}", Cli::command().render_help());
        return usage_exit;
    }

    init_logging(cli.verbose);

    let (config_file, flags) = cli.into_raw();
    let config = match resolve(config_file, flags) {
        Ok(config) => config,
        Err(e) => {
            let hint = match &e {
                ConfigError::Missing(param) => Some(param.flag()),
                _ => None,
            };
            eprintln!("{:#}", anyhow::Error::new(e));
            if let Some(flag) = hint {
                eprintln!("  pass {flag} or set it in the --config file");
            }
            return usage_exit;
        }
    };

    match pipeline::run(&config) {
        Ok(report) => {
            println!(
                "ISO at {} (sha256 {})",
                report.output.path.display(),
                report.output.sha256
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            let kind = FailureKind::of(&err);
            error!(kind = ?kind, "run aborted");
            eprintln!("error: {err:#}");
            ExitCode::from(kind.map_or(1, FailureKind::exit_code))
        }
    }
}
