use mvs_setup::{
    cli::console,
    install::{profile, test_script},
    Config, DevExecutor, DevMode, Doctor, Executor, InstallOptions, Installer, Layout, Step,
    SystemExecutor, TargetUser,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mvs-setup")]
#[command(about = "Install and wire up the MVS industrial camera SDK")]
struct Cli {
    /// Enable development mode (stages everything under ./dev_data/root)
    #[arg(long, global = true)]
    dev: bool,

    /// Config file (default: /etc/mvs-setup/setup.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Stage the install under this directory instead of /
    #[arg(long, global = true, conflicts_with = "dev")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the SDK package and configure the environment
    Install {
        /// SDK .deb package (default: newest MvCamCtrlSDK*.deb in the current directory)
        package: Option<PathBuf>,
        /// Python virtual environment to configure
        #[arg(long)]
        venv: Option<PathBuf>,
        /// User whose profile receives the environment (default: SUDO_USER)
        #[arg(short, long)]
        user: Option<String>,
        /// Skip a step (repeatable)
        #[arg(long, value_enum)]
        skip: Vec<Step>,
    },
    /// Check that the SDK environment is usable
    Check {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the SDK smoke-test script
    TestScript {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the environment block for eval or manual setup
    PrintEnv,
}

fn main() {
    let cli = Cli::parse();

    setup_logging(cli.dev);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            console::error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let config = Config::load(cli.config.as_deref())?;

    // Create dev mode context
    let dev_mode = DevMode::new(cli.dev)?;
    if dev_mode.is_enabled() {
        console::info("Dev mode: apt-get, dpkg, ldconfig, setcap and udevadm are only logged");
    }
    let root = cli.root.clone().unwrap_or_else(|| dev_mode.root_dir());
    let layout = Layout::new(root.clone(), &config);

    let system_exec = SystemExecutor;
    let dev_exec = DevExecutor::default();
    let exec: &dyn Executor = if layout.is_staged() { &dev_exec } else { &system_exec };

    match cli.command {
        Commands::Install { package, venv, user, skip } => {
            console::rule();
            console::info("MVS camera SDK installation");
            console::rule();

            let options = InstallOptions {
                package,
                search_dir: std::env::current_dir()?,
                venv: venv.or_else(|| std::env::var_os("VIRTUAL_ENV").map(PathBuf::from)),
                user,
                skip,
                euid: mvs_setup::system::effective_uid(),
            };

            let summary = Installer::new(&config, layout, exec, options).run()?;

            console::rule();
            console::ok(&format!(
                "Installed {} ({} steps, {} skipped)",
                summary.package.display(),
                summary.completed.len(),
                summary.skipped.len()
            ));
            for interpreter in &summary.interpreters {
                println!("   raw sockets enabled for {}", interpreter.display());
            }
            println!("\n🔧 Next steps:");
            println!(
                "   1. Log out and back in (or: source {})",
                config.environment.profile_script.display()
            );
            println!("   2. Replug USB cameras so the udev rule applies");
            match &summary.test_script {
                Some(script) => println!("   3. Run: python3 {}", script.display()),
                None => println!("   3. Run: mvs-setup check"),
            }
            Ok(0)
        }
        Commands::Check { json } => {
            let env = std::env::vars().collect();
            let report = Doctor::new(&config, root, exec, env).run();

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                report.print();
            }
            Ok(if report.has_failures() { 1 } else { 0 })
        }
        Commands::TestScript { output } => {
            let path = match output {
                Some(path) => path,
                None => {
                    let user = TargetUser::resolve(&layout, None)?;
                    layout.resolve(&user.home.join(&config.test_script.file_name))
                }
            };
            test_script::write(&layout, &path)?;
            console::ok(&format!("Test script written to {}", path.display()));
            Ok(0)
        }
        Commands::PrintEnv => {
            print!("{}", profile::render_block(&layout));
            Ok(0)
        }
    }
}

fn setup_logging(dev_mode: bool) {
    if dev_mode {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .init();
    }
}
