use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use portal::client::api::{KeygenClient, LicensingApi};
use portal::client::responses::format_date;
use portal::config::PortalConfig;
use portal::device::DeviceInfo;
use portal::errors::{PortalError, PortalResult};
use portal::fingerprint::FingerprintStore;
use portal::logging::init_logging;
use portal::portal::Portal;
use portal::view::PortalView;

/// Terminal license activation portal.
#[derive(Debug, Parser)]
#[command(name = "keygen-portal", version, about)]
struct Cli {
    /// Configuration file (defaults to ./portal.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// License key to validate on startup
    #[arg(long)]
    key: Option<String>,

    /// Name to register this device under when activating
    #[arg(long)]
    device_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Key(String),
    Validate,
    Activate,
    Deactivate(String),
    Machines,
    Clear(usize),
    Logout,
    Help,
    Quit,
}

const HELP: &str = "\
Commands:
  key <KEY>         set the license key
  validate          validate the key for this device
  activate          activate this device
  deactivate <ID>   deactivate a machine (full or short id)
  machines          refresh the machine list
  clear <N>         dismiss error number N
  logout            forget the key and license
  help              show this help
  quit              exit";

fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let Some(name) = parts.next() else {
        return Err("empty command".to_string());
    };
    let arg = parts.next();

    match (name.to_lowercase().as_str(), arg) {
        ("key", Some(key)) => Ok(Command::Key(key.to_string())),
        ("validate" | "continue", None) => Ok(Command::Validate),
        ("activate", None) => Ok(Command::Activate),
        ("deactivate", Some(id)) => Ok(Command::Deactivate(id.to_string())),
        ("machines", None) => Ok(Command::Machines),
        ("clear", Some(n)) => n
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .map(Command::Clear)
            .ok_or_else(|| format!("'{n}' is not an error number")),
        ("logout", None) => Ok(Command::Logout),
        ("help", None) => Ok(Command::Help),
        ("quit" | "exit", None) => Ok(Command::Quit),
        (other, _) => Err(format!("unknown command or arguments: '{other}'")),
    }
}

/// Resolve a full or short (prefix) machine id against the current list.
fn resolve_machine_id<A: LicensingApi>(session: &Portal<A>, id: &str) -> String {
    session
        .machines()
        .iter()
        .find(|m| m.id == id || m.short_id() == id)
        .map(|m| m.id.clone())
        .unwrap_or_else(|| id.to_string())
}

fn report(result: PortalResult<()>) {
    if let Err(e) = result {
        eprintln!("{e}");
    }
}

async fn execute<A: LicensingApi>(
    session: &mut Portal<A>,
    device: &DeviceInfo,
    command: Command,
) -> PortalResult<()> {
    match command {
        Command::Key(key) => {
            session.set_key(key);
            Ok(())
        }
        Command::Validate => session.validate_key_with_fingerprint().await,
        Command::Activate => session.activate_machine(device).await,
        Command::Deactivate(id) => {
            let id = resolve_machine_id(session, &id);
            session.deactivate_machine(&id).await
        }
        Command::Machines => session.list_machines().await,
        Command::Clear(n) => {
            if let Some(id) = session.errors().get(n - 1).map(|e| e.id) {
                session.clear_error(id);
            }
            Ok(())
        }
        Command::Logout => {
            session.reset();
            Ok(())
        }
        Command::Help | Command::Quit => Ok(()),
    }
}

fn render_errors<A: LicensingApi>(session: &Portal<A>) {
    println!("== Licensing API: an error has occurred ==");
    for (i, raised) in session.errors().iter().enumerate() {
        let entry = &raised.entry;
        let code = entry.code.as_deref().unwrap_or("N/A");
        let pointer = entry.pointer().map(|p| format!("{p} ")).unwrap_or_default();
        let detail = entry.detail.as_deref().unwrap_or("");
        println!("  [{}] {} ({}) {}{}", i + 1, entry.title, code, pointer, detail);
    }
}

fn render_license_info<A: LicensingApi>(session: &Portal<A>) {
    let license = session.license();
    let validation = session.validation();

    let name = license
        .and_then(|l| l.attributes.name.as_deref())
        .unwrap_or("License key");
    let key = license.map(|l| l.key()).unwrap_or("N/A");
    let tag = if validation.map(|v| v.valid).unwrap_or(false) {
        "Valid"
    } else {
        "Invalid"
    };
    let seats = license
        .map(|l| l.seats_label(session.machines().len()))
        .unwrap_or_else(|| format!("{}/0", session.machines().len()));

    println!("== {name} ==");
    println!("  {key} [{tag}]");
    println!(
        "  Issued on: {}  Valid until: {}  Seats: {}  Code: {}",
        format_date(license.and_then(|l| l.attributes.created.as_ref())),
        format_date(license.and_then(|l| l.attributes.expiry.as_ref())),
        seats,
        validation.map(|v| v.code.as_str()).unwrap_or(""),
    );
}

fn render_activator<A: LicensingApi>(session: &Portal<A>, device: &DeviceInfo) {
    println!("== Activate device: your device has not been activated ==");
    println!("  Device name: {}", device.name);
    println!("  Fingerprint: {}", session.fingerprint());
    println!("  Client:      {} {}", device.browser, device.version);
    println!("  Run 'activate' to activate this device.");
}

fn render_manager<A: LicensingApi>(session: &Portal<A>) {
    let machines = session.machines();
    let max = session.license().map(|l| l.max_machines()).unwrap_or(0);

    println!("== Manage devices: using {} of {} seats ==", machines.len(), max);
    println!(
        "  The current device {} activated. Deactivate devices to free up seats.",
        if session.is_current_device_activated() {
            "is"
        } else {
            "is not"
        }
    );
    for machine in machines {
        let current = if machine.fingerprint() == session.fingerprint().as_str() {
            " (current)"
        } else {
            ""
        };
        println!(
            "  {}  {}{}  {}  {}",
            machine.short_id(),
            machine.attributes.name.as_deref().unwrap_or("Unnamed"),
            current,
            machine.browser_label().unwrap_or_default(),
            format_date(machine.attributes.created.as_ref()),
        );
    }
}

fn render<A: LicensingApi>(session: &Portal<A>, device: &DeviceInfo) {
    let view = session.view();

    if view.shows_errors() {
        render_errors(session);
    }
    if view == PortalView::KeyEntry {
        println!("== License portal: please enter a license key ==");
        println!("  key XXXXXX-XXXXXX-XXXXXX-XXXXXX-XXXXXX-V3, then 'validate'");
    }
    if view.shows_license_info() {
        render_license_info(session);
    }
    if view.shows_activation() {
        render_activator(session, device);
    }
    if view.shows_manager() {
        render_manager(session);
    }
}

async fn run(cli: Cli) -> PortalResult<()> {
    let config = PortalConfig::load_from(cli.config.as_deref(), |name| std::env::var(name).ok())?;
    init_logging(&config.logging);

    let store = match &config.storage.data_dir {
        Some(dir) => FingerprintStore::new(dir),
        None => FingerprintStore::default_location()?,
    };
    let fingerprint = store.load_or_create().await?;

    let mut device = DeviceInfo::detect();
    if let Some(name) = cli.device_name {
        device = device.with_name(name);
    }

    let client = KeygenClient::new(&config.api)?;
    tracing::info!(account = %client.account_id(), fingerprint = %fingerprint, "Portal session started");
    let mut session = Portal::new(client, fingerprint);

    if let Some(key) = cli.key {
        session.set_key(key);
        report(session.validate_key_with_fingerprint().await);
    }
    render(&session, &device);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("failed to read input: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Ok(Command::Quit) => break,
            Ok(Command::Help) => println!("{HELP}"),
            Ok(command) => {
                report(execute(&mut session, &device, command).await);
                render(&session, &device);
            }
            Err(msg) => {
                eprintln!("{msg}");
                println!("{HELP}");
            }
        }
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ PortalError::ConfigError(_)) => {
            eprintln!("{e}");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
