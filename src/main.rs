//! Grabber
//!
//! Watches the slave windows of the target process for the marker and
//! answers every sighting with a click or drag, without touching the real
//! cursor. Also lists candidate windows and runs detection on screenshots.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use grabber::config::GrabberConfig;
use grabber::detection::{annotate, detect_in_image, save_annotated, Detector, TemplateStore};
use grabber::{logging, paths};

#[derive(Parser)]
#[command(version, about = "Template-driven click and drag automation")]
struct Cli {
    /// Config file [default: config.json next to the executable]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Drive the slave windows (default). Ctrl+Shift+A starts, Ctrl+Shift+Q stops, Ctrl+C exits
    Run,
    /// List the target process's windows and the role each would get
    Windows,
    /// Run detection on a saved screenshot
    Detect {
        /// Screenshot to search
        #[arg(long)]
        image: PathBuf,
        /// Write an annotated copy here
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(paths::get_config_path);

    // The log level lives in the config, so read it before logging starts
    let loaded = GrabberConfig::load(&config_path);
    let level = match &loaded {
        Ok(Some(config)) => config.log_level.clone(),
        _ => "info".to_string(),
    };
    logging::init(&level)?;
    install_panic_hook();

    let config = match loaded.context("Failed to load configuration")? {
        Some(config) => {
            info!(path = %config_path.display(), "Configuration loaded");
            config
        }
        None => {
            warn!(path = %config_path.display(), "Config file not found, using defaults");
            GrabberConfig::default()
        }
    };
    config.validate().context("Invalid configuration")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => platform::run(&config),
        Command::Windows => platform::list_windows(&config),
        Command::Detect { image, output } => detect(&config, &image, output.as_deref()),
    }
}

/// Logs panics through tracing so they reach the log file too.
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();
        error!(location, "Panic: {}", msg);
    }));
}

fn detect(config: &GrabberConfig, image: &Path, output: Option<&Path>) -> Result<()> {
    let template_path = paths::resolve(&config.template_path);
    let templates = Arc::new(TemplateStore::load(&template_path, &config.scales)?);
    let detector = Detector::new(config, templates)?;

    let report = detect_in_image(image, config, &detector)?;
    println!(
        "{} raw, {} kept (reference {})",
        report.raw.len(),
        report.kept.len(),
        report.reference
    );
    for d in &report.kept {
        println!("{:>8.1} {:>8.1}  score {:.3}  scale {}", d.x, d.y, d.score, d.scale);
    }

    if let Some(output) = output {
        let annotated = annotate(
            report.frame.image(),
            &report.raw,
            &report.kept,
            report.reference,
            detector.templates(),
        );
        save_annotated(&annotated, output)?;
        info!(path = %output.display(), "Annotated image saved");
    }
    Ok(())
}

#[cfg(windows)]
mod platform {
    use anyhow::{Context, Result};
    use tracing::{error, info, warn};

    use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        RegisterHotKey, UnregisterHotKey, MOD_CONTROL, MOD_NOREPEAT, MOD_SHIFT,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        GetMessageW, PostThreadMessageW, MSG, WM_HOTKEY, WM_QUIT,
    };

    use grabber::automation::{start_window_session, Session};
    use grabber::capture::{apply_role, assign_roles, enable_dpi_awareness, find_windows};
    use grabber::config::GrabberConfig;

    const HOTKEY_START: i32 = 1;
    const HOTKEY_STOP: i32 = 2;
    const VK_A: u32 = 0x41;
    const VK_Q: u32 = 0x51;

    pub fn list_windows(config: &GrabberConfig) -> Result<()> {
        enable_dpi_awareness();
        let windows = find_windows(&config.window.process_name)?;
        if windows.is_empty() {
            println!("No windows found for {}", config.window.process_name);
            return Ok(());
        }
        for (info, role) in assign_roles(&windows, &config.window.roles) {
            println!(
                "{:>10}  {:<6}  {}x{} at {}  {}",
                info.handle.to_string(),
                role.to_string(),
                info.client.width,
                info.client.height,
                info.client.origin,
                info.title
            );
        }
        Ok(())
    }

    /// Hotkey loop on the main thread. Ctrl+C posts WM_QUIT to end it.
    pub fn run(config: &GrabberConfig) -> Result<()> {
        enable_dpi_awareness();

        let main_thread = unsafe { GetCurrentThreadId() };
        ctrlc::set_handler(move || unsafe {
            let _ = PostThreadMessageW(main_thread, WM_QUIT, WPARAM(0), LPARAM(0));
        })
        .context("Failed to install Ctrl+C handler")?;

        unsafe {
            RegisterHotKey(
                HWND::default(),
                HOTKEY_START,
                MOD_CONTROL | MOD_SHIFT | MOD_NOREPEAT,
                VK_A,
            )
            .context("Failed to register Ctrl+Shift+A")?;
            RegisterHotKey(
                HWND::default(),
                HOTKEY_STOP,
                MOD_CONTROL | MOD_SHIFT | MOD_NOREPEAT,
                VK_Q,
            )
            .context("Failed to register Ctrl+Shift+Q")?;
        }

        info!(process = %config.window.process_name, "Grabber ready");
        info!("Hotkey: Ctrl+Shift+A (start)");
        info!("Hotkey: Ctrl+Shift+Q (stop)");
        info!("Ctrl+C to exit");

        let mut session: Option<Session> = None;
        let mut msg = MSG::default();
        unsafe {
            while GetMessageW(&mut msg, HWND::default(), 0, 0).as_bool() {
                if msg.message != WM_HOTKEY {
                    continue;
                }
                match msg.wParam.0 as i32 {
                    HOTKEY_START => session = start(config, session.take()),
                    HOTKEY_STOP => {
                        if session.is_none() {
                            info!("Stop pressed but nothing is running");
                        }
                        finish(session.take());
                    }
                    _ => {}
                }
            }

            let _ = UnregisterHotKey(HWND::default(), HOTKEY_START);
            let _ = UnregisterHotKey(HWND::default(), HOTKEY_STOP);
        }

        info!("Exiting");
        finish(session.take());
        Ok(())
    }

    fn start(config: &GrabberConfig, current: Option<Session>) -> Option<Session> {
        if let Some(session) = current {
            if !session.is_finished() {
                info!("Already running");
                return Some(session);
            }
            finish(Some(session));
        }

        let windows = match find_windows(&config.window.process_name) {
            Ok(windows) => windows,
            Err(e) => {
                error!("Window enumeration failed: {:#}", e);
                return None;
            }
        };
        let assigned = assign_roles(&windows, &config.window.roles);

        if config.window.arrange {
            for (info, role) in &assigned {
                if let Err(e) = apply_role(info.handle, *role, &config.window) {
                    warn!(window = %info.handle, "Could not arrange window: {:#}", e);
                }
            }
        }

        match start_window_session(config, &assigned) {
            Ok(session) => Some(session),
            Err(e) => {
                error!("Could not start: {:#}", e);
                None
            }
        }
    }

    /// Stops a session at its next cycle boundary and waits for it.
    fn finish(session: Option<Session>) {
        if let Some(session) = session {
            info!("Stopping");
            session.stop();
            session.join();
        }
    }
}

#[cfg(not(windows))]
mod platform {
    use anyhow::{bail, Result};

    use grabber::config::GrabberConfig;

    pub fn run(_config: &GrabberConfig) -> Result<()> {
        bail!("Driving windows is only supported on Windows; try `detect`")
    }

    pub fn list_windows(_config: &GrabberConfig) -> Result<()> {
        bail!("Window enumeration is only supported on Windows")
    }
}
