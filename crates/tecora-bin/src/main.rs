//! Tecora entrypoint: terminal front end for the interpreter.

use anyhow::{Context, Result};
use clap::Parser;
use core_interp::{EdFlags, Interp, KeyAction};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, read};
use crossterm::terminal;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod config;
mod iface;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "tecora", version, about = "TECO-family interactive editor")]
struct Args {
    /// Files to open at startup.
    pub files: Vec<PathBuf>,
    /// Configuration file path (overrides discovery of `tecora.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Execute a macro non-interactively and exit.
    #[arg(long = "eval", short = 'e')]
    pub eval: Option<String>,
    /// Run a macro file non-interactively and exit.
    #[arg(long = "batch", short = 'b')]
    pub batch: Option<PathBuf>,
    /// Log filter directive (overrides the configuration file).
    #[arg(long = "log-filter")]
    pub log_filter: Option<String>,
}

fn init_tracing(cfg: &config::LogConfig, override_filter: Option<&str>) -> Option<WorkerGuard> {
    let filter = override_filter
        .map(str::to_owned)
        .or_else(|| cfg.filter.clone())
        .unwrap_or_else(|| "info".to_owned());
    let env_filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info"));

    match &cfg.file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let name = path.file_name().map(|n| n.to_owned()).unwrap_or_default();
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

fn apply_flags(interp: &mut Interp, flags: &config::FlagsConfig) {
    let mut ed = EdFlags::empty();
    if flags.hooks {
        ed |= EdFlags::HOOKS;
    }
    if flags.fnkeys {
        ed |= EdFlags::FNKEYS;
    }
    if flags.autoeol {
        ed |= EdFlags::AUTOEOL;
    }
    interp.ed = ed;
}

fn run_batch(interp: &mut Interp, code: &[u8], name: &str) -> Result<()> {
    interp.set_batch_mode();
    match interp.execute_toplevel_macro(code, name) {
        Ok(()) => Ok(()),
        Err(core_interp::Interrupt::Quit) | Err(core_interp::Interrupt::Return) => Ok(()),
        Err(core_interp::Interrupt::Error(e)) => {
            error!(target: "batch", "{}", e.long_message());
            anyhow::bail!("{}", e.short_message())
        }
        Err(core_interp::Interrupt::Replace(_)) => {
            anyhow::bail!("command line replacement is not available in batch mode")
        }
    }
}

/// Map a terminal key event onto interpreter input.
fn dispatch_key(interp: &mut Interp, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Char(c) => {
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                let byte = (c.to_ascii_uppercase() as u8) & 0x1F;
                interp.keypress(byte)
            } else {
                let mut buf = [0u8; 4];
                interp.keypress_str(c.encode_utf8(&mut buf).as_bytes())
            }
        }
        KeyCode::Enter => interp.keypress(b'\n'),
        KeyCode::Tab => interp.keypress(b'\t'),
        KeyCode::Backspace => interp.keypress(0x08),
        KeyCode::Esc => interp.keypress(0x1B),
        KeyCode::Left => interp.keypress_fn("LEFT"),
        KeyCode::Right => interp.keypress_fn("RIGHT"),
        KeyCode::Up => interp.keypress_fn("UP"),
        KeyCode::Down => interp.keypress_fn("DOWN"),
        KeyCode::Home => interp.keypress_fn("HOME"),
        KeyCode::End => interp.keypress_fn("END"),
        KeyCode::PageUp => interp.keypress_fn("PGUP"),
        KeyCode::PageDown => interp.keypress_fn("PGDN"),
        KeyCode::Delete => interp.keypress_fn("DC"),
        KeyCode::Insert => interp.keypress_fn("IC"),
        KeyCode::F(n) => {
            let name = format!("F{n}");
            interp.keypress_fn(&name)
        }
        _ => KeyAction::Continue,
    }
}

fn interactive_loop(interp: &mut Interp) -> Result<()> {
    terminal::enable_raw_mode().context("enabling raw mode")?;
    let result = (|| -> Result<()> {
        loop {
            match read().context("reading terminal event")? {
                Event::Key(key) if key.kind != KeyEventKind::Release => {
                    if dispatch_key(interp, key) == KeyAction::Quit {
                        return Ok(());
                    }
                }
                Event::Resize(..) => {}
                _ => {}
            }
        }
    })();
    let _ = terminal::disable_raw_mode();
    result
}

fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = config::load(args.config.as_ref())?;
    let _log_guard = init_tracing(&cfg.log, args.log_filter.as_deref());

    let mut interp = Interp::new(Box::new(iface::TerminalInterface::new()));
    apply_flags(&mut interp, &cfg.flags);

    let environ = core_view::env::get_environ();
    interp
        .environ_import(&environ)
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    for page in &cfg.help_files {
        if let Err(e) = interp.help.load_file(page) {
            error!(target: "help", "{e}");
        }
    }

    for file in &args.files {
        let path = file.to_string_lossy().into_owned();
        if let Err(e) = interp.buffer_open(&path) {
            match e {
                core_interp::Interrupt::Error(e) => {
                    anyhow::bail!("cannot open {path}: {}", e.short_message())
                }
                _ => anyhow::bail!("cannot open {path}"),
            }
        }
    }
    // startup is the commit point for the file arguments
    interp.undo.clear();

    if let Some(code) = &args.eval {
        return run_batch(&mut interp, code.as_bytes(), "<eval>");
    }
    if let Some(path) = &args.batch {
        let code = std::fs::read(path)
            .with_context(|| format!("reading macro {}", path.display()))?;
        return run_batch(&mut interp, &code, &path.to_string_lossy());
    }

    info!(target: "main", "entering interactive loop");
    interactive_loop(&mut interp)
}
