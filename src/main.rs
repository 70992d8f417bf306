use clap::Parser;

/// Locks keyboard and mouse input behind a four-button combo.
///
/// Lock with Escape+LeftControl or F12+RightControl. Unlock by holding
/// LeftControl, RightControl, F12 and Escape together, then releasing them.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Keep the hooks passive: observe input without ever locking it.
    #[arg(long)]
    no_lock: bool,

    /// Tap CapsLock to cycle through the installed keyboard layouts.
    #[arg(long)]
    layout_switch: bool,
}

fn main() {
    // Bad or duplicate switches abort here, before any hook exists.
    let cli = Cli::parse();
    colog::init();

    run(input_lock::Config {
        lock_enabled: !cli.no_lock,
        layout_switch: cli.layout_switch,
    });
}

#[cfg(target_os = "windows")]
fn run(config: input_lock::Config) {
    use std::sync::atomic::{AtomicU32, Ordering};

    use windows::Win32::Foundation::BOOL;
    use windows::Win32::System::Console::SetConsoleCtrlHandler;

    static PUMP_THREAD: AtomicU32 = AtomicU32::new(0);

    unsafe extern "system" fn on_console_ctrl(_ctrl_type: u32) -> BOOL {
        input_lock::hook::request_stop(PUMP_THREAD.load(Ordering::SeqCst));
        true.into()
    }

    let task = match input_lock::start(config) {
        Ok(task) => task,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };
    PUMP_THREAD.store(task.thread_id(), Ordering::SeqCst);

    // Ctrl+C drains the pump instead of killing the process mid-hook, so the
    // uninstall path always runs.
    if let Err(e) = unsafe { SetConsoleCtrlHandler(Some(on_console_ctrl), true) } {
        log::warn!("failed to install the console control handler: {}", e);
    }

    if task.join().is_err() {
        log::error!("the hook thread panicked");
        std::process::exit(1);
    }
}

#[cfg(not(target_os = "windows"))]
fn run(_config: input_lock::Config) {
    eprintln!("input-lock drives Windows low-level hooks and only runs on Windows");
    std::process::exit(1);
}
