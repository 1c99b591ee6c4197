// GUI-subsystem binary. CLI mode (--input/-i or --check-coords) reattaches to
// the launching terminal so println!/eprintln! still reach it.
#![windows_subsystem = "windows"]

use eframe::egui;
use orthy::app::{self, OrthyApp};
use orthy::cli;
use orthy::logger;
use orthy::settings::OverlaySettings;

fn main() -> Result<(), eframe::Error> {
    #[cfg(target_os = "windows")]
    if cli::CliArgs::is_cli_mode() {
        attach_parent_console();
    }

    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        logger::init_stderr(if args.verbose { "debug" } else { "warn" });
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            1
        });
    }

    // -- GUI mode -----------------------------------------------------
    let settings = OverlaySettings::load();

    // Initialize session log (overwrites previous session log)
    logger::init(&settings.log_level);

    // The root viewport is the control panel; the overlay is opened later
    // as a second viewport.
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Orthy")
            .with_inner_size(app::panel_size(&settings))
            .with_resizable(false)
            .with_always_on_top(),
        ..Default::default()
    };

    eframe::run_native(
        "Orthy",
        options,
        Box::new(move |cc| Box::new(OrthyApp::new(cc, settings))),
    )
}

/// The binary is SUBSYSTEM:WINDOWS, so Windows never allocates a console.
/// Attach to the launching terminal and point the std handles at it.
#[cfg(target_os = "windows")]
fn attach_parent_console() {
    use std::ptr;
    use winapi::um::fileapi::{CreateFileW, OPEN_EXISTING};
    use winapi::um::handleapi::INVALID_HANDLE_VALUE;
    use winapi::um::processenv::SetStdHandle;
    use winapi::um::winbase::{STD_ERROR_HANDLE, STD_INPUT_HANDLE, STD_OUTPUT_HANDLE};
    use winapi::um::wincon::{AttachConsole, ATTACH_PARENT_PROCESS};
    use winapi::um::winnt::{FILE_SHARE_READ, FILE_SHARE_WRITE, GENERIC_READ, GENERIC_WRITE};

    let open = |name: &str, access: u32| {
        let wide: Vec<u16> = name.encode_utf16().chain(Some(0)).collect();
        // SAFETY: `wide` is NUL-terminated and outlives the call.
        unsafe {
            CreateFileW(
                wide.as_ptr(),
                access,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                ptr::null_mut(),
                OPEN_EXISTING,
                0,
                ptr::null_mut(),
            )
        }
    };

    // SAFETY: plain Win32 calls on handles we just opened.
    unsafe {
        if AttachConsole(ATTACH_PARENT_PROCESS) == 0 {
            return;
        }
        let out = open("CONOUT$", GENERIC_WRITE);
        if out != INVALID_HANDLE_VALUE {
            SetStdHandle(STD_OUTPUT_HANDLE, out);
            SetStdHandle(STD_ERROR_HANDLE, out);
        }
        let input = open("CONIN$", GENERIC_READ);
        if input != INVALID_HANDLE_VALUE {
            SetStdHandle(STD_INPUT_HANDLE, input);
        }
    }
}
