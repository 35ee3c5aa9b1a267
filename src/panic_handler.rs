use crossterm::{
    event::DisableMouseCapture,
    execute,
    terminal::{disable_raw_mode, LeaveAlternateScreen},
};
use log::error;

/// Install a panic hook that restores the terminal before reporting.
/// Debug builds get a full better-panic backtrace; release builds get the
/// human-panic crash report prompt.
pub fn initialize_panic_handler() {
    std::panic::set_hook(Box::new(move |panic_info| {
        // Leave the alternate screen first so the report is readable
        let _ = disable_raw_mode();
        let _ = execute!(std::io::stdout(), LeaveAlternateScreen, DisableMouseCapture);

        #[cfg(not(debug_assertions))]
        {
            use human_panic::{handle_dump, metadata, print_msg};
            let metadata = metadata!();
            let file_path = handle_dump(&metadata, panic_info);
            print_msg(file_path, &metadata)
                .expect("human-panic: printing error message to console failed");
        }

        #[cfg(debug_assertions)]
        {
            better_panic::Settings::auto()
                .most_recent_first(false)
                .lineno_suffix(true)
                .create_panic_handler()(panic_info);
        }

        error!("panic: {panic_info}");
        std::process::exit(1);
    }));
}
