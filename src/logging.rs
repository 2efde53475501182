// Logging initialization for binaries and tests.
//
// Library code only emits through the `log` facade; hosts decide the sink.
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

/// Install a terminal logger. Safe to call once per process; later calls
/// return an error from the logger registry, which callers may ignore.
pub fn init(verbose: bool) -> Result<(), log::SetLoggerError> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
}
