use log::{LevelFilter, SetLoggerError};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    TermLogger::init(
        level,
        ConfigBuilder::default().build(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
}
