//! Output formatting for `gridint` runs.

use std::fmt;

use log;

const GRIDINT_BANNER_LENGTH: usize = 83;

/// Logs a warning to the `gridint-output` logger.
macro_rules! gridint_warn {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::warn!(target: "gridint-output", $fmt, $($($arg)*)?); }
}

/// Logs a main output line to the `gridint-output` logger.
macro_rules! gridint_output {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::info!(target: "gridint-output", $fmt, $($($arg)*)?); }
}

pub(crate) use {gridint_output, gridint_warn};

/// Logs a nicely formatted section title to the `gridint-output` logger.
pub(crate) fn log_title(title: &str) {
    let length = title.chars().count().max(GRIDINT_BANNER_LENGTH - 6);
    let bar = "─".repeat(length);
    gridint_output!("┌──{bar}──┐");
    gridint_output!("│§ {title:^length$} §│");
    gridint_output!("└──{bar}──┘");
}

/// Writes a nicely formatted subtitle.
pub(crate) fn write_subtitle(f: &mut fmt::Formatter<'_>, subtitle: &str) -> fmt::Result {
    let length = subtitle.chars().count();
    let bar = "═".repeat(length);
    writeln!(f, "{subtitle}")?;
    writeln!(f, "{bar}")?;
    Ok(())
}

/// Logs a nicely formatted subtitle to the `gridint-output` logger.
pub(crate) fn log_subtitle(subtitle: &str) {
    let length = subtitle.chars().count();
    let bar = "═".repeat(length);
    gridint_output!("{}", subtitle);
    gridint_output!("{}", bar);
}

/// Turns a boolean into a string of `yes` or `no`.
pub(crate) fn nice_bool(b: bool) -> String {
    if b {
        "yes".to_string()
    } else {
        "no".to_string()
    }
}

/// A trait for logging `gridint` outputs nicely.
pub(crate) trait GridIntOutput: fmt::Debug + fmt::Display {
    /// Logs display output line by line.
    fn log_output_display(&self) {
        let lines = self.to_string();
        lines.lines().for_each(|line| {
            gridint_output!("{line}");
        })
    }
}

// Blanket implementation
impl<T> GridIntOutput for T where T: fmt::Debug + fmt::Display {}
