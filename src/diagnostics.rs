//! Logging setup for the console and an optional append-mode log file.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
};

use miette::{Context as _, IntoDiagnostic as _};

/// Initialize the logger, teeing into a file when one is configured.
///
/// The file is opened in append mode so restarts extend the existing log.
/// Initialization failures of the logger itself are ignored, a host may have installed its own.
pub(crate) fn init(log_file: Option<&Path>) -> miette::Result<()> {
    let env = env_logger::Env::default().default_filter_or("info");
    let mut builder = env_logger::Builder::from_env(env);

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Error opening log file {path:?}"))?;

        builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
    }

    // A second init means the host already installed a logger, which is fine
    let _ = builder.try_init();

    Ok(())
}

/// Writer mirroring everything to the console and the log file.
struct Tee {
    /// Append-mode log file.
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::io::stderr().write_all(buf)?;

        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stderr().flush()?;

        self.file.flush()
    }
}
