use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use env_logger::{Builder, Env, Target};

/// Duplicates every log line to stderr and an append-only file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

fn builder() -> Builder {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        let ts = buf.timestamp_millis();
        writeln!(buf, "{ts} - {} - {}", record.level(), record.args())
    });
    builder
}

/// Console-only logging, for failures before the log file is known.
pub fn init() {
    builder().init();
}

/// Logs to the console and, when it can be opened, to `log_file`.
pub fn init_with_file(log_file: &Path) {
    let mut builder = builder();
    let file_error = match OpenOptions::new().create(true).append(true).open(log_file) {
        Ok(file) => {
            builder.target(Target::Pipe(Box::new(Tee { file })));
            None
        }
        Err(e) => Some(e),
    };
    builder.init();
    if let Some(e) = file_error {
        log::warn!(
            "Could not open log file {}: {e}; logging to console only",
            log_file.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tee_writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ingestion.log");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .unwrap();
        let mut tee = Tee { file };
        tee.write_all(b"first\n").unwrap();
        tee.write_all(b"second\n").unwrap();
        tee.flush().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }
}
