//! Fan-out writer duplicating launcher output to the caller and the run log.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

/// Open the run log for appending, creating it if missing.
pub fn open_log(path: &Path) -> Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Writes every byte to both sinks.
///
/// The log sink is authoritative: its errors are returned. A failing caller
/// sink (e.g. a closed pipe under cron) is reported once and then skipped so
/// the log stays complete. Both sinks are flushed on drop.
pub struct Tee<C: Write, L: Write> {
    caller: C,
    log: L,
    caller_failed: bool,
}

impl<C: Write, L: Write> Tee<C, L> {
    pub fn new(caller: C, log: L) -> Self {
        Self {
            caller,
            log,
            caller_failed: false,
        }
    }

    /// Write `text` and flush both sinks.
    pub fn emit(&mut self, text: &str) -> io::Result<()> {
        self.write_all(text.as_bytes())?;
        self.flush()
    }

    fn caller_error(&mut self, err: &io::Error) {
        if !self.caller_failed {
            warn!(err = %err, "caller output failed; continuing with log only");
            self.caller_failed = true;
        }
    }
}

impl<C: Write, L: Write> Write for Tee<C, L> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.log.write_all(buf)?;
        if !self.caller_failed
            && let Err(err) = self.caller.write_all(buf)
        {
            self.caller_error(&err);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.log.flush()?;
        if !self.caller_failed
            && let Err(err) = self.caller.flush()
        {
            self.caller_error(&err);
        }
        Ok(())
    }
}

impl<C: Write, L: Write> Drop for Tee<C, L> {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            warn!(err = %err, "failed to flush run log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn duplicates_to_both_sinks() {
        let mut caller = Vec::new();
        let mut log = Vec::new();
        {
            let mut tee = Tee::new(&mut caller, &mut log);
            tee.emit("start\n").expect("emit");
            tee.write_all(b"child line\n").expect("write");
        }
        assert_eq!(caller, b"start\nchild line\n");
        assert_eq!(log, caller);
    }

    #[test]
    fn broken_caller_does_not_stop_log() {
        let mut log = Vec::new();
        {
            let mut tee = Tee::new(BrokenPipe, &mut log);
            tee.emit("one\n").expect("emit one");
            tee.emit("two\n").expect("emit two");
        }
        assert_eq!(log, b"one\ntwo\n");
    }

    #[test]
    fn log_file_is_appended_and_flushed_on_drop() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("run.log");
        fs::write(&path, "earlier\n").expect("seed");

        {
            let log = open_log(&path).expect("open");
            let mut tee = Tee::new(io::sink(), log);
            tee.write_all(b"buffered\n").expect("write");
        }

        let contents = fs::read_to_string(&path).expect("read");
        assert_eq!(contents, "earlier\nbuffered\n");
    }
}
