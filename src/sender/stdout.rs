use crate::domain::Record;
use parking_lot::Mutex;
use std::io::Write;
use tracing::debug;

/// Writes each record as one JSON line instead of sending it.
pub struct StdoutSender<W: Write + Send = std::io::Stdout> {
    out: Mutex<W>,
}

impl StdoutSender {
    pub fn new() -> Self {
        Self::with_writer(std::io::stdout())
    }
}

impl Default for StdoutSender {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> StdoutSender<W> {
    pub fn with_writer(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn send(&self, record: &Record, host: &str) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                debug!(kind = %record.kind(), error = %e, "failed to serialize record");
                return;
            }
        };
        let mut out = self.out.lock();
        if let Err(e) = writeln!(out, "{host}\t{line}") {
            debug!(error = %e, "failed to write record");
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_json_line_per_record() {
        let sender = StdoutSender::with_writer(Vec::new());
        sender.send(&Record::log("hello"), "http://c/?");
        sender.send(&Record::count("n"), "http://c/?");

        let written = String::from_utf8(sender.into_inner()).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "http://c/?\t{\"_ack\":\"log\",\"msg\":\"hello\"}");
    }
}
