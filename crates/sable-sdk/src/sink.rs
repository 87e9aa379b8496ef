//! Output sinks.

/// A writable text sink for program output.
///
/// The engine imposes no buffering contract; `write` receives text in the
/// order the program produced it.
pub trait OutputSink {
    /// Append `text` to the sink.
    fn write(&mut self, text: &str);
}

/// An in-memory sink, convenient for tests and embedders that collect
/// output after the run.
#[derive(Debug, Default)]
pub struct BufferSink {
    buffer: String,
}

impl BufferSink {
    /// Create an empty buffer sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    pub fn contents(&self) -> &str {
        &self.buffer
    }
}

impl OutputSink for BufferSink {
    fn write(&mut self, text: &str) {
        self.buffer.push_str(text);
    }
}

impl<W: std::io::Write> OutputSink for std::io::BufWriter<W> {
    fn write(&mut self, text: &str) {
        let _ = std::io::Write::write_all(self, text.as_bytes());
    }
}
