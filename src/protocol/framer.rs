//! Line framing for chunked transport reads
//!
//! Serial reads hand back whatever bytes happen to be in the driver's
//! buffer, so a record routinely arrives split across several reads. The
//! framer buffers the tail fragment between calls and only ever emits
//! complete lines.

/// Splits a chunked text stream into newline-delimited lines.
///
/// The last segment of every `feed` - the part after the final `\n`, which
/// may be empty - is retained as the prefix of a line whose terminator has
/// not arrived yet.
#[derive(Debug, Default)]
pub struct LineFramer {
    remainder: String,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completes.
    ///
    /// Emitted lines have their terminator removed; a single trailing
    /// carriage return is stripped so CRLF input behaves like LF input.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        self.remainder.push_str(chunk);
        if !self.remainder.contains('\n') {
            return Vec::new();
        }

        let buffered = std::mem::take(&mut self.remainder);
        let mut segments: Vec<&str> = buffered.split('\n').collect();
        // The final segment may be the prefix of a not-yet-received line.
        self.remainder = segments.pop().unwrap_or_default().to_string();

        segments
            .into_iter()
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect()
    }

    /// The buffered partial line, if any.
    pub fn remainder(&self) -> &str {
        &self.remainder
    }

    /// Discard any buffered partial line.
    pub fn clear(&mut self) {
        self.remainder.clear();
    }
}
