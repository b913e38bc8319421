//! Scripted transport for testing without hardware
//!
//! Integration tests drive the whole ingestion pipeline by handing the
//! worker a canned sequence of read outcomes instead of a real serial port
//! or HTTP stream. The script is plain data so it can travel through the
//! command channel like any other connect request.
//!
//! # Enabling
//!
//! Only available with the `mock-transport` feature:
//!
//! ```bash
//! cargo test --features mock-transport
//! ```

use super::{Transport, TransportRead};
use crate::error::{FirewatchError, Result};
use crate::types::TransportKind;
use std::collections::VecDeque;

/// One scripted read outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedRead {
    Opened,
    Chunk(String),
    Record(String),
    Idle,
    Eof,
    Reconnecting,
    /// Fail the read with a transport error carrying this message.
    Fail(String),
}

/// A canned transport session.
#[derive(Debug, Clone)]
pub struct MockScript {
    pub kind: TransportKind,
    pub reads: Vec<ScriptedRead>,
    /// Make `open` fail instead of producing reads.
    pub fail_open: bool,
}

impl MockScript {
    /// A script that behaves like a serial link: `open` succeeds
    /// synchronously and reads yield raw chunks.
    pub fn serial() -> Self {
        Self {
            kind: TransportKind::Serial,
            reads: Vec::new(),
            fail_open: false,
        }
    }

    /// A script that behaves like the event stream: readiness arrives as
    /// an `Opened` read.
    pub fn stream() -> Self {
        Self {
            kind: TransportKind::Stream,
            reads: vec![ScriptedRead::Opened],
            fail_open: false,
        }
    }

    /// Script a stream re-announcing itself after an outage.
    pub fn opened(mut self) -> Self {
        self.reads.push(ScriptedRead::Opened);
        self
    }

    pub fn chunk(mut self, text: impl Into<String>) -> Self {
        self.reads.push(ScriptedRead::Chunk(text.into()));
        self
    }

    pub fn record(mut self, line: impl Into<String>) -> Self {
        self.reads.push(ScriptedRead::Record(line.into()));
        self
    }

    pub fn idle(mut self) -> Self {
        self.reads.push(ScriptedRead::Idle);
        self
    }

    pub fn eof(mut self) -> Self {
        self.reads.push(ScriptedRead::Eof);
        self
    }

    pub fn reconnecting(mut self) -> Self {
        self.reads.push(ScriptedRead::Reconnecting);
        self
    }

    pub fn fail_read(mut self, message: impl Into<String>) -> Self {
        self.reads.push(ScriptedRead::Fail(message.into()));
        self
    }

    pub fn fail_open(mut self) -> Self {
        self.fail_open = true;
        self
    }
}

/// Transport implementation fed from a [`MockScript`].
///
/// Once the script runs dry every further read is `Idle`, so a finished
/// session looks like a healthy but silent link.
#[derive(Debug)]
pub struct ScriptedTransport {
    kind: TransportKind,
    reads: VecDeque<ScriptedRead>,
    fail_open: bool,
    open: bool,
}

impl ScriptedTransport {
    pub fn new(script: MockScript) -> Self {
        Self {
            kind: script.kind,
            reads: script.reads.into(),
            fail_open: script.fail_open,
            open: false,
        }
    }
}

impl Transport for ScriptedTransport {
    fn open(&mut self) -> Result<()> {
        if self.fail_open {
            return Err(FirewatchError::Transport(
                "scripted open failure".to_string(),
            ));
        }
        self.open = true;
        Ok(())
    }

    fn read(&mut self) -> Result<TransportRead> {
        if !self.open {
            return Ok(TransportRead::Idle);
        }
        match self.reads.pop_front() {
            Some(ScriptedRead::Opened) => Ok(TransportRead::Opened),
            Some(ScriptedRead::Chunk(text)) => Ok(TransportRead::Chunk(text)),
            Some(ScriptedRead::Record(line)) => Ok(TransportRead::Record(line)),
            Some(ScriptedRead::Idle) => Ok(TransportRead::Idle),
            Some(ScriptedRead::Eof) => Ok(TransportRead::Eof),
            Some(ScriptedRead::Reconnecting) => Ok(TransportRead::Reconnecting),
            Some(ScriptedRead::Fail(message)) => Err(FirewatchError::Transport(message)),
            None => Ok(TransportRead::Idle),
        }
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn describe(&self) -> String {
        format!("scripted {} transport", self.kind)
    }
}
