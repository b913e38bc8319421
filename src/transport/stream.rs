//! Server-push event stream transport
//!
//! When the dashboard host can reach the node over Wi-Fi, the node serves
//! its records as Server-Sent Events at `/events`: one `message`-typed
//! event per record, with the usual `id`/`retry` bookkeeping and a greeting
//! event on connect. This transport speaks that protocol over a blocking
//! HTTP client and takes over the reconnection duty a browser
//! `EventSource` would provide: a lost connection is retried internally on
//! a fixed delay (or the server's `retry:` hint), surfacing as
//! [`TransportRead::Reconnecting`] rather than an error.

use super::{Transport, TransportRead};
use crate::error::Result;
use crate::protocol::LineFramer;
use crate::types::TransportKind;
use std::collections::VecDeque;
use std::io::Read;
use std::time::{Duration, Instant};

/// Reconnect delay used when the server has not sent a `retry:` hint
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_millis(200);
const READ_BUF_BYTES: usize = 2048;

/// Incremental decoder for the SSE wire format.
///
/// Dispatches an event at each blank line; only events with the default
/// `message` type (or no type) yield records, matching the browser's
/// `onmessage` behavior the node's dashboard relies on. `last_event_id`
/// and the server's retry hint survive reconnects; per-connection state
/// does not.
#[derive(Debug, Default)]
struct SseDecoder {
    framer: LineFramer,
    event_type: String,
    data: Vec<String>,
    pending: VecDeque<String>,
    last_event_id: Option<String>,
    retry_hint: Option<Duration>,
}

impl SseDecoder {
    fn feed(&mut self, chunk: &str) {
        for line in self.framer.feed(chunk) {
            self.process_line(&line);
        }
    }

    fn process_line(&mut self, line: &str) {
        if line.is_empty() {
            self.dispatch();
            return;
        }
        if line.starts_with(':') {
            // Comment line, typically a keep-alive.
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event_type = value.to_string(),
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_string());
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(ms) = value.parse() {
                        self.retry_hint = Some(Duration::from_millis(ms));
                    }
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self) {
        if !self.data.is_empty() && (self.event_type.is_empty() || self.event_type == "message") {
            self.pending.push_back(self.data.join("\n"));
        }
        self.data.clear();
        self.event_type.clear();
    }

    fn pop(&mut self) -> Option<String> {
        self.pending.pop_front()
    }

    /// Forget the half-received state of a dead connection.
    fn begin_stream(&mut self) {
        self.framer.clear();
        self.data.clear();
        self.event_type.clear();
    }
}

/// SSE client for the node's `/events` endpoint.
pub struct EventStreamTransport {
    url: String,
    client: reqwest::blocking::Client,
    response: Option<reqwest::blocking::Response>,
    decoder: SseDecoder,
    retry_delay: Duration,
    next_attempt: Option<Instant>,
    read_buf: Box<[u8; READ_BUF_BYTES]>,
}

impl EventStreamTransport {
    /// Create a transport for `url`. No connection is attempted yet; the
    /// first `read` drives the connect, like an `EventSource` constructor.
    pub fn new(url: impl Into<String>, retry_delay: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .timeout(None)
            .build()?;

        Ok(Self {
            url: url.into(),
            client,
            response: None,
            decoder: SseDecoder::default(),
            retry_delay,
            next_attempt: None,
            read_buf: Box::new([0; READ_BUF_BYTES]),
        })
    }

    fn connect(&mut self) -> TransportRead {
        let mut request = self
            .client
            .get(&self.url)
            .header("Accept", "text/event-stream");
        if let Some(id) = &self.decoder.last_event_id {
            request = request.header("Last-Event-ID", id.clone());
        }

        match request.send() {
            Ok(response) if response.status().is_success() => {
                self.decoder.begin_stream();
                self.response = Some(response);
                self.next_attempt = None;
                TransportRead::Opened
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), url = %self.url, "event stream refused");
                self.schedule_retry();
                TransportRead::Reconnecting
            }
            Err(e) => {
                tracing::debug!(error = %e, url = %self.url, "event stream connect failed");
                self.schedule_retry();
                TransportRead::Reconnecting
            }
        }
    }

    fn schedule_retry(&mut self) {
        let delay = self.decoder.retry_hint.unwrap_or(self.retry_delay);
        self.next_attempt = Some(Instant::now() + delay);
    }

    fn drop_stream(&mut self) {
        self.response = None;
        self.schedule_retry();
    }
}

impl Transport for EventStreamTransport {
    fn open(&mut self) -> Result<()> {
        self.next_attempt = None;
        Ok(())
    }

    fn read(&mut self) -> Result<TransportRead> {
        if let Some(record) = self.decoder.pop() {
            return Ok(TransportRead::Record(record));
        }

        let Some(response) = self.response.as_mut() else {
            if let Some(at) = self.next_attempt {
                if Instant::now() < at {
                    return Ok(TransportRead::Idle);
                }
            }
            return Ok(self.connect());
        };

        let outcome = response.read(self.read_buf.as_mut_slice());

        match outcome {
            Ok(0) => {
                // Server closed the stream; retry like an EventSource.
                self.drop_stream();
                Ok(TransportRead::Reconnecting)
            }
            Ok(n) => {
                let chunk = String::from_utf8_lossy(&self.read_buf[..n]).into_owned();
                self.decoder.feed(&chunk);
                Ok(self
                    .decoder
                    .pop()
                    .map(TransportRead::Record)
                    .unwrap_or(TransportRead::Idle))
            }
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::TimedOut
                        | std::io::ErrorKind::WouldBlock
                        | std::io::ErrorKind::Interrupted
                ) =>
            {
                Ok(TransportRead::Idle)
            }
            Err(e) => {
                tracing::debug!(error = %e, "event stream read failed");
                self.drop_stream();
                Ok(TransportRead::Reconnecting)
            }
        }
    }

    fn close(&mut self) {
        self.response = None;
        self.next_attempt = None;
        self.decoder.begin_stream();
        self.decoder.pending.clear();
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Stream
    }

    fn describe(&self) -> String {
        format!("event stream {}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_dispatches_on_blank_line() {
        let mut decoder = SseDecoder::default();
        decoder.feed("data:Gas:100,ZScore:0.0,Risk:1,Flame:0,State:SAFE\n");
        assert_eq!(decoder.pop(), None);
        decoder.feed("\n");
        assert_eq!(
            decoder.pop().as_deref(),
            Some("Gas:100,ZScore:0.0,Risk:1,Flame:0,State:SAFE")
        );
    }

    #[test]
    fn test_decoder_strips_one_leading_space() {
        let mut decoder = SseDecoder::default();
        decoder.feed("data:  spaced\n\n");
        assert_eq!(decoder.pop().as_deref(), Some(" spaced"));
    }

    #[test]
    fn test_message_events_dispatch_but_named_events_do_not() {
        let mut decoder = SseDecoder::default();
        decoder.feed("event: message\ndata: yes\n\n");
        assert_eq!(decoder.pop().as_deref(), Some("yes"));

        decoder.feed("event: heartbeat\ndata: no\n\n");
        assert_eq!(decoder.pop(), None);

        // The event type resets between events.
        decoder.feed("data: yes again\n\n");
        assert_eq!(decoder.pop().as_deref(), Some("yes again"));
    }

    #[test]
    fn test_multi_line_data_joined() {
        let mut decoder = SseDecoder::default();
        decoder.feed("data: first\ndata: second\n\n");
        assert_eq!(decoder.pop().as_deref(), Some("first\nsecond"));
    }

    #[test]
    fn test_comments_and_unknown_fields_ignored() {
        let mut decoder = SseDecoder::default();
        decoder.feed(": keep-alive\nfoo: bar\ndata: payload\n\n");
        assert_eq!(decoder.pop().as_deref(), Some("payload"));
    }

    #[test]
    fn test_retry_hint_and_id_tracked() {
        let mut decoder = SseDecoder::default();
        decoder.feed("retry: 10000\nid: 42\ndata: hello!\n\n");
        assert_eq!(decoder.retry_hint, Some(Duration::from_millis(10000)));
        assert_eq!(decoder.last_event_id.as_deref(), Some("42"));
        // Non-numeric retry values are ignored.
        decoder.feed("retry: soon\n\n");
        assert_eq!(decoder.retry_hint, Some(Duration::from_millis(10000)));
    }

    #[test]
    fn test_blank_line_without_data_dispatches_nothing() {
        let mut decoder = SseDecoder::default();
        decoder.feed("\n\n");
        assert_eq!(decoder.pop(), None);
    }

    #[test]
    fn test_begin_stream_keeps_reconnect_state() {
        let mut decoder = SseDecoder::default();
        decoder.feed("retry: 500\nid: 7\ndata: half an eve");
        decoder.begin_stream();
        assert_eq!(decoder.last_event_id.as_deref(), Some("7"));
        assert_eq!(decoder.retry_hint, Some(Duration::from_millis(500)));
        // The half-received event from the dead connection is gone; the
        // next full event dispatches alone.
        decoder.feed("data: fresh\n\n");
        assert_eq!(decoder.pop().as_deref(), Some("fresh"));
        assert_eq!(decoder.pop(), None);
    }

    #[test]
    fn test_chunked_delivery() {
        let mut decoder = SseDecoder::default();
        decoder.feed("da");
        decoder.feed("ta: spl");
        decoder.feed("it\n");
        decoder.feed("\n");
        assert_eq!(decoder.pop().as_deref(), Some("split"));
    }
}
