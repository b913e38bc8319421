//! Serial transport for the node's USB link
//!
//! The node logs one record per tick on its UART at 115200 baud, 8N1.
//! Reads use a short timeout so the worker loop can interleave command
//! processing; a timeout is not an error, just an idle read.

use super::{Transport, TransportRead};
use crate::error::Result;
use crate::types::TransportKind;
use std::io::Read;
use std::time::Duration;

/// Baud rate the node's firmware configures
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

const READ_TIMEOUT: Duration = Duration::from_millis(100);
const READ_BUF_BYTES: usize = 1024;

/// A serial link to the sensor node.
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
    handle: Option<Box<dyn serialport::SerialPort>>,
    read_buf: [u8; READ_BUF_BYTES],
}

impl SerialTransport {
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            handle: None,
            read_buf: [0; READ_BUF_BYTES],
        }
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> Result<()> {
        let handle = serialport::new(&self.port_name, self.baud_rate)
            .timeout(READ_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .open()?;
        self.handle = Some(handle);
        Ok(())
    }

    fn read(&mut self) -> Result<TransportRead> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(TransportRead::Idle);
        };

        match handle.read(&mut self.read_buf) {
            Ok(0) => Ok(TransportRead::Eof),
            // The UART is a text channel; decode lossily so a corrupted
            // byte garbles one record instead of killing the session.
            Ok(n) => Ok(TransportRead::Chunk(
                String::from_utf8_lossy(&self.read_buf[..n]).into_owned(),
            )),
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
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) {
        // Dropping the handle releases the port.
        self.handle = None;
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }

    fn describe(&self) -> String {
        format!("serial {} @ {} baud", self.port_name, self.baud_rate)
    }
}
