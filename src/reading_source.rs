//! Where readings come from: the sink mote on a serial line, or a replayed
//! recording. Both are polled once per tick and never block.

use crate::frame_decoder::FrameDecoder;
use crate::replay::ReplaySource;
use crate::sensor_registry::Reading;

use log::{debug, error, info};
use serial2::SerialPort;
use std::{
    io::{self, ErrorKind, Read},
    path::Path,
    time::Duration,
};

/// Baud rate of the sink mote
pub const DEFAULT_BAUD_RATE: u32 = 38400;

/// Yields whatever readings have arrived since the previous poll.
pub trait ReadingSource {
    /// Never blocks, returns an empty `Vec` when nothing new is available.
    fn poll(&mut self) -> Vec<Reading>;
}

/// Reads frames from a live byte stream. When the stream fails it is
/// dropped and the source goes quiet instead of taking the loop down.
pub struct LiveSource<R> {
    stream: Option<R>,
    decoder: FrameDecoder,
}

/// A [`LiveSource`] attached to the sink mote's serial port
pub type SerialSource = LiveSource<SerialPort>;

impl LiveSource<SerialPort> {
    /// Open `path` with a zero read timeout, so polling only drains bytes
    /// that have already arrived.
    pub fn open_serial<P: AsRef<Path>>(
        path: P,
        baud_rate: u32,
        decoder: FrameDecoder,
    ) -> io::Result<Self> {
        let mut port = SerialPort::open(path.as_ref(), baud_rate)?;
        port.set_read_timeout(Duration::ZERO)?;
        info!(
            "Listening on {} at {} baud",
            path.as_ref().display(),
            baud_rate
        );
        Ok(Self::new(port, decoder))
    }
}

impl<R: Read> LiveSource<R> {
    /// Read from `stream`, which must not block when it has nothing to give.
    pub fn new(stream: R, decoder: FrameDecoder) -> Self {
        Self {
            stream: Some(stream),
            decoder,
        }
    }

    /// A source with no stream behind it, used when the hardware could not
    /// be opened.
    pub fn disconnected(decoder: FrameDecoder) -> Self {
        Self {
            stream: None,
            decoder,
        }
    }

    /// `false` once the stream failed, or if there never was one
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Drain every byte currently available on the stream.
    fn read_available(&mut self) -> Vec<u8> {
        let mut received = Vec::new();
        let Some(stream) = self.stream.as_mut() else {
            return received;
        };

        let mut buffer = [0; 256];
        let mut failed = false;
        loop {
            match stream.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => received.extend_from_slice(&buffer[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    break
                }
                Err(e) => {
                    error!("Input stream failed, continuing without live data: {}", e);
                    failed = true;
                    break;
                }
            }
        }

        if failed {
            self.stream = None;
        }
        received
    }
}

impl<R: Read> ReadingSource for LiveSource<R> {
    fn poll(&mut self) -> Vec<Reading> {
        let bytes = self.read_available();
        self.decoder
            .push(&bytes)
            .into_iter()
            .map(|frame| {
                debug!(
                    "Received {} from mote {}: Light={}{}",
                    frame.tag,
                    frame.sensor_id,
                    frame.light,
                    frame.seq.map(|s| format!(", Seq={}", s)).unwrap_or_default()
                );
                Reading::from(frame)
            })
            .collect()
    }
}

/// Plays a [`ReplaySource`] forward by one frame per poll.
pub struct ReplayFeed {
    source: ReplaySource,
    frame: usize,
}

impl ReplayFeed {
    /// Start replaying from frame zero.
    pub fn new(source: ReplaySource) -> Self {
        Self { source, frame: 0 }
    }

    /// Index of the next frame to be replayed
    pub fn frame(&self) -> usize {
        self.frame
    }
}

impl ReadingSource for ReplayFeed {
    fn poll(&mut self) -> Vec<Reading> {
        let readings = self.source.readings(self.frame);
        self.frame += 1;
        readings
    }
}
