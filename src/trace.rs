//! Optional on-disk negotiation/data-stream trace recorder and offline
//! player (`feature = "trace"`), ambient test tooling for capturing and
//! replaying sessions offline.
//!
//! Grounded on the donor's `network.rs` session-capture instincts
//! (`BufferPool`-style chunked byte capture), generalized into a
//! length-prefixed record format: [`Recorder`] timestamps and frames each
//! read/write chunk; [`Player`] replays a recorded file back through the
//! same [`crate::telnet::Framer`] and [`crate::negotiate::Negotiator`] state
//! machines offline, with no live socket involved.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::negotiate::Negotiator;
use crate::telnet::{Event, Framer};

/// Which side produced a captured chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// One captured chunk: which direction, how many milliseconds after the
/// previous record it was captured, and the raw bytes.
#[derive(Debug, Clone)]
pub struct Record {
    pub direction: Direction,
    pub offset_ms: u64,
    pub bytes: Vec<u8>,
}

/// Appends length-prefixed records to a byte sink. The on-disk format is
/// deliberately simple: `[direction: u8][offset_ms: u64 LE][len: u32
/// LE][bytes]`, repeated.
pub struct Recorder<W: Write> {
    sink: W,
}

impl Recorder<BufWriter<File>> {
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(Self { sink: BufWriter::new(File::create(path)?) })
    }
}

impl<W: Write> Recorder<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub fn record(&mut self, direction: Direction, offset_ms: u64, bytes: &[u8]) -> io::Result<()> {
        let dir_byte = match direction {
            Direction::Inbound => 0u8,
            Direction::Outbound => 1u8,
        };
        self.sink.write_all(&[dir_byte])?;
        self.sink.write_all(&offset_ms.to_le_bytes())?;
        self.sink.write_all(&(bytes.len() as u32).to_le_bytes())?;
        self.sink.write_all(bytes)?;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

/// Reads a recorded file back as a sequence of [`Record`]s.
pub struct Player<R: Read> {
    source: R,
}

impl Player<BufReader<File>> {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self { source: BufReader::new(File::open(path)?) })
    }
}

impl<R: Read> Player<R> {
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Read every record in the file, in capture order.
    pub fn records(mut self) -> io::Result<Vec<Record>> {
        let mut out = Vec::new();
        loop {
            let mut dir_byte = [0u8; 1];
            match self.source.read_exact(&mut dir_byte) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
            let direction = if dir_byte[0] == 0 { Direction::Inbound } else { Direction::Outbound };
            let mut offset_buf = [0u8; 8];
            self.source.read_exact(&mut offset_buf)?;
            let offset_ms = u64::from_le_bytes(offset_buf);
            let mut len_buf = [0u8; 4];
            self.source.read_exact(&mut len_buf)?;
            let len = u32::from_le_bytes(len_buf) as usize;
            let mut bytes = vec![0u8; len];
            self.source.read_exact(&mut bytes)?;
            out.push(Record { direction, offset_ms, bytes });
        }
        Ok(out)
    }

    /// Replay every inbound record's telnet events through a fresh
    /// [`Negotiator`]/[`Framer`] pair offline, returning the decoded events
    /// in capture order. Outbound records (what the session wrote back) are
    /// skipped — this reconstructs what the peer sent, not a live exchange.
    pub fn replay_inbound_events(self, negotiator: &mut Negotiator) -> io::Result<Vec<Event>> {
        let mut framer = Framer::new();
        let mut all = Vec::new();
        for record in self.records()? {
            if record.direction != Direction::Inbound {
                continue;
            }
            for event in framer.feed(&record.bytes) {
                let _ = negotiator.handle(&event);
                all.push(event);
            }
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_round_trip_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.trace");

        let mut recorder = Recorder::create(&path).unwrap();
        recorder.record(Direction::Inbound, 0, &[1, 2, 3]).unwrap();
        recorder.record(Direction::Outbound, 15, &[4, 5]).unwrap();
        recorder.flush().unwrap();

        let player = Player::open(&path).unwrap();
        let records = player.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].direction, Direction::Inbound);
        assert_eq!(records[0].bytes, vec![1, 2, 3]);
        assert_eq!(records[1].offset_ms, 15);
    }

    #[test]
    fn replay_feeds_inbound_bytes_through_the_negotiator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("negotiation.trace");

        let mut recorder = Recorder::create(&path).unwrap();
        recorder
            .record(Direction::Inbound, 0, &crate::telnet::encode_negotiation(crate::telnet::WILL, crate::telnet::OPT_BINARY))
            .unwrap();
        recorder.flush().unwrap();

        let player = Player::open(&path).unwrap();
        let mut negotiator = Negotiator::new("IBM-3279-2-E", 0);
        let events = player.replay_inbound_events(&mut negotiator).unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::Negotiate { command: crate::telnet::WILL, option: crate::telnet::OPT_BINARY }));
    }
}
