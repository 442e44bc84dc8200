//! Recorded packet logs
//!
//! A log is a small header followed by framed packets, all integers little
//! endian:
//!
//! ```text
//! "kct2" | u16 version | u32 blob length | calibration blob
//! { u32 timestamp | u32 sequence | u32 size | payload }*
//! ```
//!
//! There are no checksums. A log ends at a packet header boundary.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use crate::Packet;

/// File signature
pub const MAGIC: [u8; 4] = *b"kct2";

/// Highest understood format version
pub const VERSION: u16 = 1;

/// Size of a packet header: timestamp, sequence, payload size.
pub const PACKET_HEADER_LEN: usize = 12;

// Payload storage grows by at most this much ahead of the bytes read
const READ_CHUNK: usize = 1 << 16;

/// Malformed log header
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum FormatError {
    /// The stream does not start with [`MAGIC`]
    #[error("unknown file type (signature {0:02x?})")]
    Magic([u8; 4]),
    /// The version is newer than [`VERSION`]
    #[error("unknown file version: {0}")]
    Version(u16),
    /// The stream ended inside the log header
    #[error("log header ends in the {0} field")]
    Header(&'static str),
}

/// [`PacketReader`] errors
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ReplayError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Format(#[from] FormatError),
    /// A packet header was complete but its payload was not
    #[error("packet {sequence} truncated: {read} of {size} payload bytes")]
    Truncated { sequence: u32, size: u32, read: usize },
}

/// Read until `buf` is full or the stream ends.
///
/// Returns the number of bytes read.
fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        match r.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(k) => n += k,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(n)
}

fn header_field<T>(r: io::Result<T>, field: &'static str) -> Result<T, ReplayError> {
    r.map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => FormatError::Header(field).into(),
        _ => e.into(),
    })
}

/// Parse the log header: version and calibration blob.
fn read_header<R: Read>(r: &mut R) -> Result<(u16, Vec<u8>), ReplayError> {
    let mut magic = [0; 4];
    if read_full(r, &mut magic)? < magic.len() || magic != MAGIC {
        return Err(FormatError::Magic(magic).into());
    }
    let version = header_field(r.read_u16::<LittleEndian>(), "version")?;
    if version > VERSION {
        return Err(FormatError::Version(version).into());
    }
    let len = header_field(r.read_u32::<LittleEndian>(), "calibration length")?;
    // Don't trust `len` with an allocation up front
    let mut blob = Vec::new();
    r.by_ref().take(len.into()).read_to_end(&mut blob)?;
    if blob.len() != len as usize {
        return Err(FormatError::Header("calibration").into());
    }
    Ok((version, blob))
}

/// Streaming reader of a packet log.
#[derive(Debug)]
pub struct PacketReader<R> {
    inner: R,
    version: u16,
    calibration: Vec<u8>,
}

impl PacketReader<BufReader<File>> {
    /// Open a log file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let reader = Self::new(BufReader::new(file))?;
        log::debug!(
            "opened {} (version {}, {} calibration bytes)",
            path.display(),
            reader.version,
            reader.calibration.len()
        );
        Ok(reader)
    }
}

impl<R: Read> PacketReader<R> {
    /// Validate the header of `inner` and read its calibration blob.
    pub fn new(mut inner: R) -> Result<Self, ReplayError> {
        let (version, calibration) = read_header(&mut inner)?;
        Ok(Self {
            inner,
            version,
            calibration,
        })
    }

    /// Switch to a new log.
    ///
    /// On error the reader is left untouched, including its calibration.
    pub fn reopen(&mut self, mut inner: R) -> Result<(), ReplayError> {
        let (version, calibration) = read_header(&mut inner)?;
        self.inner = inner;
        self.version = version;
        self.calibration = calibration;
        Ok(())
    }

    /// Format version of the current log
    pub fn version(&self) -> u16 {
        self.version
    }

    /// The opaque calibration blob of the current log
    pub fn calibration(&self) -> &[u8] {
        &self.calibration
    }

    /// Read the next packet into `packet`, reusing its storage.
    ///
    /// Returns `Ok(false)` at the end of the log. The end may fall anywhere
    /// inside a packet header. A payload shorter than announced is an error.
    pub fn next_packet(&mut self, packet: &mut Packet) -> Result<bool, ReplayError> {
        let mut header = [0; PACKET_HEADER_LEN];
        let n = read_full(&mut self.inner, &mut header)?;
        if n < header.len() {
            if n != 0 {
                log::warn!("ignoring {n} trailing bytes of an incomplete packet header");
            }
            return Ok(false);
        }
        let timestamp = LittleEndian::read_u32(&header[0..]);
        let sequence = LittleEndian::read_u32(&header[4..]);
        let size = LittleEndian::read_u32(&header[8..]);
        // `size` is untrusted: grow the storage only as the payload arrives
        let mut read = 0;
        while read < size as usize {
            let end = (size as usize).min(packet.capacity().max(read + READ_CHUNK));
            let n = read_full(&mut self.inner, &mut packet.storage(end)[read..])?;
            read += n;
            if read < end {
                break;
            }
        }
        if read < size as usize {
            return Err(ReplayError::Truncated {
                sequence,
                size,
                read,
            });
        }
        packet.commit(timestamp, sequence, read);
        log::trace!("packet {sequence} at {timestamp}: {size} bytes");
        Ok(true)
    }

    /// Give up the underlying source, positioned after the last packet read.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Packet log writer
#[derive(Debug)]
pub struct PacketWriter<W: Write> {
    inner: W,
}

impl PacketWriter<BufWriter<File>> {
    /// Create (truncate) a log file.
    pub fn create(path: impl AsRef<Path>, calibration: &[u8]) -> io::Result<Self> {
        Self::new(BufWriter::new(File::create(path)?), calibration)
    }
}

impl<W: Write> PacketWriter<W> {
    /// Write the log header with the current [`VERSION`].
    pub fn new(mut inner: W, calibration: &[u8]) -> io::Result<Self> {
        inner.write_all(&MAGIC)?;
        inner.write_u16::<LittleEndian>(VERSION)?;
        inner.write_u32::<LittleEndian>(len32(calibration)?)?;
        inner.write_all(calibration)?;
        Ok(Self { inner })
    }

    /// Append a packet.
    pub fn write_packet(&mut self, timestamp: u32, sequence: u32, payload: &[u8]) -> io::Result<()> {
        let mut header = [0; PACKET_HEADER_LEN];
        LittleEndian::write_u32(&mut header[0..], timestamp);
        LittleEndian::write_u32(&mut header[4..], sequence);
        LittleEndian::write_u32(&mut header[8..], len32(payload)?);
        self.inner.write_all(&header)?;
        self.inner.write_all(payload)
    }

    /// Flush and return the sink.
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

fn len32(data: &[u8]) -> io::Result<u32> {
    data.len()
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "record exceeds 4 GiB"))
}
