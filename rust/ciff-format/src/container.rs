//! Outer container handling: CIFF exports are commonly shipped gzip-compressed
//! (`index.ciff.gz`), occasionally zstd-compressed or raw.

use std::{
    fs::File,
    io::{self, BufRead, BufReader, Read},
    path::Path,
};

/// Read buffer size used for both the compressed and the decompressed side.
pub const READ_BUFFER_SIZE: usize = 128 * 1024;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Compression of a CIFF container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Zstd,
}

impl Compression {
    /// Detects the compression from the leading bytes of the stream without
    /// consuming them.
    pub fn detect<R: BufRead>(reader: &mut R) -> io::Result<Compression> {
        let prefix = reader.fill_buf()?;
        if prefix.starts_with(&ZSTD_MAGIC) {
            Ok(Compression::Zstd)
        } else if prefix.starts_with(&GZIP_MAGIC) {
            Ok(Compression::Gzip)
        } else {
            Ok(Compression::None)
        }
    }
}

/// Boxed, decompressed byte stream of a CIFF container.
pub type ContainerStream = Box<dyn BufRead + Send>;

/// Wraps `reader` into a decompressing, buffered stream according to the
/// detected container compression.
pub fn open_stream<R>(reader: R) -> io::Result<(Compression, ContainerStream)>
where
    R: Read + Send + 'static,
{
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, reader);
    let compression = Compression::detect(&mut reader)?;
    let stream: ContainerStream = match compression {
        Compression::None => Box::new(reader),
        Compression::Gzip => Box::new(BufReader::with_capacity(
            READ_BUFFER_SIZE,
            flate2::bufread::MultiGzDecoder::new(reader),
        )),
        Compression::Zstd => Box::new(BufReader::with_capacity(
            READ_BUFFER_SIZE,
            zstd::stream::read::Decoder::with_buffer(reader)?,
        )),
    };
    Ok((compression, stream))
}

/// Opens a CIFF container file.
pub fn open_file(path: impl AsRef<Path>) -> io::Result<(Compression, ContainerStream)> {
    let file = File::open(path.as_ref())?;
    open_stream(file)
}
