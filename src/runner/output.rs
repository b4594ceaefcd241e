//! Bounded output capture
//!
//! Streams are always drained to EOF so a chatty program never blocks on a
//! full pipe, but only the first `limit` bytes are kept.

use tokio::io::{AsyncRead, AsyncReadExt};

const CHUNK_SIZE: usize = 8 * 1024;

/// Bytes kept from one stream
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CapturedStream {
    pub bytes: Vec<u8>,
    /// More bytes arrived than the limit allowed
    pub truncated: bool,
}

impl CapturedStream {
    pub fn into_string(self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Read a stream to EOF, keeping at most `limit` bytes
///
/// A read error ends collection; whatever was captured so far is returned.
pub async fn read_bounded<R>(reader: Option<R>, limit: usize) -> CapturedStream
where
    R: AsyncRead + Unpin,
{
    let mut captured = CapturedStream::default();
    let Some(mut reader) = reader else {
        return captured;
    };

    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };

        let room = limit.saturating_sub(captured.bytes.len());
        if n > room {
            captured.truncated = true;
        }
        captured.bytes.extend_from_slice(&chunk[..n.min(room)]);
    }

    captured
}
