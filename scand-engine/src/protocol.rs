//! Length-prefixed binary framing between the driver and the `scand-worker`
//! child process.
//!
//! Request: `[path_len: u32 LE][base_index: u32 LE][update_id: i64 LE][path_bytes]`.
//! `path_len == u32::MAX` is the shutdown sentinel (no further fields).
//! Reply: `[status: i32 LE]`.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const SHUTDOWN_SENTINEL: u32 = u32::MAX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Parse the file at `path`. `base_index` is the position of this
    /// path's scan root in the driver's root table, passed through so the
    /// worker can report results against the right category/root.
    /// `update_id` is the current scan's generation counter, stamped onto
    /// every row the worker touches.
    Process { base_index: u32, update_id: i64, path: Vec<u8> },
    Shutdown,
}

/// The worker's per-file outcome, wire-compatible with [`scand_common::events::ScanStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ReplyStatus {
    Processed = 0,
    ParseError = 1,
    Skipped = 2,
}

impl ReplyStatus {
    fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Processed),
            1 => Some(Self::ParseError),
            2 => Some(Self::Skipped),
            _ => None,
        }
    }
}

pub async fn write_request<W: AsyncWrite + Unpin>(
    writer: &mut W,
    request: &Request,
) -> std::io::Result<()> {
    match request {
        Request::Shutdown => {
            writer.write_u32_le(SHUTDOWN_SENTINEL).await?;
        }
        Request::Process { base_index, update_id, path } => {
            writer.write_u32_le(path.len() as u32).await?;
            writer.write_u32_le(*base_index).await?;
            writer.write_i64_le(*update_id).await?;
            writer.write_all(path).await?;
        }
    }
    writer.flush().await
}

/// Read one request. Returns `Ok(None)` on clean EOF (driver closed the pipe).
pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> std::io::Result<Option<Request>> {
    let path_len = match reader.read_u32_le().await {
        Ok(value) => value,
        Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(error) => return Err(error),
    };

    if path_len == SHUTDOWN_SENTINEL {
        return Ok(Some(Request::Shutdown));
    }

    let base_index = reader.read_u32_le().await?;
    let update_id = reader.read_i64_le().await?;
    let mut path = vec![0u8; path_len as usize];
    reader.read_exact(&mut path).await?;
    Ok(Some(Request::Process { base_index, update_id, path }))
}

pub async fn write_reply<W: AsyncWrite + Unpin>(
    writer: &mut W,
    status: ReplyStatus,
) -> std::io::Result<()> {
    writer.write_i32_le(status as i32).await?;
    writer.flush().await
}

/// Read one reply. Returns `Ok(None)` on clean EOF (worker pipe closed,
/// typically because the process died or was killed).
pub async fn read_reply<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> std::io::Result<Option<ReplyStatus>> {
    let raw = match reader.read_i32_le().await {
        Ok(value) => value,
        Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(error) => return Err(error),
    };
    ReplyStatus::from_i32(raw)
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "unknown reply status"))
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_process_request() {
        let mut buf = Vec::new();
        let request = Request::Process { base_index: 3, update_id: 42, path: b"/music/a.mp3".to_vec() };
        write_request(&mut buf, &request).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let decoded = read_request(&mut cursor).await.unwrap().unwrap();
        assert_eq!(decoded, request);
    }

    #[tokio::test]
    async fn round_trips_shutdown_sentinel() {
        let mut buf = Vec::new();
        write_request(&mut buf, &Request::Shutdown).await.unwrap();
        assert_eq!(buf.len(), 4);

        let mut cursor = std::io::Cursor::new(buf);
        let decoded = read_request(&mut cursor).await.unwrap().unwrap();
        assert_eq!(decoded, Request::Shutdown);
    }

    #[tokio::test]
    async fn read_request_on_empty_stream_is_eof() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        assert_eq!(read_request(&mut cursor).await.unwrap(), None);
    }

    #[tokio::test]
    async fn round_trips_reply_status() {
        let mut buf = Vec::new();
        write_reply(&mut buf, ReplyStatus::ParseError).await.unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        assert_eq!(read_reply(&mut cursor).await.unwrap(), Some(ReplyStatus::ParseError));
    }
}
