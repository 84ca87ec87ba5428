//! Reading terminated replies and IEEE 488.2 blocks from a byte stream.

use crate::codec::BlockHeader;
use crate::error::{AppResult, ScpiError};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio::time::timeout;

/// How long to wait for bytes that should already be in flight.
const GRACE: Duration = Duration::from_millis(10);

/// Read up to and including `terminator`.
pub async fn read_line<R>(reader: &mut R, terminator: u8) -> AppResult<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let n = reader.read_until(terminator, &mut line).await?;
    if n == 0 {
        return Err(ScpiError::ConnectionClosed);
    }
    Ok(line)
}

/// Read a complete block reply: header, payload and trailing terminator.
///
/// The returned bytes start with the header so they can go straight to
/// [`crate::codec::parse_ieee_block`]. A definite block is read by length, so its
/// payload may contain the terminator byte. An indefinite (`#0`) block runs to the
/// first terminator.
pub async fn read_block<R>(reader: &mut R, terminator: u8) -> AppResult<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut raw = Vec::new();
    let header = loop {
        if let Some(header) = BlockHeader::parse(&raw)? {
            break header;
        }
        match reader.read_u8().await {
            Ok(byte) => raw.push(byte),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(ScpiError::ConnectionClosed)
            }
            Err(e) => return Err(e.into()),
        }
    };

    match header.payload_len {
        Some(len) => {
            let start = raw.len();
            raw.resize(start + len, 0);
            reader.read_exact(&mut raw[start..]).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    ScpiError::Block(format!("stream ended inside a {} byte payload", len))
                } else {
                    e.into()
                }
            })?;
            consume_terminator(reader, terminator, &mut raw).await?;
        }
        None => {
            reader.read_until(terminator, &mut raw).await?;
        }
    }
    Ok(raw)
}

/// Swallow the terminator after a block if it is already on its way.
async fn consume_terminator<R>(reader: &mut R, terminator: u8, raw: &mut Vec<u8>) -> AppResult<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let next = match timeout(GRACE, reader.fill_buf()).await {
            Ok(Ok(buf)) => buf.first().copied(),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => None,
        };
        match next {
            Some(b'\r') => {
                raw.push(b'\r');
                reader.consume(1);
            }
            Some(b) if b == terminator => {
                raw.push(b);
                reader.consume(1);
                return Ok(());
            }
            _ => return Ok(()),
        }
    }
}

/// Drop whatever the instrument sent that nobody read.
///
/// Only bytes that are already available are taken; this never waits for more.
/// Returns the number of bytes discarded.
pub async fn discard_pending<R>(reader: &mut R) -> AppResult<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut discarded = 0;
    loop {
        match timeout(Duration::ZERO, reader.fill_buf()).await {
            Ok(Ok(buf)) if !buf.is_empty() => {
                let len = buf.len();
                reader.consume(len);
                discarded += len;
            }
            Ok(Ok(_)) | Err(_) => break,
            Ok(Err(e)) => return Err(e.into()),
        }
    }
    if discarded > 0 {
        tracing::debug!("Flushed {} stale bytes from stream", discarded);
    }
    Ok(discarded)
}

/// Reply text without terminator or surrounding whitespace.
pub fn reply_text(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim().to_string()
}
