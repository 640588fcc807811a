//! `Content-Length`-framed message read/write, the wire framing LSP and
//! several backend protocols (sourcekit-lsp, clangd) both use.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::{CoreError, CoreResult};

pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, body: &[u8]) -> CoreResult<()> {
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one `Content-Length`-framed message, returning `None` on a
/// clean EOF (the child process exited).
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut BufReader<R>) -> CoreResult<Option<Vec<u8>>> {
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some(value) = trimmed.strip_prefix("Content-Length:") {
            content_length = Some(
                value
                    .trim()
                    .parse()
                    .map_err(|_| CoreError::Dispatch("malformed Content-Length header".into()))?,
            );
        }
    }
    let content_length =
        content_length.ok_or_else(|| CoreError::Dispatch("message missing Content-Length header".into()))?;
    let mut body = vec![0u8; content_length];
    tokio::io::AsyncReadExt::read_exact(reader, &mut body).await?;
    Ok(Some(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader as TokioBufReader;

    #[tokio::test]
    async fn write_then_read_roundtrips_body() {
        let mut buf: Vec<u8> = Vec::new();
        write_message(&mut buf, b"{\"hello\":true}").await.unwrap();
        let mut reader = TokioBufReader::new(buf.as_slice());
        let body = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(body, b"{\"hello\":true}");
    }

    #[tokio::test]
    async fn read_on_empty_stream_is_clean_eof() {
        let mut reader = TokioBufReader::new(&b""[..]);
        assert!(read_message(&mut reader).await.unwrap().is_none());
    }
}
