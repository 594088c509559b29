//! Word and sentence framing of the RouterOS API protocol
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ExporterError, Result};

/// Upper bound on a single word; anything larger is treated as a corrupt stream
const MAX_WORD_LEN: usize = 16 * 1024 * 1024;

/// Encode a word length using the API's variable-length prefix
pub fn encode_length(len: usize) -> Vec<u8> {
    let l = len as u32;
    match len {
        0..=0x7F => vec![l as u8],
        0x80..=0x3FFF => {
            let v = l | 0x8000;
            vec![(v >> 8) as u8, v as u8]
        }
        0x4000..=0x1F_FFFF => {
            let v = l | 0xC0_0000;
            vec![(v >> 16) as u8, (v >> 8) as u8, v as u8]
        }
        0x20_0000..=0xFFF_FFFF => {
            let v = l | 0xE000_0000;
            vec![(v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8, v as u8]
        }
        _ => vec![0xF0, (l >> 24) as u8, (l >> 16) as u8, (l >> 8) as u8, l as u8],
    }
}

/// Read a variable-length word length
pub async fn read_length<R: AsyncRead + Unpin>(reader: &mut R) -> Result<usize> {
    let first = reader.read_u8().await? as u32;

    let len = if first & 0x80 == 0x00 {
        first
    } else if first & 0xC0 == 0x80 {
        let rest = reader.read_u8().await? as u32;
        ((first & 0x3F) << 8) | rest
    } else if first & 0xE0 == 0xC0 {
        let mut rest = [0u8; 2];
        reader.read_exact(&mut rest).await?;
        ((first & 0x1F) << 16) | (rest[0] as u32) << 8 | rest[1] as u32
    } else if first & 0xF0 == 0xE0 {
        let mut rest = [0u8; 3];
        reader.read_exact(&mut rest).await?;
        ((first & 0x0F) << 24) | (rest[0] as u32) << 16 | (rest[1] as u32) << 8 | rest[2] as u32
    } else if first == 0xF0 {
        reader.read_u32().await?
    } else {
        return Err(ExporterError::Protocol(format!(
            "reserved control byte 0x{:02x} in word length",
            first
        )));
    };

    Ok(len as usize)
}

/// Write all words followed by the zero-length terminator, then flush
pub async fn write_sentence<W, S>(writer: &mut W, words: &[S]) -> Result<()>
where
    W: AsyncWrite + Unpin,
    S: AsRef<str>,
{
    let mut buf = Vec::new();
    for word in words {
        let bytes = word.as_ref().as_bytes();
        buf.extend_from_slice(&encode_length(bytes.len()));
        buf.extend_from_slice(bytes);
    }
    buf.push(0);

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read words until the zero-length terminator
pub async fn read_sentence<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<String>> {
    let mut words = Vec::new();

    loop {
        let len = read_length(reader).await?;
        if len == 0 {
            return Ok(words);
        }
        if len > MAX_WORD_LEN {
            return Err(ExporterError::Protocol(format!(
                "word length {} exceeds limit",
                len
            )));
        }

        let mut word = vec![0u8; len];
        reader.read_exact(&mut word).await?;
        words.push(String::from_utf8_lossy(&word).into_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_length_boundaries() {
        assert_eq!(encode_length(0x00), vec![0x00]);
        assert_eq!(encode_length(0x7F), vec![0x7F]);
        assert_eq!(encode_length(0x80), vec![0x80, 0x80]);
        assert_eq!(encode_length(0x3FFF), vec![0xBF, 0xFF]);
        assert_eq!(encode_length(0x4000), vec![0xC0, 0x40, 0x00]);
        assert_eq!(encode_length(0x20_0000), vec![0xE0, 0x20, 0x00, 0x00]);
        assert_eq!(encode_length(0x1000_0000), vec![0xF0, 0x10, 0x00, 0x00, 0x00]);
    }

    #[tokio::test]
    async fn test_read_length_decodes_each_width() {
        for len in [0x05usize, 0x80, 0x3FFF, 0x4000, 0x1F_FFFF, 0x20_0000, 0x1000_0000] {
            let encoded = encode_length(len);
            let mut reader = encoded.as_slice();
            assert_eq!(read_length(&mut reader).await.unwrap(), len);
        }
    }

    #[tokio::test]
    async fn test_reserved_control_byte_is_rejected() {
        let mut reader: &[u8] = &[0xF8];
        assert!(matches!(
            read_length(&mut reader).await,
            Err(ExporterError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_sentence_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let long_word = format!("=comment={}", "x".repeat(200));

        write_sentence(&mut client, &["/interface/print", long_word.as_str()])
            .await
            .unwrap();

        let words = read_sentence(&mut server).await.unwrap();
        assert_eq!(words, vec!["/interface/print".to_string(), long_word]);
    }

    #[tokio::test]
    async fn test_truncated_sentence_is_an_io_error() {
        let mut reader: &[u8] = &[0x05, b'!', b'd'];
        assert!(matches!(
            read_sentence(&mut reader).await,
            Err(ExporterError::Io(_))
        ));
    }
}
