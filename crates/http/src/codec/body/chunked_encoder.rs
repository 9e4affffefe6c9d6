//! `Transfer-Encoding: chunked` response bodies, see
//! [RFC 9112 Section 7.1](https://www.rfc-editor.org/rfc/rfc9112#section-7.1).

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::Encoder;

use crate::protocol::{PayloadItem, SendError};

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkedEncoder {
    eof: bool,
}

impl ChunkedEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for ChunkedEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if self.eof {
            return Ok(());
        }

        match item {
            // an empty chunk would read as the terminating one
            PayloadItem::Chunk(bytes) if !bytes.has_remaining() => {}
            PayloadItem::Chunk(bytes) => {
                let size = bytes.remaining();
                dst.reserve(size + 20);
                put_hex(dst, size);
                dst.put_slice(b"\r\n");
                dst.put_slice(bytes.chunk());
                dst.put_slice(b"\r\n");
            }
            PayloadItem::Eof => {
                self.eof = true;
                dst.put_slice(b"0\r\n\r\n");
            }
        }
        Ok(())
    }
}

fn put_hex(dst: &mut BytesMut, mut value: usize) {
    let mut digits = [0u8; 16];
    let mut start = digits.len();
    loop {
        start -= 1;
        digits[start] = HEX_DIGITS[value & 0xF];
        value >>= 4;
        if value == 0 {
            break;
        }
    }
    dst.put_slice(&digits[start..]);
}
