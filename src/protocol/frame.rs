//! Request/reply framing over the transport.
//!
//! Every exchange is a fixed header followed by `packetSize` payload bytes.
//! Once a session key is installed, request payloads travel as a random IV
//! block followed by AES-CBC ciphertext of (size array ‖ fields), and reply
//! payloads are decrypted in place before the optional zlib inflate.

use bytes::{Bytes, BytesMut};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::trace;
use std::io::Write;

use crate::error::{Error, Result};
use crate::protocol::constants::*;
use crate::protocol::crypto::{self, SessionCrypto};
use crate::protocol::header::Header;
use crate::protocol::net::NetStream;

/// A decoded reply.
pub struct Frame {
    pub header: Header,
    pub payload: Bytes,
    /// The frame carried the reserved end-of-stream code instead of data.
    pub end_chunk: bool,
}

/// Framed, optionally encrypted exchange over a [`NetStream`].
pub struct FrameStream {
    net: NetStream,
    crypto: Option<SessionCrypto>,
    old_protocol: bool,
}

impl FrameStream {
    pub fn new(net: NetStream, old_protocol: bool) -> Self {
        Self {
            net,
            crypto: None,
            old_protocol,
        }
    }

    /// Whether the session key has been installed.
    pub fn is_encrypted(&self) -> bool {
        self.crypto.is_some()
    }

    pub fn old_protocol(&self) -> bool {
        self.old_protocol
    }

    /// Install the session key; subsequent frames are encrypted.
    pub fn install_crypto(&mut self, crypto: SessionCrypto) {
        self.crypto = Some(crypto);
    }

    /// Shut the transport down.
    pub async fn shutdown(&mut self) {
        self.net.shutdown().await;
    }

    /// Build a request header for `command`/`selector` with `packet_size`
    /// payload bytes in `num_fields` fields.
    ///
    /// When session encryption is active and the request has a payload, the
    /// advertised size is inflated by the IV block the payload will carry.
    pub fn request_header(
        &self,
        packet_size: u32,
        num_fields: u32,
        command: u8,
        selector: u8,
    ) -> Header {
        let mut header = Header {
            signature: PROTOCOL_SIGNATURE,
            packet_size,
            command,
            selector,
            flag1: CLIENT_SUPPORT_COMPRESSION,
            encrypted: self
                .crypto
                .as_ref()
                .map_or(ENCRYPTION_NONE, |c| c.mode.wire_code()),
            num_fields,
            timeout: self.net.timeout().as_secs() as u32,
            protocol_version: if self.old_protocol {
                PROTOCOL_2007
            } else {
                PROTOCOL_2011
            },
            ..Header::default()
        };
        if packet_size != 0 && self.crypto.is_some() {
            header.packet_size += BLOCK_LEN as u32;
        }
        header
    }

    /// Send a request: header, then the big-endian size array and the fields,
    /// encrypted as one unit when a session key is active.
    pub async fn write_frame(
        &mut self,
        header: &Header,
        sizes: &[u32],
        fields: &[&[u8]],
    ) -> Result<()> {
        trace!(
            "send command={} selector={} size={}",
            header.command,
            header.selector,
            header.packet_size
        );
        let mut body = Vec::with_capacity(
            sizes.len() * 4 + fields.iter().map(|f| f.len()).sum::<usize>(),
        );
        for size in sizes {
            body.extend_from_slice(&size.to_be_bytes());
        }
        for field in fields {
            body.extend_from_slice(field);
        }

        let mut wire = Vec::with_capacity(HEADER_SIZE + body.len() + BLOCK_LEN);
        wire.extend_from_slice(&header.to_bytes());
        if body.is_empty() {
            // nothing to encrypt
        } else if let Some(crypto) = &self.crypto {
            let iv = crypto::random_iv();
            wire.extend_from_slice(&crypto::encrypt(&crypto.encrypt_key, &iv, &body));
        } else {
            wire.extend_from_slice(&body);
        }
        self.net.write_all(&wire).await
    }

    /// Read one reply frame.
    ///
    /// `expected_size`/`expected_fields` are checked against the header when
    /// the reply is not an error. A frame whose `errorCode` is the reserved
    /// end-of-stream value is returned with `end_chunk` set and an empty
    /// payload; any other non-zero `errorCode` is surfaced as
    /// [`Error::Server`], with the payload (if any) as the message.
    pub async fn read_frame(
        &mut self,
        expected_size: Option<u32>,
        expected_fields: Option<u32>,
    ) -> Result<Frame> {
        let mut raw = [0u8; HEADER_SIZE];
        self.net.read_exact(&mut raw).await?;
        let header = Header::parse(&raw)?;

        let mut error_code = header.error_code;
        let end_chunk = error_code == END_CHUNK;
        if end_chunk {
            error_code = 0;
        }
        trace!(
            "recv size={} fields={} error={} end_chunk={}",
            header.packet_size,
            header.num_fields,
            error_code,
            end_chunk
        );

        if error_code == 0 {
            if let Some(expected) = expected_size {
                if expected != header.packet_size {
                    return Err(Error::wrong_header(format!(
                        "unexpected packet size {} (expected {})",
                        header.packet_size, expected
                    )));
                }
            }
            if let Some(expected) = expected_fields {
                if expected != header.num_fields {
                    return Err(Error::wrong_header(format!(
                        "unexpected field count {} (expected {})",
                        header.num_fields, expected
                    )));
                }
            }
        }

        if error_code != 0 {
            let message = if header.packet_size > 0 {
                let payload = self.read_payload(&header).await?;
                let text = payload.strip_suffix(&[0u8]).unwrap_or(&payload);
                String::from_utf8_lossy(text).into_owned()
            } else {
                String::new()
            };
            return Err(Error::Server {
                code: error_code,
                message,
            });
        }

        if end_chunk || header.packet_size == 0 {
            return Ok(Frame {
                header,
                payload: Bytes::new(),
                end_chunk,
            });
        }

        let payload = self.read_payload(&header).await?;
        Ok(Frame {
            header,
            payload,
            end_chunk: false,
        })
    }

    /// Read, decrypt and decompress the payload announced by `header`.
    async fn read_payload(&mut self, header: &Header) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(header.packet_size as usize);
        self.net.read_exact(&mut buf).await?;

        if header.encrypted != ENCRYPTION_NONE {
            let crypto = self.crypto.as_ref().ok_or_else(|| {
                Error::wrong_header("encrypted reply on a cleartext session".to_string())
            })?;
            if buf.len() < BLOCK_LEN {
                return Err(Error::wrong_header(
                    "encrypted payload shorter than one block".to_string(),
                ));
            }
            let plain = crypto::decrypt(&crypto.decrypt_key, &buf);
            buf = BytesMut::from(&plain[..]);
        }

        if header.has_flag1(SERVER_COMPRESSED_PACKET) {
            let expanded = header.expanded_size as usize;
            let mut out = Vec::with_capacity(expanded);
            let mut decoder = flate2::read::ZlibDecoder::new(&buf[..]);
            std::io::Read::read_to_end(&mut decoder, &mut out).map_err(|e| Error::Decompress {
                message: e.to_string(),
            })?;
            if out.len() != expanded {
                return Err(Error::Decompress {
                    message: format!("expanded to {} bytes, expected {}", out.len(), expanded),
                });
            }
            buf = BytesMut::from(&out[..]);
        }

        Ok(buf.freeze())
    }

    /// Send a SQL statement as the single field of `command`.
    pub async fn send_statement(
        &mut self,
        command: u8,
        sql: &str,
        server_side: bool,
    ) -> Result<()> {
        let mut data = Vec::with_capacity(sql.len() + 1);
        data.extend_from_slice(sql.as_bytes());
        data.push(0);
        let size = data.len() as u32;
        let mut header = self.request_header(size + 4, 1, command, NO_SELECTOR);
        if command == COMMAND_SELECT && server_side {
            header.set_flag1(CLIENT_REQUEST_SERVER_SIDE);
        }
        self.write_frame(&header, &[size], &[&data]).await
    }

    /// Send one data chunk (raw streaming). The chunk command carries no size
    /// array even though the header advertises one field.
    pub async fn send_chunk(&mut self, data: &[u8]) -> Result<()> {
        let (body, compressed) = maybe_compress(data);
        let mut header = self.request_header(body.len() as u32, 1, COMMAND_CHUNK, NO_SELECTOR);
        header.set_flag1(CLIENT_PARTIAL_PACKET);
        if compressed {
            header.set_flag1(CLIENT_COMPRESSED_PACKET);
            header.expanded_size = data.len() as u32;
        }
        self.write_frame(&header, &[], &[&body]).await
    }

    /// Send one bind-parameter step of the chunked bind subprotocol.
    pub async fn send_bind_step(
        &mut self,
        data: &[u8],
        bind_type: u8,
        zeroblob_len: Option<u32>,
    ) -> Result<()> {
        let (body, compressed) = maybe_compress(data);
        let mut header =
            self.request_header(body.len() as u32, 1, COMMAND_CHUNK_BIND, BIND_STEP);
        header.flag3 = bind_type;
        header.set_flag1(CLIENT_PARTIAL_PACKET);
        if compressed {
            header.set_flag1(CLIENT_COMPRESSED_PACKET);
            header.expanded_size = data.len() as u32;
        }
        if let Some(len) = zeroblob_len {
            header.expanded_size = len;
        }
        self.write_frame(&header, &[], &[&body]).await
    }

    /// Acknowledge a received chunk. Fire-and-forget: the peer's next frame
    /// is the continuation of the stream.
    pub async fn ack_chunk(&mut self, selector: u8) -> Result<()> {
        let header = self.request_header(0, 0, COMMAND_CHUNK, selector);
        self.write_frame(&header, &[], &[]).await
    }

    /// Terminate an outgoing chunk stream and read the final reply.
    pub async fn end_chunk(&mut self) -> Result<Frame> {
        let header = self.request_header(0, 0, COMMAND_ENDCHUNK, NO_SELECTOR);
        self.write_frame(&header, &[], &[]).await?;
        self.read_frame(None, None).await
    }

    /// Finalize or abort a bind sequence and read the result frame.
    pub async fn finish_bind(&mut self, selector: u8) -> Result<Frame> {
        let header = self.request_header(0, 0, COMMAND_CHUNK_BIND, selector);
        self.write_frame(&header, &[], &[]).await?;
        self.read_frame(None, None).await
    }
}

/// zlib-compress `data`, keeping the result only when it is smaller.
fn maybe_compress(data: &[u8]) -> (Vec<u8>, bool) {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    let compressed = encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .ok()
        .filter(|c| c.len() < data.len());
    match compressed {
        Some(c) => (c, true),
        None => (data.to_vec(), false),
    }
}
