//! Server-side prepared statements.
//!
//! A [`Vm`] mutably borrows its connection for its whole life, so only one
//! prepared statement can exist per connection at a time and it can never
//! outlive the session that owns it.

use crate::connection::Connection;
use crate::cursor::Cursor;
use crate::error::Result;
use crate::protocol::constants::*;

/// A prepared statement handle.
///
/// Created by [`Connection::prepare`]; bind parameters with the `bind_*`
/// methods (1-based indexes), then run it with [`execute`](Vm::execute) or
/// [`select`](Vm::select), and release it with [`close`](Vm::close).
pub struct Vm<'a> {
    pub(crate) conn: &'a mut Connection,
}

impl<'a> Vm<'a> {
    /// Bind an integer parameter.
    pub async fn bind_int(&mut self, index: u16, value: i32) -> Result<()> {
        self.bind_value(index, BIND_INTEGER, Some(value.to_string().as_bytes()), 0)
            .await
    }

    /// Bind a 64-bit integer parameter.
    pub async fn bind_int64(&mut self, index: u16, value: i64) -> Result<()> {
        self.bind_value(index, BIND_INT64, Some(value.to_string().as_bytes()), 0)
            .await
    }

    /// Bind a floating-point parameter.
    pub async fn bind_double(&mut self, index: u16, value: f64) -> Result<()> {
        self.bind_value(index, BIND_DOUBLE, Some(value.to_string().as_bytes()), 0)
            .await
    }

    /// Bind a text parameter.
    pub async fn bind_text(&mut self, index: u16, value: &str) -> Result<()> {
        self.bind_value(index, BIND_TEXT, Some(value.as_bytes()), 0)
            .await
    }

    /// Bind a blob parameter.
    pub async fn bind_blob(&mut self, index: u16, value: &[u8]) -> Result<()> {
        self.bind_value(index, BIND_BLOB, Some(value), 0).await
    }

    /// Bind SQL NULL.
    pub async fn bind_null(&mut self, index: u16) -> Result<()> {
        self.bind_value(index, BIND_NULL, None, 0).await
    }

    /// Bind a zero-filled blob of `len` bytes without sending the bytes.
    pub async fn bind_zeroblob(&mut self, index: u16, len: u32) -> Result<()> {
        self.bind_value(index, BIND_ZEROBLOB, None, len).await
    }

    /// One VM_BIND round trip. NULL and zero-blob binds carry no payload;
    /// the zero-blob target length travels in `expandedSize`.
    async fn bind_value(
        &mut self,
        index: u16,
        bind_type: u8,
        value: Option<&[u8]>,
        zeroblob_len: u32,
    ) -> Result<()> {
        self.conn.clear_error();
        let result = async {
            let stream = self.conn.stream_mut();
            let mut header;
            match value {
                Some(data) => {
                    let size = data.len() as u32;
                    header = stream.request_header(size + 4, 1, COMMAND_VM_BIND, NO_SELECTOR);
                    header.flag3 = bind_type;
                    header.reserved1 = index;
                    stream.write_frame(&header, &[size], &[data]).await?;
                }
                None => {
                    header = stream.request_header(0, 0, COMMAND_VM_BIND, NO_SELECTOR);
                    header.flag3 = bind_type;
                    header.reserved1 = index;
                    header.expanded_size = zeroblob_len;
                    stream.write_frame(&header, &[], &[]).await?;
                }
            }
            stream.read_frame(None, None).await?;
            Ok(())
        }
        .await;
        self.conn.record(result)
    }

    /// Send a bodyless VM command and read the plain reply.
    async fn simple_command(&mut self, command: u8) -> Result<()> {
        self.conn.clear_error();
        let result = async {
            let stream = self.conn.stream_mut();
            let header = stream.request_header(0, 0, command, NO_SELECTOR);
            stream.write_frame(&header, &[], &[]).await?;
            stream.read_frame(None, None).await?;
            Ok(())
        }
        .await;
        self.conn.record(result)
    }

    /// Run the statement for its side effects.
    pub async fn execute(&mut self) -> Result<()> {
        self.simple_command(COMMAND_VM_EXECUTE).await
    }

    /// Run the statement and read its result set.
    pub async fn select(&mut self) -> Result<Cursor> {
        self.conn.clear_error();
        let result = async {
            let stream = self.conn.stream_mut();
            let header = stream.request_header(0, 0, COMMAND_VM_SELECT, NO_SELECTOR);
            stream.write_frame(&header, &[], &[]).await?;
            self.conn.read_cursor().await
        }
        .await;
        self.conn.record(result)
    }

    /// Release the statement on the server.
    pub async fn close(mut self) -> Result<()> {
        self.simple_command(COMMAND_VM_CLOSE).await
    }
}
