//! High-level connection API.

use bytes::Bytes;
use log::debug;
use std::time::Duration;

use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::protocol::constants::*;
use crate::protocol::crypto::AesMode;
use crate::protocol::frame::FrameStream;
use crate::protocol::handshake::{self, Credentials};
use crate::protocol::net::{self, CancelHandle, NetStream, TlsOptions, Transport};
use crate::vm::Vm;

/// Requested channel protection.
///
/// The TLS variants select an outer tunnel on the client side only; the
/// server sees just the AES mode. Legacy integer inputs 128/192/256 are
/// accepted as synonyms for the AES modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encryption {
    #[default]
    None,
    Aes128,
    Aes192,
    Aes256,
    Ssl,
    SslAes128,
    SslAes192,
    SslAes256,
}

impl Encryption {
    /// Accept the wire codes plus the legacy key-length synonyms.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            2 | 128 => Some(Self::Aes128),
            3 | 192 => Some(Self::Aes192),
            4 | 256 => Some(Self::Aes256),
            8 => Some(Self::Ssl),
            10 => Some(Self::SslAes128),
            11 => Some(Self::SslAes192),
            12 => Some(Self::SslAes256),
            _ => None,
        }
    }

    /// Whether the outer TLS tunnel is requested.
    pub fn is_tls(self) -> bool {
        matches!(
            self,
            Self::Ssl | Self::SslAes128 | Self::SslAes192 | Self::SslAes256
        )
    }

    /// The application-layer AES mode, if any.
    pub fn aes_mode(self) -> Option<AesMode> {
        match self {
            Self::Aes128 | Self::SslAes128 => Some(AesMode::Aes128),
            Self::Aes192 | Self::SslAes192 => Some(AesMode::Aes192),
            Self::Aes256 | Self::SslAes256 => Some(AesMode::Aes256),
            Self::None | Self::Ssl => None,
        }
    }
}

/// A value bound to one `?` placeholder by [`Connection::bind`].
#[derive(Debug, Clone, Copy)]
pub enum BindValue<'a> {
    Int(i32),
    Int64(i64),
    Double(f64),
    Text(&'a str),
    Blob(&'a [u8]),
    Null,
    /// A zero-filled blob of the given length; no bytes travel.
    ZeroBlob(u32),
}

impl BindValue<'_> {
    fn type_code(&self) -> u8 {
        match self {
            Self::Int(_) => BIND_INTEGER,
            Self::Int64(_) => BIND_INT64,
            Self::Double(_) => BIND_DOUBLE,
            Self::Text(_) => BIND_TEXT,
            Self::Blob(_) => BIND_BLOB,
            Self::Null => BIND_NULL,
            Self::ZeroBlob(_) => BIND_ZEROBLOB,
        }
    }

    /// Bytes for the bind step. Textual values carry their NUL terminator;
    /// NULL and zero-blob carry nothing.
    fn encode(&self) -> (Vec<u8>, Option<u32>) {
        fn with_nul(bytes: &[u8]) -> Vec<u8> {
            let mut out = Vec::with_capacity(bytes.len() + 1);
            out.extend_from_slice(bytes);
            out.push(0);
            out
        }
        match self {
            Self::Int(v) => (with_nul(v.to_string().as_bytes()), None),
            Self::Int64(v) => (with_nul(v.to_string().as_bytes()), None),
            Self::Double(v) => (with_nul(v.to_string().as_bytes()), None),
            Self::Text(v) => (with_nul(v.as_bytes()), None),
            Self::Blob(v) => (v.to_vec(), None),
            Self::Null => (Vec::new(), None),
            Self::ZeroBlob(len) => (Vec::new(), Some(*len)),
        }
    }
}

/// Connection parameters, built with `ConnectParams::new(...)` plus the
/// `with_*` setters.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
    pub encryption: Encryption,
    pub token: Option<String>,
    pub old_protocol: bool,
    pub tls: Option<TlsOptions>,
}

impl ConnectParams {
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            password: password.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            encryption: Encryption::None,
            token: None,
            old_protocol: false,
            tls: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_encryption(mut self, encryption: Encryption) -> Self {
        self.encryption = encryption;
        self
    }

    /// Bearer token sent alongside (or in place of) the password proof.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.is_empty()).then_some(token);
        self
    }

    /// Speak the 2007 protocol revision, which sends identifiers unhashed.
    pub fn with_old_protocol(mut self, old: bool) -> Self {
        self.old_protocol = old;
        self
    }

    pub fn with_tls(mut self, tls: TlsOptions) -> Self {
        self.tls = Some(tls);
        self
    }
}

type TraceFn = Box<dyn Fn(&str) + Send>;

/// An authenticated session with a CubeSQL server.
///
/// A connection runs one statement at a time; `&mut self` on every operation
/// enforces that. Cancel a blocked operation from elsewhere with the handle
/// from [`cancel_handle`](Connection::cancel_handle).
pub struct Connection {
    stream: FrameStream,
    cancel: CancelHandle,
    last_error: Option<(i32, String)>,
    trace: Option<TraceFn>,
}

impl Connection {
    /// Connect and authenticate.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use cubesql_rs::{Connection, ConnectParams, Encryption};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let params = ConnectParams::new("localhost", "admin", "admin")
    ///         .with_encryption(Encryption::Aes128);
    ///     let mut conn = Connection::connect(params).await?;
    ///     conn.execute("CREATE TABLE t (a INTEGER);").await?;
    ///     conn.disconnect(true).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(params: ConnectParams) -> Result<Self> {
        if params.host.is_empty() {
            return Err(Error::parameter("host must not be empty"));
        }
        if params.username.is_empty() {
            return Err(Error::parameter("username must not be empty"));
        }

        let socket = net::connect_socket(&params.host, params.port, params.timeout).await?;
        let transport = if params.encryption.is_tls() {
            net::upgrade_tls(socket, &params.host, params.tls.as_ref()).await?
        } else {
            Transport::Plain(socket)
        };

        let (net, cancel) = NetStream::new(transport, params.timeout);
        let mut stream = FrameStream::new(net, params.old_protocol);

        let creds = Credentials::new(&params.username, &params.password);
        handshake::authenticate(
            &mut stream,
            &creds,
            params.token.as_deref(),
            params.encryption.aes_mode(),
        )
        .await?;
        debug!("connected to {}:{}", params.host, params.port);

        Ok(Self {
            stream,
            cancel,
            last_error: None,
            trace: None,
        })
    }

    /// A handle that aborts the operation currently blocked on this
    /// connection; usable from any task or thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Register a callback invoked with every statement sent.
    pub fn set_trace_callback(&mut self, trace: TraceFn) {
        self.trace = Some(trace);
    }

    /// Code and message of the last failed operation, if any.
    pub fn last_error(&self) -> Option<(i32, &str)> {
        self.last_error.as_ref().map(|(code, msg)| (*code, msg.as_str()))
    }

    pub(crate) fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub(crate) fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.last_error = Some((e.code(), e.to_string()));
        }
        result
    }

    pub(crate) fn stream_mut(&mut self) -> &mut FrameStream {
        &mut self.stream
    }

    fn trace_sql(&self, sql: &str) {
        debug!("sql: {sql}");
        if let Some(trace) = &self.trace {
            trace(sql);
        }
    }

    /// Run a statement for its side effects.
    pub async fn execute(&mut self, sql: &str) -> Result<()> {
        self.clear_error();
        let result = self.execute_inner(sql).await;
        self.record(result)
    }

    async fn execute_inner(&mut self, sql: &str) -> Result<()> {
        self.trace_sql(sql);
        self.stream.send_statement(COMMAND_EXECUTE, sql, false).await?;
        self.stream.read_frame(None, None).await?;
        Ok(())
    }

    /// Run a query and materialize its result set.
    pub async fn select(&mut self, sql: &str) -> Result<Cursor> {
        self.clear_error();
        let result = self.select_inner(sql, false).await;
        self.record(result)
    }

    /// Run a query as a server-side cursor: rows are fetched one at a time
    /// with [`step`](Connection::step).
    pub async fn select_server_side(&mut self, sql: &str) -> Result<Cursor> {
        self.clear_error();
        let result = self.select_inner(sql, true).await;
        self.record(result)
    }

    async fn select_inner(&mut self, sql: &str, server_side: bool) -> Result<Cursor> {
        self.trace_sql(sql);
        self.stream
            .send_statement(COMMAND_SELECT, sql, server_side)
            .await?;
        self.read_cursor().await
    }

    /// Consume a cursor reply: the initial frame, then (for chunked replies)
    /// one frame per chunk with a CHUNK_OK acknowledgement in between, until
    /// the end-of-stream frame.
    pub(crate) async fn read_cursor(&mut self) -> Result<Cursor> {
        let frame = self.stream.read_frame(None, None).await?;
        if frame.end_chunk {
            return Ok(Cursor::empty());
        }
        let mut cursor = Cursor::from_initial_frame(&frame.header, frame.payload)?;
        if cursor.is_server_side() || !frame.header.has_flag1(SERVER_PARTIAL_PACKET) {
            return Ok(cursor);
        }

        loop {
            self.stream.ack_chunk(CHUNK_OK).await?;
            let frame = self.stream.read_frame(None, None).await?;
            if frame.end_chunk {
                debug!("cursor complete, {} rows", cursor.rows_fetched());
                return Ok(cursor);
            }
            cursor.append_frame(&frame.header, frame.payload)?;
        }
    }

    /// Fetch the next row of a server-side cursor.
    ///
    /// Returns `false` once the cursor is exhausted, after which the cursor's
    /// eof flag is set.
    pub async fn step(&mut self, cursor: &mut Cursor) -> Result<bool> {
        self.clear_error();
        let result = self.step_inner(cursor).await;
        self.record(result)
    }

    async fn step_inner(&mut self, cursor: &mut Cursor) -> Result<bool> {
        if !cursor.is_server_side() {
            return Err(Error::parameter("step requires a server-side cursor"));
        }
        if cursor.is_eof() {
            return Ok(false);
        }
        let header = self
            .stream
            .request_header(0, 0, COMMAND_CURSOR_STEP, NO_SELECTOR);
        self.stream.write_frame(&header, &[], &[]).await?;

        let frame = self.stream.read_frame(None, None).await?;
        if frame.end_chunk {
            cursor.set_eof();
            return Ok(false);
        }
        cursor.append_frame(&frame.header, frame.payload)?;
        cursor.note_stepped();
        Ok(true)
    }

    /// Release a cursor. Server-side cursors are also closed on the server.
    pub async fn close_cursor(&mut self, cursor: Cursor) -> Result<()> {
        if !cursor.is_server_side() {
            return Ok(());
        }
        self.clear_error();
        let header = self
            .stream
            .request_header(0, 0, COMMAND_CURSOR_CLOSE, NO_SELECTOR);
        let result = async {
            self.stream.write_frame(&header, &[], &[]).await?;
            self.stream.read_frame(None, None).await?;
            Ok(())
        }
        .await;
        self.record(result)
    }

    /// Prepare a statement; the returned handle borrows this connection.
    pub async fn prepare(&mut self, sql: &str) -> Result<Vm<'_>> {
        self.clear_error();
        self.trace_sql(sql);
        let result = async {
            self.stream
                .send_statement(COMMAND_VM_PREPARE, sql, false)
                .await?;
            self.stream.read_frame(None, None).await?;
            Ok(())
        }
        .await;
        self.record(result)?;
        Ok(Vm { conn: self })
    }

    /// Execute a statement binding `values` to its placeholders through the
    /// chunked bind subprotocol: the SQL travels first, then one acknowledged
    /// step per value, then the finalize that runs the statement. On error a
    /// best-effort abort is sent before reporting.
    pub async fn bind(&mut self, sql: &str, values: &[BindValue<'_>]) -> Result<()> {
        self.clear_error();
        let result = self.bind_inner(sql, values).await;
        if result.is_err() {
            let _ = self.stream.finish_bind(BIND_ABORT).await;
        }
        self.record(result)
    }

    async fn bind_inner(&mut self, sql: &str, values: &[BindValue<'_>]) -> Result<()> {
        self.trace_sql(sql);
        self.stream
            .send_statement(COMMAND_CHUNK_BIND, sql, false)
            .await?;
        self.stream.read_frame(None, None).await?;

        for value in values {
            let (data, zeroblob_len) = value.encode();
            self.stream
                .send_bind_step(&data, value.type_code(), zeroblob_len)
                .await?;
            self.stream.read_frame(None, None).await?;
        }

        self.stream.finish_bind(BIND_FINALIZE).await?;
        Ok(())
    }

    /// Commit the current transaction.
    pub async fn commit(&mut self) -> Result<()> {
        self.execute("COMMIT;").await
    }

    /// Roll back the current transaction.
    pub async fn rollback(&mut self) -> Result<()> {
        self.execute("ROLLBACK;").await
    }

    /// Open a transaction.
    pub async fn begin_transaction(&mut self) -> Result<()> {
        self.execute("BEGIN TRANSACTION;").await
    }

    /// Check that the session is alive.
    pub async fn ping(&mut self) -> Result<()> {
        self.execute("PING;").await
    }

    /// Rows changed by the last statement.
    pub async fn changes(&mut self) -> Result<i64> {
        let cursor = self.select("SELECT changes();").await?;
        Ok(cursor.int64(1, 1, 0))
    }

    /// Rows affected by the last statement, as reported by the server.
    pub async fn affected_rows(&mut self) -> Result<i64> {
        let cursor = self.select("SHOW CHANGES;").await?;
        Ok(cursor.int64(1, 1, 0))
    }

    /// Rowid generated by the last INSERT.
    pub async fn last_inserted_rowid(&mut self) -> Result<i64> {
        let cursor = self.select("SHOW LASTROWID;").await?;
        Ok(cursor.int64(1, 1, 0))
    }

    /// Select (or, with `None`, unset) the current database.
    pub async fn set_database(&mut self, name: Option<&str>) -> Result<()> {
        match name {
            Some(name) => self.execute(&format!("USE DATABASE '{name}';")).await,
            None => self.execute("UNSET CURRENT DATABASE;").await,
        }
    }

    /// Stream one binary chunk to the server within the open session.
    pub async fn send_data(&mut self, data: &[u8]) -> Result<()> {
        self.clear_error();
        let result = async {
            self.stream.send_chunk(data).await?;
            self.stream.read_frame(None, None).await?;
            Ok(())
        }
        .await;
        self.record(result)
    }

    /// Terminate an outgoing chunk stream.
    pub async fn send_enddata(&mut self) -> Result<()> {
        self.clear_error();
        let result = async {
            self.stream.end_chunk().await?;
            Ok(())
        }
        .await;
        self.record(result)
    }

    /// Receive one binary chunk from the server; `None` marks the end of the
    /// stream. Each received chunk is acknowledged.
    pub async fn receive_data(&mut self) -> Result<Option<Bytes>> {
        self.clear_error();
        let result = async {
            let frame = match self.stream.read_frame(None, None).await {
                Ok(frame) => frame,
                Err(e) => {
                    let _ = self.stream.ack_chunk(CHUNK_ABORT).await;
                    return Err(e);
                }
            };
            self.stream.ack_chunk(NO_SELECTOR).await?;
            if frame.end_chunk {
                Ok(None)
            } else {
                Ok(Some(frame.payload))
            }
        }
        .await;
        self.record(result)
    }

    /// Close the session. With `gracefully` a CLOSE frame is exchanged before
    /// the transport goes down; otherwise the socket is just closed.
    pub async fn disconnect(mut self, gracefully: bool) -> Result<()> {
        if gracefully {
            let header = self.stream.request_header(0, 0, COMMAND_CLOSE, NO_SELECTOR);
            let _ = self.stream.write_frame(&header, &[], &[]).await;
            let _ = self.stream.read_frame(None, None).await;
        }
        self.stream.shutdown().await;
        Ok(())
    }
}
