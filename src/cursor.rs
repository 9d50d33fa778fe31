//! Result-set cursors.
//!
//! A cursor keeps the packed wire representation of its rows: per-chunk size
//! vectors converted to prefix sums over a contiguous data blob, giving O(1)
//! random access to any cell. Chunked replies keep one buffer per chunk plus
//! a cumulative row table; server-side cursors grow one row per step.
//! Network-driving operations (stepping, closing a server-side cursor) live
//! on [`Connection`](crate::Connection) and borrow the cursor.

use bytes::Bytes;
use std::cell::Cell;

use crate::error::{Error, Result};
use crate::protocol::constants::*;
use crate::protocol::header::Header;

/// Seek target for [`Cursor::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seek {
    First,
    Last,
    Next,
    Prev,
    /// Absolute 1-based row index.
    Row(usize),
}

/// Declared column type of a result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Blob,
    Boolean,
    Date,
    Time,
    Timestamp,
    Currency,
    Other(i32),
}

impl ColumnType {
    pub fn from_wire(code: i32) -> Self {
        match code {
            TYPE_INTEGER => Self::Integer,
            TYPE_FLOAT => Self::Float,
            TYPE_TEXT => Self::Text,
            TYPE_BLOB => Self::Blob,
            TYPE_BOOLEAN => Self::Boolean,
            TYPE_DATE => Self::Date,
            TYPE_TIME => Self::Time,
            TYPE_TIMESTAMP => Self::Timestamp,
            TYPE_CURRENCY => Self::Currency,
            other => Self::Other(other),
        }
    }

    pub fn wire_code(self) -> i32 {
        match self {
            Self::Integer => TYPE_INTEGER,
            Self::Float => TYPE_FLOAT,
            Self::Text => TYPE_TEXT,
            Self::Blob => TYPE_BLOB,
            Self::Boolean => TYPE_BOOLEAN,
            Self::Date => TYPE_DATE,
            Self::Time => TYPE_TIME,
            Self::Timestamp => TYPE_TIMESTAMP,
            Self::Currency => TYPE_CURRENCY,
            Self::Other(code) => code,
        }
    }

    /// The bind type a value of this column type would use.
    pub fn bind_code(self) -> u8 {
        match self {
            Self::Integer => BIND_INTEGER,
            Self::Float => BIND_DOUBLE,
            Self::Blob => BIND_BLOB,
            _ => BIND_TEXT,
        }
    }
}

/// One chunk of packed rows: sizes, their prefix sums, and the cell bytes.
struct Chunk {
    sizes: Vec<i32>,
    psum: Vec<u32>,
    data: Bytes,
}

impl Chunk {
    /// Build the prefix-sum index over `sizes`. A size of `-1` encodes SQL
    /// NULL: it contributes nothing but inherits the running sum.
    fn new(sizes: Vec<i32>, data: Bytes) -> Result<Self> {
        let mut psum = Vec::with_capacity(sizes.len());
        let mut total: u32 = 0;
        for &size in &sizes {
            if size < -1 {
                return Err(Error::wrong_header(format!("invalid cell size {size}")));
            }
            if size > 0 {
                total = total.checked_add(size as u32).ok_or_else(|| {
                    Error::wrong_header("cell sizes overflow".to_string())
                })?;
            }
            psum.push(total);
        }
        if total as usize > data.len() {
            return Err(Error::wrong_header(format!(
                "cell sizes cover {} bytes but chunk holds {}",
                total,
                data.len()
            )));
        }
        Ok(Self { sizes, psum, data })
    }

    fn cell(&self, k: usize) -> Option<&[u8]> {
        let size = *self.sizes.get(k)?;
        if size < 0 {
            return None;
        }
        let start = if k == 0 { 0 } else { self.psum[k - 1] as usize };
        self.data.get(start..start + size as usize)
    }
}

enum CursorData {
    /// Wire-format rows, one or more chunks.
    Packed {
        chunks: Vec<Chunk>,
        /// Cumulative row count per chunk; the last entry equals `nrows`.
        rowcount: Vec<usize>,
        /// Most recently used chunk, the hot path for locality of access.
        current_chunk: Cell<usize>,
    },
    /// Client-built rows, one heap cell per value.
    Custom { cells: Vec<Option<Vec<u8>>> },
}

/// A materialized (or materializing) result set.
pub struct Cursor {
    ncols: usize,
    nrows: usize,
    current_row: usize,
    eof: bool,
    has_rowid: bool,
    server_side: bool,
    types: Vec<i32>,
    names: Vec<Bytes>,
    tables: Option<Vec<Bytes>>,
    data: CursorData,
}

fn parse_i32s(payload: &[u8], off: &mut usize, count: usize) -> Result<Vec<i32>> {
    let end = off
        .checked_add(count * 4)
        .filter(|&end| end <= payload.len())
        .ok_or_else(|| Error::wrong_header("cursor payload truncated".to_string()))?;
    let out = payload[*off..end]
        .chunks_exact(4)
        .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    *off = end;
    Ok(out)
}

fn parse_name_table(payload: &Bytes, off: &mut usize, count: usize) -> Result<Vec<Bytes>> {
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let rel = payload[*off..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::wrong_header("unterminated name table".to_string()))?;
        out.push(payload.slice(*off..*off + rel));
        *off += rel + 1;
    }
    Ok(out)
}

impl Cursor {
    /// A cursor with no columns and no rows, produced when a reply stream
    /// ends before carrying any data.
    pub(crate) fn empty() -> Self {
        Self {
            ncols: 0,
            nrows: 0,
            current_row: 1,
            eof: true,
            has_rowid: false,
            server_side: false,
            types: Vec::new(),
            names: Vec::new(),
            tables: None,
            data: CursorData::Packed {
                chunks: Vec::new(),
                rowcount: Vec::new(),
                current_chunk: Cell::new(0),
            },
        }
    }

    /// Parse the first frame of a cursor reply:
    /// types ‖ sizes ‖ names ‖ (tables) ‖ data.
    pub(crate) fn from_initial_frame(header: &Header, payload: Bytes) -> Result<Self> {
        let has_tables = header.has_flag1(SERVER_HAS_TABLE_NAME);
        let has_rowid = header.has_flag1(SERVER_HAS_ROWID_COLUMN);
        let server_side = header.has_flag1(SERVER_SERVER_SIDE);
        let server_cols = header.cols as usize;
        let server_rows = header.rows as usize;
        if server_cols == 0 || (has_rowid && server_cols == 1) {
            return Err(Error::wrong_header("cursor reply with no columns".to_string()));
        }

        let mut off = 0;
        let types = parse_i32s(&payload, &mut off, server_cols)?;
        let sizes = parse_i32s(&payload, &mut off, server_rows * server_cols)?;
        let names = parse_name_table(&payload, &mut off, server_cols)?;
        let tables = if has_tables {
            Some(parse_name_table(&payload, &mut off, server_cols)?)
        } else {
            None
        };
        let chunk = Chunk::new(sizes, payload.slice(off..))?;

        Ok(Self {
            ncols: server_cols - usize::from(has_rowid),
            nrows: server_rows,
            current_row: 1,
            eof: false,
            has_rowid,
            server_side,
            types,
            names,
            tables,
            data: CursorData::Packed {
                chunks: vec![chunk],
                rowcount: vec![server_rows],
                current_chunk: Cell::new(0),
            },
        })
    }

    /// Append a continuation frame (a chunk, or one stepped server-side row):
    /// sizes ‖ data only.
    pub(crate) fn append_frame(&mut self, header: &Header, payload: Bytes) -> Result<()> {
        let CursorData::Packed {
            chunks, rowcount, ..
        } = &mut self.data
        else {
            return Err(Error::wrong_header(
                "continuation frame on a custom cursor".to_string(),
            ));
        };
        let server_cols = self.ncols + usize::from(self.has_rowid);
        let rows = header.rows as usize;

        let mut off = 0;
        let sizes = parse_i32s(&payload, &mut off, rows * server_cols)?;
        chunks.push(Chunk::new(sizes, payload.slice(off..))?);
        self.nrows += rows;
        rowcount.push(self.nrows);
        Ok(())
    }

    /// Build an empty client-side cursor with the given columns. Rows are
    /// appended with [`Cursor::add_row`].
    pub fn custom(names: &[&str], types: &[ColumnType]) -> Result<Self> {
        if names.is_empty() || names.len() != types.len() {
            return Err(Error::parameter(
                "custom cursor needs matching, non-empty name and type lists",
            ));
        }
        Ok(Self {
            ncols: names.len(),
            nrows: 0,
            current_row: 1,
            eof: false,
            has_rowid: false,
            server_side: false,
            types: types.iter().map(|t| t.wire_code()).collect(),
            names: names
                .iter()
                .map(|n| Bytes::copy_from_slice(n.as_bytes()))
                .collect(),
            tables: None,
            data: CursorData::Custom { cells: Vec::new() },
        })
    }

    /// Append one row to a custom cursor. `None` cells are SQL NULL.
    pub fn add_row(&mut self, row: &[Option<&[u8]>]) -> Result<()> {
        let CursorData::Custom { cells } = &mut self.data else {
            return Err(Error::parameter("rows can only be added to custom cursors"));
        };
        if row.len() != self.ncols {
            return Err(Error::parameter(format!(
                "row has {} cells, cursor has {} columns",
                row.len(),
                self.ncols
            )));
        }
        cells.extend(row.iter().map(|cell| cell.map(|v| v.to_vec())));
        self.nrows += 1;
        Ok(())
    }

    /// Number of columns, not counting a hidden rowid column.
    pub fn num_columns(&self) -> usize {
        self.ncols
    }

    /// Total rows, or `None` for a server-side cursor whose count is unknown
    /// until eof.
    pub fn num_rows(&self) -> Option<usize> {
        if self.server_side {
            None
        } else {
            Some(self.nrows)
        }
    }

    /// Rows materialized so far (for a server-side cursor, the rows stepped).
    pub fn rows_fetched(&self) -> usize {
        self.nrows
    }

    /// Current 1-based row position.
    pub fn current_row(&self) -> usize {
        self.current_row
    }

    pub fn is_eof(&self) -> bool {
        self.eof || self.nrows == 0
    }

    pub fn is_server_side(&self) -> bool {
        self.server_side
    }

    pub fn has_rowid_column(&self) -> bool {
        self.has_rowid
    }

    pub(crate) fn set_eof(&mut self) {
        self.eof = true;
    }

    /// Point the cursor at the most recently appended row.
    pub(crate) fn note_stepped(&mut self) {
        self.current_row = self.nrows;
    }

    /// Move the current row of a client-side cursor. Seeking past the last
    /// row sets eof and fails; seeking before the first row fails without
    /// moving. Server-side cursors only move forward, via
    /// [`Connection::step`](crate::Connection::step).
    pub fn seek(&mut self, to: Seek) -> bool {
        if self.server_side {
            return false;
        }
        let target = match to {
            Seek::Next => self.current_row + 1,
            Seek::Prev => {
                if self.current_row <= 1 {
                    return false;
                }
                self.current_row - 1
            }
            Seek::First => 1,
            Seek::Last => self.nrows,
            Seek::Row(n) => n,
        };
        if target > self.nrows {
            self.eof = true;
            return false;
        }
        if target == 0 {
            return false;
        }
        self.eof = false;
        self.current_row = target;
        true
    }

    /// Column name (1-based), skipping the hidden rowid column.
    pub fn column_name(&self, col: usize) -> Option<&str> {
        if col == 0 || col > self.ncols {
            return None;
        }
        let name = &self.names[col - 1 + usize::from(self.has_rowid)];
        std::str::from_utf8(name).ok()
    }

    /// Column table name (1-based), or `None` when the reply omitted the
    /// table list.
    pub fn column_table(&self, col: usize) -> Option<&str> {
        if col == 0 || col > self.ncols {
            return None;
        }
        let tables = self.tables.as_ref()?;
        let table = &tables[col - 1 + usize::from(self.has_rowid)];
        std::str::from_utf8(table).ok()
    }

    /// Declared type of a column (1-based).
    pub fn column_type(&self, col: usize) -> Option<ColumnType> {
        if col == 0 || col > self.ncols {
            return None;
        }
        Some(ColumnType::from_wire(
            self.types[col - 1 + usize::from(self.has_rowid)],
        ))
    }

    /// Raw cell bytes at (`row`, `col`), both 1-based. `None` is SQL NULL or
    /// an out-of-range index.
    pub fn field(&self, row: usize, col: usize) -> Option<&[u8]> {
        if row == 0 || row > self.nrows || col == 0 || col > self.ncols {
            return None;
        }
        match &self.data {
            CursorData::Custom { cells } => {
                cells[(row - 1) * self.ncols + (col - 1)].as_deref()
            }
            CursorData::Packed { chunks, .. } => {
                let (chunk_index, base) = self.locate_chunk(row)?;
                let chunk = &chunks[chunk_index];
                let local = row - base;
                let server_cols = self.ncols + usize::from(self.has_rowid);
                let k = if self.has_rowid {
                    (local - 1) * server_cols + col
                } else {
                    (local - 1) * server_cols + (col - 1)
                };
                chunk.cell(k)
            }
        }
    }

    /// Cell bytes at the current row.
    pub fn current_field(&self, col: usize) -> Option<&[u8]> {
        self.field(self.current_row, col)
    }

    /// The hidden rowid of `row`, when the reply carries a rowid column.
    pub fn rowid(&self, row: usize) -> Option<i64> {
        if !self.has_rowid || row == 0 || row > self.nrows {
            return None;
        }
        let CursorData::Packed { chunks, .. } = &self.data else {
            return None;
        };
        let (chunk_index, base) = self.locate_chunk(row)?;
        let server_cols = self.ncols + 1;
        let k = (row - base - 1) * server_cols;
        let cell = chunks[chunk_index].cell(k)?;
        parse_num::<i64>(cell)
    }

    /// Integer value with a default for NULL or unparsable cells.
    pub fn int(&self, row: usize, col: usize, default: i32) -> i32 {
        self.field(row, col)
            .and_then(parse_num::<i32>)
            .unwrap_or(default)
    }

    /// 64-bit integer value with a default.
    pub fn int64(&self, row: usize, col: usize, default: i64) -> i64 {
        self.field(row, col)
            .and_then(parse_num::<i64>)
            .unwrap_or(default)
    }

    /// Floating-point value with a default.
    pub fn double(&self, row: usize, col: usize, default: f64) -> f64 {
        self.field(row, col)
            .and_then(parse_num::<f64>)
            .unwrap_or(default)
    }

    /// Owned string value, `None` for SQL NULL.
    pub fn cstring(&self, row: usize, col: usize) -> Option<String> {
        self.field(row, col)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Find the chunk containing `row`; returns (index, rows before it).
    /// The most recently used chunk and its successor are checked before
    /// falling back to a binary search over the cumulative row table.
    fn locate_chunk(&self, row: usize) -> Option<(usize, usize)> {
        let CursorData::Packed {
            rowcount,
            current_chunk,
            ..
        } = &self.data
        else {
            return None;
        };
        let base_of = |index: usize| if index == 0 { 0 } else { rowcount[index - 1] };
        let holds = |index: usize| {
            index < rowcount.len() && row > base_of(index) && row <= rowcount[index]
        };

        let hot = current_chunk.get();
        let index = if holds(hot) {
            hot
        } else if holds(hot + 1) {
            hot + 1
        } else {
            let index = rowcount.partition_point(|&cumulative| cumulative < row);
            if index >= rowcount.len() {
                return None;
            }
            index
        };
        current_chunk.set(index);
        Some((index, base_of(index)))
    }
}

fn parse_num<T: std::str::FromStr>(bytes: &[u8]) -> Option<T> {
    let text = std::str::from_utf8(bytes).ok()?;
    text.trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::*;

    fn cursor_header(rows: usize, cols: usize, flag1: u8) -> Header {
        Header {
            signature: PROTOCOL_SIGNATURE,
            rows: rows as u32,
            cols: cols as u32,
            flag1,
            ..Header::default()
        }
    }

    fn sizes_and_data(rows: &[Vec<Option<&[u8]>>]) -> Vec<u8> {
        let mut sizes = Vec::new();
        let mut data = Vec::new();
        for row in rows {
            for cell in row {
                match cell {
                    Some(bytes) => {
                        sizes.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
                        data.extend_from_slice(bytes);
                    }
                    None => sizes.extend_from_slice(&(-1i32).to_be_bytes()),
                }
            }
        }
        sizes.extend_from_slice(&data);
        sizes
    }

    fn initial_payload(
        types: &[i32],
        names: &[&str],
        tables: Option<&[&str]>,
        rows: &[Vec<Option<&[u8]>>],
    ) -> Bytes {
        let mut payload = Vec::new();
        for t in types {
            payload.extend_from_slice(&t.to_be_bytes());
        }
        let mut tail = sizes_and_data(rows);
        // sizes come before the name tables on the wire
        let split = rows.len() * types.len() * 4;
        payload.extend_from_slice(&tail[..split]);
        for name in names {
            payload.extend_from_slice(name.as_bytes());
            payload.push(0);
        }
        if let Some(tables) = tables {
            for table in tables {
                payload.extend_from_slice(table.as_bytes());
                payload.push(0);
            }
        }
        payload.extend_from_slice(&tail.split_off(split));
        Bytes::from(payload)
    }

    fn sample_rows() -> Vec<Vec<Option<&'static [u8]>>> {
        vec![
            vec![Some(b"1"), Some(b"alice"), Some(b"x"), Some(b"10.5")],
            vec![Some(b"2"), Some(b"bob"), None, Some(b"20.25")],
            vec![Some(b"3"), Some(b"carol"), Some(b"zzz"), Some(b"30")],
        ]
    }

    fn sample_cursor() -> Cursor {
        let rows = sample_rows();
        let header = cursor_header(3, 4, 0);
        let payload = initial_payload(
            &[TYPE_INTEGER, TYPE_TEXT, TYPE_TEXT, TYPE_FLOAT],
            &["id", "name", "note", "score"],
            None,
            &rows,
        );
        Cursor::from_initial_frame(&header, payload).unwrap()
    }

    #[test]
    fn indexing_with_null_cell() {
        let cursor = sample_cursor();
        assert_eq!(cursor.num_rows(), Some(3));
        assert_eq!(cursor.num_columns(), 4);

        let rows = sample_rows();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                assert_eq!(cursor.field(r + 1, c + 1), *cell, "cell ({}, {})", r + 1, c + 1);
            }
        }
        // the NULL at (2, 3) reads back as None, not as an empty slice
        assert_eq!(cursor.field(2, 3), None);
        assert_eq!(cursor.field(0, 1), None);
        assert_eq!(cursor.field(4, 1), None);
        assert_eq!(cursor.field(1, 5), None);
    }

    #[test]
    fn typed_accessors() {
        let cursor = sample_cursor();
        assert_eq!(cursor.int(1, 1, -1), 1);
        assert_eq!(cursor.int64(3, 1, -1), 3);
        assert_eq!(cursor.double(2, 4, 0.0), 20.25);
        assert_eq!(cursor.cstring(1, 2).as_deref(), Some("alice"));
        assert_eq!(cursor.cstring(2, 3), None);
        // NULL falls back to the default
        assert_eq!(cursor.int(2, 3, 42), 42);
        assert_eq!(cursor.column_type(1), Some(ColumnType::Integer));
        assert_eq!(cursor.column_type(4), Some(ColumnType::Float));
    }

    #[test]
    fn column_names_and_tables() {
        let rows = sample_rows();
        let header = cursor_header(3, 4, SERVER_HAS_TABLE_NAME);
        let payload = initial_payload(
            &[TYPE_INTEGER, TYPE_TEXT, TYPE_TEXT, TYPE_FLOAT],
            &["id", "name", "note", "score"],
            Some(&["people", "people", "people", "grades"]),
            &rows,
        );
        let cursor = Cursor::from_initial_frame(&header, payload).unwrap();
        assert_eq!(cursor.column_name(2), Some("name"));
        assert_eq!(cursor.column_table(4), Some("grades"));
        assert_eq!(cursor.column_name(0), None);
        assert_eq!(cursor.column_name(5), None);

        // without the flag the table list is absent
        let cursor = sample_cursor();
        assert_eq!(cursor.column_table(1), None);
    }

    #[test]
    fn rowid_column_is_hidden() {
        let rows: Vec<Vec<Option<&[u8]>>> = vec![
            vec![Some(b"11"), Some(b"1"), Some(b"alice")],
            vec![Some(b"22"), Some(b"2"), Some(b"bob")],
        ];
        let header = cursor_header(2, 3, SERVER_HAS_ROWID_COLUMN);
        let payload = initial_payload(
            &[TYPE_INTEGER, TYPE_INTEGER, TYPE_TEXT],
            &["_rowid_", "id", "name"],
            None,
            &rows,
        );
        let cursor = Cursor::from_initial_frame(&header, payload).unwrap();

        assert_eq!(cursor.num_columns(), 2);
        assert!(cursor.has_rowid_column());
        assert_eq!(cursor.rowid(1), Some(11));
        assert_eq!(cursor.rowid(2), Some(22));
        assert_eq!(cursor.field(1, 1), Some(&b"1"[..]));
        assert_eq!(cursor.field(2, 2), Some(&b"bob"[..]));
        assert_eq!(cursor.column_name(1), Some("id"));
        assert_eq!(cursor.column_type(2), Some(ColumnType::Text));
    }

    #[test]
    fn chunked_matches_single_frame() {
        let rows = sample_rows();

        let single = sample_cursor();

        let header = cursor_header(1, 4, SERVER_PARTIAL_PACKET);
        let payload = initial_payload(
            &[TYPE_INTEGER, TYPE_TEXT, TYPE_TEXT, TYPE_FLOAT],
            &["id", "name", "note", "score"],
            None,
            &rows[..1],
        );
        let mut chunked = Cursor::from_initial_frame(&header, payload).unwrap();
        for row in &rows[1..] {
            let chunk = std::slice::from_ref(row);
            let header = cursor_header(1, 4, SERVER_PARTIAL_PACKET);
            chunked
                .append_frame(&header, Bytes::from(sizes_and_data(chunk)))
                .unwrap();
        }

        assert_eq!(chunked.num_rows(), single.num_rows());
        for r in 1..=3 {
            for c in 1..=4 {
                assert_eq!(chunked.field(r, c), single.field(r, c), "cell ({r}, {c})");
            }
        }
    }

    #[test]
    fn chunk_lookup_in_any_order() {
        let rows = sample_rows();
        let header = cursor_header(1, 4, SERVER_PARTIAL_PACKET);
        let payload = initial_payload(
            &[TYPE_INTEGER, TYPE_TEXT, TYPE_TEXT, TYPE_FLOAT],
            &["id", "name", "note", "score"],
            None,
            &rows[..1],
        );
        let mut cursor = Cursor::from_initial_frame(&header, payload).unwrap();
        let header = cursor_header(2, 4, SERVER_PARTIAL_PACKET);
        cursor
            .append_frame(&header, Bytes::from(sizes_and_data(&rows[1..])))
            .unwrap();

        // backwards, forwards, and repeated hits on the same chunk
        assert_eq!(cursor.field(3, 2), Some(&b"carol"[..]));
        assert_eq!(cursor.field(1, 2), Some(&b"alice"[..]));
        assert_eq!(cursor.field(2, 2), Some(&b"bob"[..]));
        assert_eq!(cursor.field(2, 3), None);
        assert_eq!(cursor.field(3, 4), Some(&b"30"[..]));
    }

    #[test]
    fn seek_semantics() {
        let mut cursor = sample_cursor();

        assert!(cursor.seek(Seek::First));
        assert_eq!(cursor.current_row(), 1);
        assert!(!cursor.is_eof());

        assert!(cursor.seek(Seek::Last));
        assert_eq!(cursor.current_row(), 3);
        assert!(!cursor.is_eof());

        assert!(!cursor.seek(Seek::Next));
        assert!(cursor.is_eof());

        // seeking back clears eof
        assert!(cursor.seek(Seek::First));
        assert!(!cursor.is_eof());
        assert!(cursor.seek(Seek::Next));
        assert_eq!(cursor.current_row(), 2);
        assert!(cursor.seek(Seek::Prev));
        assert_eq!(cursor.current_row(), 1);
        assert!(!cursor.seek(Seek::Prev));
        assert_eq!(cursor.current_row(), 1);

        assert!(cursor.seek(Seek::Row(3)));
        assert!(!cursor.seek(Seek::Row(0)));
        assert!(!cursor.seek(Seek::Row(4)));
        assert!(cursor.is_eof());
    }

    #[test]
    fn custom_cursor_roundtrip() {
        let mut cursor =
            Cursor::custom(&["id", "payload"], &[ColumnType::Integer, ColumnType::Blob]).unwrap();
        assert_eq!(cursor.num_rows(), Some(0));
        assert!(cursor.is_eof());

        cursor.add_row(&[Some(b"7"), Some(&[0xDE, 0xAD])]).unwrap();
        cursor.add_row(&[Some(b"8"), None]).unwrap();

        assert_eq!(cursor.num_rows(), Some(2));
        assert!(!cursor.is_eof());
        assert_eq!(cursor.int(1, 1, 0), 7);
        assert_eq!(cursor.field(1, 2), Some(&[0xDE, 0xAD][..]));
        assert_eq!(cursor.field(2, 2), None);
        assert_eq!(cursor.column_name(2), Some("payload"));
        assert_eq!(cursor.column_type(2), Some(ColumnType::Blob));

        // arity is enforced
        assert!(cursor.add_row(&[Some(b"9")]).is_err());
        // packed cursors reject add_row
        assert!(sample_cursor().add_row(&[Some(b"1".as_slice()); 4]).is_err());
    }

    #[test]
    fn empty_cursor_is_eof() {
        let cursor = Cursor::empty();
        assert!(cursor.is_eof());
        assert_eq!(cursor.num_rows(), Some(0));
        assert_eq!(cursor.field(1, 1), None);
    }
}
