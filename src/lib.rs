//! CubeSQL client for Rust
//!
//! A pure Rust implementation of the CubeSQL client protocol: authenticated
//! (optionally AES-encrypted and/or TLS-tunnelled) sessions over TCP, SQL
//! execution, chunk-streamed result sets with O(1) cell access, prepared
//! statements with parameter binding, and raw binary transfer.
//!
//! # Example
//!
//! ```no_run
//! use cubesql_rs::{Connection, ConnectParams, Seek};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let params = ConnectParams::new("localhost", "admin", "admin");
//!     let mut conn = Connection::connect(params).await?;
//!
//!     let mut cursor = conn.select("SELECT id, name FROM people;").await?;
//!     while !cursor.is_eof() {
//!         println!(
//!             "{} {}",
//!             cursor.int64(cursor.current_row(), 1, 0),
//!             cursor.cstring(cursor.current_row(), 2).unwrap_or_default()
//!         );
//!         if !cursor.seek(Seek::Next) {
//!             break;
//!         }
//!     }
//!
//!     conn.disconnect(true).await?;
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod cursor;
pub mod error;
pub mod protocol;
pub mod vm;

// Re-export main types
pub use connection::{BindValue, ConnectParams, Connection, Encryption};
pub use cursor::{ColumnType, Cursor, Seek};
pub use error::{Error, Result};
pub use protocol::net::{CancelHandle, TlsOptions};
pub use vm::Vm;

/// The embedded SDK version.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// SDK version string.
pub fn version() -> &'static str {
    SDK_VERSION
}

#[cfg(test)]
mod tests {
    #[test]
    fn version_matches_package() {
        assert_eq!(super::version(), env!("CARGO_PKG_VERSION"));
        assert!(!super::version().is_empty());
    }
}
