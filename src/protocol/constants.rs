//! Wire protocol constants.

/// Magic value carried in the first four bytes of every header.
pub const PROTOCOL_SIGNATURE: u32 = 0x4355_4245;

/// Size of the fixed request/reply header on the wire.
pub const HEADER_SIZE: usize = 56;

/// AES block length; also the length of the random IV prefix on encrypted
/// payloads.
pub const BLOCK_LEN: usize = 16;

/// Length of the random nonces exchanged during the handshake.
pub const RANDPOOL_SIZE: usize = 20;

/// SHA1 digest length.
pub const SHA1_DIGEST_SIZE: usize = 20;

/// Default server port.
pub const DEFAULT_PORT: u16 = 4430;

/// Default connection timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 12;

// Commands
pub const COMMAND_CONNECT: u8 = 1;
pub const COMMAND_SELECT: u8 = 2;
pub const COMMAND_EXECUTE: u8 = 3;
pub const COMMAND_CLOSE: u8 = 4;
pub const COMMAND_CHUNK: u8 = 5;
pub const COMMAND_ENDCHUNK: u8 = 6;
pub const COMMAND_CHUNK_BIND: u8 = 7;
pub const COMMAND_VM_PREPARE: u8 = 8;
pub const COMMAND_VM_BIND: u8 = 9;
pub const COMMAND_VM_EXECUTE: u8 = 10;
pub const COMMAND_VM_SELECT: u8 = 11;
pub const COMMAND_VM_CLOSE: u8 = 12;
pub const COMMAND_CURSOR_STEP: u8 = 13;
pub const COMMAND_CURSOR_CLOSE: u8 = 14;

// Selectors
pub const NO_SELECTOR: u8 = 0;
pub const CLEAR_CONNECT_PHASE1: u8 = 1;
pub const CLEAR_CONNECT_PHASE2: u8 = 2;
pub const ENCRYPT_CONNECT_PHASE1: u8 = 3;
pub const ENCRYPT_CONNECT_PHASE2: u8 = 4;
pub const CLEAR_TOKEN_CONNECT1: u8 = 5;
pub const CLEAR_TOKEN_CONNECT2: u8 = 6;
pub const ENCRYPT_TOKEN_CONNECT1: u8 = 7;
pub const ENCRYPT_TOKEN_CONNECT2: u8 = 8;
pub const CHUNK_OK: u8 = 9;
pub const CHUNK_ABORT: u8 = 10;
pub const BIND_STEP: u8 = 11;
pub const BIND_FINALIZE: u8 = 12;
pub const BIND_ABORT: u8 = 13;

// Request-side flag1 bits
pub const CLIENT_SUPPORT_COMPRESSION: u8 = 0x01;
pub const CLIENT_PARTIAL_PACKET: u8 = 0x02;
pub const CLIENT_COMPRESSED_PACKET: u8 = 0x04;
pub const CLIENT_REQUEST_SERVER_SIDE: u8 = 0x08;

// Reply-side flag1 bits
pub const SERVER_HAS_TABLE_NAME: u8 = 0x01;
pub const SERVER_PARTIAL_PACKET: u8 = 0x02;
pub const SERVER_HAS_ROWID_COLUMN: u8 = 0x04;
pub const SERVER_SERVER_SIDE: u8 = 0x08;
pub const SERVER_COMPRESSED_PACKET: u8 = 0x10;

/// Reserved `errorCode` value marking the end of a chunked reply stream.
pub const END_CHUNK: u16 = 0xFFFF;

// Protocol revision bytes. The 2007 revision sends usernames and identifiers
// in the clear; 2011 hashes them with SHA1 and hex-encodes them.
pub const PROTOCOL_2007: u8 = 1;
pub const PROTOCOL_2011: u8 = 3;

// Encryption-mode codes as carried in `encryptedPacket`. The TLS variants are
// client-side only: the server sees the bare AES code.
pub const ENCRYPTION_NONE: u8 = 0;
pub const ENCRYPTION_AES128: u8 = 2;
pub const ENCRYPTION_AES192: u8 = 3;
pub const ENCRYPTION_AES256: u8 = 4;
pub const ENCRYPTION_SSL: u8 = 8;

// Bind-value type codes, carried in `flag3` of VM_BIND and BIND_STEP frames.
pub const BIND_INTEGER: u8 = 1;
pub const BIND_DOUBLE: u8 = 2;
pub const BIND_TEXT: u8 = 3;
pub const BIND_BLOB: u8 = 4;
pub const BIND_NULL: u8 = 5;
pub const BIND_INT64: u8 = 8;
pub const BIND_ZEROBLOB: u8 = 9;

// Column type codes in cursor replies.
pub const TYPE_INTEGER: i32 = 1;
pub const TYPE_FLOAT: i32 = 2;
pub const TYPE_TEXT: i32 = 3;
pub const TYPE_BLOB: i32 = 4;
pub const TYPE_BOOLEAN: i32 = 5;
pub const TYPE_DATE: i32 = 6;
pub const TYPE_TIME: i32 = 7;
pub const TYPE_TIMESTAMP: i32 = 8;
pub const TYPE_CURRENCY: i32 = 9;

/// Every command understood by the dispatcher, for exhaustive tests.
pub const ALL_COMMANDS: [u8; 14] = [
    COMMAND_CONNECT,
    COMMAND_SELECT,
    COMMAND_EXECUTE,
    COMMAND_CLOSE,
    COMMAND_CHUNK,
    COMMAND_ENDCHUNK,
    COMMAND_CHUNK_BIND,
    COMMAND_VM_PREPARE,
    COMMAND_VM_BIND,
    COMMAND_VM_EXECUTE,
    COMMAND_VM_SELECT,
    COMMAND_VM_CLOSE,
    COMMAND_CURSOR_STEP,
    COMMAND_CURSOR_CLOSE,
];
