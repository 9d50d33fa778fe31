//! Cryptographic helpers for the handshake and the encrypted channel.
//!
//! CubeSQL frames an encrypted payload as a 16-byte random block followed by
//! AES-CBC ciphertext of the same length as the plaintext, using ciphertext
//! stealing for non-block-aligned payloads and a dedicated short path for
//! payloads under one block. No padding ever appears in the output.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};
use sha1::{Digest, Sha1};

use crate::protocol::constants::{BLOCK_LEN, RANDPOOL_SIZE, SHA1_DIGEST_SIZE};
use crate::protocol::constants::{ENCRYPTION_AES128, ENCRYPTION_AES192, ENCRYPTION_AES256};

/// AES key sizes supported by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AesMode {
    Aes128,
    Aes192,
    Aes256,
}

impl AesMode {
    /// Key length in bytes.
    pub fn key_len(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }

    /// Code carried in the header's `encryptedPacket` byte.
    pub fn wire_code(self) -> u8 {
        match self {
            Self::Aes128 => ENCRYPTION_AES128,
            Self::Aes192 => ENCRYPTION_AES192,
            Self::Aes256 => ENCRYPTION_AES256,
        }
    }
}

/// An expanded AES key usable for both directions.
pub enum AesKey {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl AesKey {
    /// Expand `key` (16, 24 or 32 bytes as dictated by `mode`).
    pub fn new(mode: AesMode, key: &[u8]) -> Self {
        debug_assert_eq!(key.len(), mode.key_len());
        match mode {
            AesMode::Aes128 => Self::Aes128(Aes128::new(GenericArray::from_slice(key))),
            AesMode::Aes192 => Self::Aes192(Aes192::new(GenericArray::from_slice(key))),
            AesMode::Aes256 => Self::Aes256(Aes256::new(GenericArray::from_slice(key))),
        }
    }

    fn encrypt_block(&self, block: &mut [u8; BLOCK_LEN]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.encrypt_block(block),
            Self::Aes192(c) => c.encrypt_block(block),
            Self::Aes256(c) => c.encrypt_block(block),
        }
    }

    fn decrypt_block(&self, block: &mut [u8; BLOCK_LEN]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.decrypt_block(block),
            Self::Aes192(c) => c.decrypt_block(block),
            Self::Aes256(c) => c.decrypt_block(block),
        }
    }
}

/// Compute SHA1.
pub fn sha1(data: &[u8]) -> [u8; SHA1_DIGEST_SIZE] {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute SHA1(SHA1(data)).
pub fn sha1_twice(data: &[u8]) -> [u8; SHA1_DIGEST_SIZE] {
    sha1(&sha1(data))
}

/// Convert bytes to a lowercase hex string.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Fill a buffer with cryptographically secure random bytes.
pub fn random_fill(buf: &mut [u8]) {
    use rand::RngCore;
    rand::thread_rng().fill_bytes(buf);
}

/// Generate a random IV block.
pub fn random_iv() -> [u8; BLOCK_LEN] {
    let mut iv = [0u8; BLOCK_LEN];
    random_fill(&mut iv);
    iv
}

/// Generate a random handshake nonce.
pub fn random_nonce() -> [u8; RANDPOOL_SIZE] {
    let mut nonce = [0u8; RANDPOOL_SIZE];
    random_fill(&mut nonce);
    nonce
}

/// Encrypt `plain` under `key` with the given IV.
///
/// The output is `plain.len() + 16` bytes: one leading block derived from the
/// IV followed by ciphertext of exactly the plaintext length. For payloads
/// shorter than one block the cipher window starts at offset `plain.len()`
/// of (IV ‖ plaintext) and overlaps the IV tail, so part of the leading block
/// is itself ciphertext; receivers invert this exactly.
pub fn encrypt(key: &AesKey, iv: &[u8; BLOCK_LEN], plain: &[u8]) -> Vec<u8> {
    let n = plain.len();
    let mut out = Vec::with_capacity(n + BLOCK_LEN);
    out.extend_from_slice(iv);
    out.extend_from_slice(plain);

    if n < BLOCK_LEN {
        for i in 0..n {
            out[BLOCK_LEN + i] ^= out[i];
        }
        let mut block = [0u8; BLOCK_LEN];
        block.copy_from_slice(&out[n..n + BLOCK_LEN]);
        key.encrypt_block(&mut block);
        out[n..n + BLOCK_LEN].copy_from_slice(&block);
        return out;
    }

    // CBC over the full blocks, chained from the IV.
    let full = n / BLOCK_LEN;
    let mut prev = *iv;
    for b in 0..full {
        let off = BLOCK_LEN + b * BLOCK_LEN;
        let mut block = [0u8; BLOCK_LEN];
        block.copy_from_slice(&out[off..off + BLOCK_LEN]);
        for i in 0..BLOCK_LEN {
            block[i] ^= prev[i];
        }
        key.encrypt_block(&mut block);
        out[off..off + BLOCK_LEN].copy_from_slice(&block);
        prev = block;
    }

    let tail = n - full * BLOCK_LEN;
    if tail != 0 {
        // Ciphertext stealing: the final short block swaps places with the
        // stolen tail of the last full ciphertext block.
        let last_off = BLOCK_LEN + (full - 1) * BLOCK_LEN;
        let mut stolen = [0u8; BLOCK_LEN];
        stolen.copy_from_slice(&out[last_off..last_off + BLOCK_LEN]);

        let mut block = [0u8; BLOCK_LEN];
        for i in 0..tail {
            block[i] = out[last_off + BLOCK_LEN + i] ^ stolen[i];
        }
        block[tail..].copy_from_slice(&stolen[tail..]);
        key.encrypt_block(&mut block);

        out[last_off..last_off + BLOCK_LEN].copy_from_slice(&block);
        out[last_off + BLOCK_LEN..last_off + BLOCK_LEN + tail].copy_from_slice(&stolen[..tail]);
    }

    out
}

/// Decrypt `data` (leading IV block plus ciphertext) under `key`.
///
/// Returns the plaintext, which is `data.len() - 16` bytes. The plaintext
/// length must be known out-of-band; the framing carries it in
/// `packetSize - 16`.
pub fn decrypt(key: &AesKey, data: &[u8]) -> Vec<u8> {
    let dim = data.len();
    debug_assert!(dim >= BLOCK_LEN);
    let n = dim - BLOCK_LEN;

    if dim < 2 * BLOCK_LEN {
        // Short payload: the cipher window starts at offset n and overlaps
        // the leading block.
        let mut buf = data.to_vec();
        let mut block = [0u8; BLOCK_LEN];
        block.copy_from_slice(&buf[n..n + BLOCK_LEN]);
        key.decrypt_block(&mut block);
        buf[n..n + BLOCK_LEN].copy_from_slice(&block);
        for i in 0..n {
            buf[i] ^= buf[i + BLOCK_LEN];
        }
        buf.truncate(n);
        return buf;
    }

    let mut out = Vec::with_capacity(n);
    let mut prev_off = 0usize;
    let mut cur = BLOCK_LEN;
    let mut remaining = n;

    loop {
        let mut block = [0u8; BLOCK_LEN];
        block.copy_from_slice(&data[cur..cur + BLOCK_LEN]);
        key.decrypt_block(&mut block);

        let after = remaining - BLOCK_LEN;
        if after == 0 || after >= BLOCK_LEN {
            for i in 0..BLOCK_LEN {
                block[i] ^= data[prev_off + i];
            }
            out.extend_from_slice(&block);
            remaining -= BLOCK_LEN;
            if remaining == 0 {
                return out;
            }
            prev_off = cur;
            cur += BLOCK_LEN;
        } else {
            // Partial last block: undo the ciphertext stealing.
            let tail = after;
            let stolen = &data[cur + BLOCK_LEN..cur + BLOCK_LEN + tail];
            let mut last = [0u8; BLOCK_LEN];
            for i in 0..tail {
                block[i] ^= stolen[i];
            }
            last[..tail].copy_from_slice(stolen);
            last[tail..].copy_from_slice(&block[tail..]);
            key.decrypt_block(&mut last);
            for (i, b) in last.iter_mut().enumerate() {
                *b ^= data[prev_off + i];
            }
            out.extend_from_slice(&last);
            out.extend_from_slice(&block[..tail]);
            return out;
        }
    }
}

/// Derive the session key from `H(H(P))` and the two handshake nonces.
///
/// `s1 = H(H(H(P)) ‖ X ‖ Y)` and `s2 = H(X XOR Y)`. For AES-192 and AES-256
/// the `s2` prefix is written at offset 0 of the key, over the `s1` bytes
/// already placed there, and the key tail beyond byte 20 stays zero. Both
/// peers compute the same layout, so it must not be normalized.
pub fn derive_session_key(
    mode: AesMode,
    password_hash2: &[u8; SHA1_DIGEST_SIZE],
    x: &[u8; RANDPOOL_SIZE],
    y: &[u8; RANDPOOL_SIZE],
) -> Vec<u8> {
    let mut seed = Vec::with_capacity(SHA1_DIGEST_SIZE + 2 * RANDPOOL_SIZE);
    seed.extend_from_slice(password_hash2);
    seed.extend_from_slice(x);
    seed.extend_from_slice(y);
    let s1 = sha1(&seed);

    let mut xy = [0u8; RANDPOOL_SIZE];
    for i in 0..RANDPOOL_SIZE {
        xy[i] = x[i] ^ y[i];
    }
    let s2 = sha1(&xy);

    let mut key = vec![0u8; 32];
    let key_len = mode.key_len();
    match mode {
        AesMode::Aes128 => key[..16].copy_from_slice(&s1[..16]),
        AesMode::Aes192 => {
            key[..20].copy_from_slice(&s1);
            key[..4].copy_from_slice(&s2[..4]);
        }
        AesMode::Aes256 => {
            key[..20].copy_from_slice(&s1);
            key[..12].copy_from_slice(&s2[..12]);
        }
    }
    key.truncate(key_len);
    key
}

/// Paired encrypt/decrypt keys for an established session.
pub struct SessionCrypto {
    pub mode: AesMode,
    pub encrypt_key: AesKey,
    pub decrypt_key: AesKey,
}

impl SessionCrypto {
    /// Build both key schedules from the derived session key.
    pub fn new(mode: AesMode, key: &[u8]) -> Self {
        Self {
            mode,
            encrypt_key: AesKey::new(mode, key),
            decrypt_key: AesKey::new(mode, key),
        }
    }
}
