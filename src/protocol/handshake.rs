//! The authentication handshake.
//!
//! Four flows, selected by (cleartext | encrypted) × (token | no token).
//! Cleartext proves password knowledge against a server nonce; the encrypted
//! flows additionally derive a symmetric session key from a random-nonce
//! exchange. A TLS tunnel, when configured, is established before any of
//! this and is invisible here.

use log::debug;

use crate::error::{Error, Result};
use crate::protocol::constants::*;
use crate::protocol::crypto::{self, AesKey, AesMode, SessionCrypto};
use crate::protocol::frame::FrameStream;

/// Username and password, copied at connect time.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Client state carried between encrypted phase 1 and the server reply.
struct EncryptState {
    mode: AesMode,
    x: [u8; RANDPOOL_SIZE],
    password_hash2: [u8; SHA1_DIGEST_SIZE],
}

/// Run the handshake appropriate for the requested AES mode and token.
pub async fn authenticate(
    stream: &mut FrameStream,
    creds: &Credentials,
    token: Option<&str>,
    aes: Option<AesMode>,
) -> Result<()> {
    match (aes, token) {
        (None, None) => {
            debug!("handshake: cleartext");
            let nonce = clear_phase1(stream, creds, CLEAR_CONNECT_PHASE1).await?;
            clear_phase2(stream, creds, &nonce, CLEAR_CONNECT_PHASE2, None).await
        }
        (None, Some(token)) => {
            debug!("handshake: cleartext with token");
            let nonce = clear_phase1(stream, creds, CLEAR_TOKEN_CONNECT1).await?;
            clear_phase2(stream, creds, &nonce, CLEAR_TOKEN_CONNECT2, Some(token)).await
        }
        (Some(mode), None) => {
            debug!("handshake: encrypted {mode:?}");
            let state = encrypt_phase1(stream, creds, mode, ENCRYPT_CONNECT_PHASE1).await?;
            let session = read_server_nonce(stream, state).await?;
            encrypt_phase2(stream, creds, &session, ENCRYPT_CONNECT_PHASE2, None).await?;
            stream.install_crypto(session);
            Ok(())
        }
        (Some(mode), Some(token)) => {
            debug!("handshake: encrypted {mode:?} with token");
            let state = encrypt_phase1(stream, creds, mode, ENCRYPT_TOKEN_CONNECT1).await?;
            let session = read_server_nonce(stream, state).await?;
            encrypt_phase2(stream, creds, &session, ENCRYPT_TOKEN_CONNECT2, Some(token)).await?;
            stream.install_crypto(session);
            Ok(())
        }
    }
}

/// The NUL-terminated username field.
///
/// The 2011 protocol never sends the username itself: it is SHA1-hashed and
/// hex-encoded, salted with the hex of the phase-1 IV when one is in play.
/// The 2007 protocol sends it in the clear.
fn username_field(old_protocol: bool, username: &str, iv: Option<&[u8; BLOCK_LEN]>) -> Vec<u8> {
    let mut field = if old_protocol {
        username.as_bytes().to_vec()
    } else {
        let hex = match iv {
            Some(iv) => {
                let mut salted = username.as_bytes().to_vec();
                salted.extend_from_slice(crypto::to_hex(iv).as_bytes());
                crypto::to_hex(&crypto::sha1(&salted))
            }
            None => crypto::to_hex(&crypto::sha1(username.as_bytes())),
        };
        hex.into_bytes()
    };
    field.push(0);
    field
}

/// Cleartext phase 1: send the username, receive the server nonce.
async fn clear_phase1(
    stream: &mut FrameStream,
    creds: &Credentials,
    selector: u8,
) -> Result<[u8; RANDPOOL_SIZE]> {
    let field = username_field(stream.old_protocol(), &creds.username, None);
    let size = field.len() as u32;
    let header = stream.request_header(size + 4, 1, COMMAND_CONNECT, selector);
    stream.write_frame(&header, &[size], &[&field]).await?;

    let frame = stream
        .read_frame(Some(RANDPOOL_SIZE as u32), Some(1))
        .await?;
    let mut nonce = [0u8; RANDPOOL_SIZE];
    nonce.copy_from_slice(&frame.payload);
    Ok(nonce)
}

/// Cleartext phase 2: send `H(R ‖ H(H(P)))`, plus the raw token if present.
async fn clear_phase2(
    stream: &mut FrameStream,
    creds: &Credentials,
    nonce: &[u8; RANDPOOL_SIZE],
    selector: u8,
    token: Option<&str>,
) -> Result<()> {
    let mut salted = Vec::with_capacity(RANDPOOL_SIZE + SHA1_DIGEST_SIZE);
    salted.extend_from_slice(nonce);
    salted.extend_from_slice(&crypto::sha1_twice(creds.password.as_bytes()));
    let proof = crypto::sha1(&salted);

    let token_field;
    let mut sizes = vec![SHA1_DIGEST_SIZE as u32];
    let mut fields: Vec<&[u8]> = vec![&proof];
    if let Some(token) = token {
        let mut data = token.as_bytes().to_vec();
        data.push(0);
        token_field = data;
        sizes.push(token_field.len() as u32);
        fields.push(&token_field);
    }

    let packet_size = sizes.iter().sum::<u32>() + sizes.len() as u32 * 4;
    let header = stream.request_header(packet_size, sizes.len() as u32, COMMAND_CONNECT, selector);
    stream.write_frame(&header, &sizes, &fields).await?;

    stream.read_frame(Some(0), Some(0)).await?;
    Ok(())
}

/// Encrypted phase 1: send the username alongside `AESCBC(X ‖ H(X))` under
/// `H(H(P))`, advertising the AES mode in the header.
async fn encrypt_phase1(
    stream: &mut FrameStream,
    creds: &Credentials,
    mode: AesMode,
    selector: u8,
) -> Result<EncryptState> {
    let x = crypto::random_nonce();
    let password_hash2 = crypto::sha1_twice(creds.password.as_bytes());
    let key = AesKey::new(AesMode::Aes128, &password_hash2[..16]);

    let mut plain = Vec::with_capacity(RANDPOOL_SIZE + SHA1_DIGEST_SIZE);
    plain.extend_from_slice(&x);
    plain.extend_from_slice(&crypto::sha1(&x));
    let iv = crypto::random_iv();
    let sealed = crypto::encrypt(&key, &iv, &plain);

    let user = username_field(stream.old_protocol(), &creds.username, Some(&iv));
    let sizes = [user.len() as u32, sealed.len() as u32];
    let packet_size = sizes.iter().sum::<u32>() + 8;

    let mut header = stream.request_header(packet_size, 2, COMMAND_CONNECT, selector);
    header.encrypted = mode.wire_code();
    stream.write_frame(&header, &sizes, &[&user, &sealed]).await?;

    Ok(EncryptState {
        mode,
        x,
        password_hash2,
    })
}

/// Encrypted phase 1.5: receive `AESCBC(Y ‖ H(Y))`, verify it, and derive the
/// session key from the nonce pair.
async fn read_server_nonce(
    stream: &mut FrameStream,
    state: EncryptState,
) -> Result<SessionCrypto> {
    let expected = (BLOCK_LEN + RANDPOOL_SIZE + SHA1_DIGEST_SIZE) as u32;
    let frame = stream.read_frame(Some(expected), Some(1)).await?;

    let key = AesKey::new(AesMode::Aes128, &state.password_hash2[..16]);
    let plain = crypto::decrypt(&key, &frame.payload);

    let mut y = [0u8; RANDPOOL_SIZE];
    y.copy_from_slice(&plain[..RANDPOOL_SIZE]);
    if crypto::sha1(&y)[..] != plain[RANDPOOL_SIZE..] {
        return Err(Error::auth("server nonce failed verification".to_string()));
    }

    let session_key = crypto::derive_session_key(state.mode, &state.password_hash2, &state.x, &y);
    Ok(SessionCrypto::new(state.mode, &session_key))
}

/// Encrypted phase 2: prove password knowledge with `AESCBC(H(P))` under the
/// session key, plus the session-encrypted token if present.
async fn encrypt_phase2(
    stream: &mut FrameStream,
    creds: &Credentials,
    session: &SessionCrypto,
    selector: u8,
    token: Option<&str>,
) -> Result<()> {
    let proof = crypto::sha1(creds.password.as_bytes());
    let sealed = crypto::encrypt(&session.encrypt_key, &crypto::random_iv(), &proof);

    let sealed_token;
    let mut sizes = vec![sealed.len() as u32];
    let mut fields: Vec<&[u8]> = vec![&sealed];
    if let Some(token) = token {
        let mut data = token.as_bytes().to_vec();
        data.push(0);
        sealed_token = crypto::encrypt(&session.encrypt_key, &crypto::random_iv(), &data);
        sizes.push(sealed_token.len() as u32);
        fields.push(&sealed_token);
    }

    let packet_size = sizes.iter().sum::<u32>() + sizes.len() as u32 * 4;
    let header = stream.request_header(packet_size, sizes.len() as u32, COMMAND_CONNECT, selector);
    stream.write_frame(&header, &sizes, &fields).await?;

    stream.read_frame(Some(0), Some(0)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_is_hashed_in_new_protocol() {
        let field = username_field(false, "admin", None);
        assert_eq!(field.len(), SHA1_DIGEST_SIZE * 2 + 1);
        assert_eq!(*field.last().unwrap(), 0);
        let expected = crypto::to_hex(&crypto::sha1(b"admin"));
        assert_eq!(&field[..40], expected.as_bytes());
    }

    #[test]
    fn username_is_clear_in_old_protocol() {
        let field = username_field(true, "admin", None);
        assert_eq!(field, b"admin\0");
    }

    #[test]
    fn salted_username_depends_on_iv() {
        let iv_a = [0u8; BLOCK_LEN];
        let iv_b = [1u8; BLOCK_LEN];
        let a = username_field(false, "admin", Some(&iv_a));
        let b = username_field(false, "admin", Some(&iv_b));
        assert_ne!(a, b);

        let mut salted = b"admin".to_vec();
        salted.extend_from_slice(crypto::to_hex(&iv_a).as_bytes());
        let expected = crypto::to_hex(&crypto::sha1(&salted));
        assert_eq!(&a[..40], expected.as_bytes());
    }
}
