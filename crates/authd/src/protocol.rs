// Wire codec - encode/decode the six datagram packet types.
//
// All multi-byte integers are little-endian, including the leading magic.
// Strings are ASCII, NUL-terminated; decoding fails if no terminator is
// found before the end of the buffer.

use authd_shared::util::ByteBuffer;

pub const MAGIC_SERVER_NEGOTIATE: u32 = 0xD003CA01;
pub const MAGIC_AUTH_NEGOTIATE: u32 = 0xD003CA10;
pub const MAGIC_SERVER_EPHEMERAL: u32 = 0xD003CA02;
pub const MAGIC_AUTH_EPHEMERAL: u32 = 0xD003CA20;
pub const MAGIC_SERVER_PROOF: u32 = 0xD003CA03;
pub const MAGIC_AUTH_PROOF: u32 = 0xD003CA30;
pub const MAGIC_ERROR_USER: u32 = 0xD003CAFF;
pub const MAGIC_ERROR_SESSION: u32 = 0xD003CAEE;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WireError {
    #[error("packet truncated")]
    Truncated,
    #[error("unrecognized magic number")]
    UnknownMagic,
    #[error("string missing NUL terminator")]
    MissingTerminator,
    #[error("length field exceeds remaining bytes")]
    LengthOverrun,
}

/// Error codes carried by ERROR_USER.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserErrorCode {
    TryLater = 0,
    NoExist = 1,
    OutdatedProtocol = 2,
    WillNotAuth = 3,
}

/// Error codes carried by ERROR_SESSION.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorCode {
    TryLater = 0,
    NoExist = 1,
    VerifierUnsafe = 2,
    AuthFailed = 3,
}

/// Decoded inbound SERVER_NEGOTIATE.
#[derive(Debug, Clone)]
pub struct ServerNegotiate {
    pub version: u8,
    pub client_session: u32,
    pub username: String,
}

/// Decoded inbound SERVER_EPHEMERAL.
#[derive(Debug, Clone)]
pub struct ServerEphemeralPacket {
    pub session_id: u32,
    pub client_ephemeral: Vec<u8>,
}

/// Decoded inbound SERVER_PROOF.
#[derive(Debug, Clone)]
pub struct ServerProofPacket {
    pub session_id: u32,
    pub proof: Vec<u8>,
}

/// Any recognized inbound datagram.
#[derive(Debug, Clone)]
pub enum Inbound {
    Negotiate(ServerNegotiate),
    Ephemeral(ServerEphemeralPacket),
    Proof(ServerProofPacket),
}

/// Reads a NUL-terminated ASCII string starting at `pos`, advancing `pos`
/// past the terminator. Fails if no NUL byte occurs before end-of-buffer.
fn read_cstr(data: &[u8], pos: &mut usize) -> Result<String, WireError> {
    let start = *pos;
    let mut end = start;
    while end < data.len() && data[end] != 0 {
        end += 1;
    }
    if end >= data.len() {
        return Err(WireError::MissingTerminator);
    }
    let s = String::from_utf8_lossy(&data[start..end]).into_owned();
    *pos = end + 1;
    Ok(s)
}

fn read_u32_at(data: &[u8], pos: &mut usize) -> Result<u32, WireError> {
    if *pos + 4 > data.len() {
        return Err(WireError::Truncated);
    }
    let val = u32::from_le_bytes([data[*pos], data[*pos + 1], data[*pos + 2], data[*pos + 3]]);
    *pos += 4;
    Ok(val)
}

fn read_u16_at(data: &[u8], pos: &mut usize) -> Result<u16, WireError> {
    if *pos + 2 > data.len() {
        return Err(WireError::Truncated);
    }
    let val = u16::from_le_bytes([data[*pos], data[*pos + 1]]);
    *pos += 2;
    Ok(val)
}

fn read_u8_at(data: &[u8], pos: &mut usize) -> Result<u8, WireError> {
    if *pos >= data.len() {
        return Err(WireError::Truncated);
    }
    let val = data[*pos];
    *pos += 1;
    Ok(val)
}

fn read_bytes_at(data: &[u8], pos: &mut usize, count: usize) -> Result<Vec<u8>, WireError> {
    if *pos + count > data.len() {
        return Err(WireError::LengthOverrun);
    }
    let bytes = data[*pos..*pos + count].to_vec();
    *pos += count;
    Ok(bytes)
}

/// Decode an inbound datagram by its leading magic.
pub fn decode(data: &[u8]) -> Result<Inbound, WireError> {
    let mut pos = 0;
    let magic = read_u32_at(data, &mut pos)?;

    match magic {
        MAGIC_SERVER_NEGOTIATE => decode_server_negotiate(data, pos).map(Inbound::Negotiate),
        MAGIC_SERVER_EPHEMERAL => decode_server_ephemeral(data, pos).map(Inbound::Ephemeral),
        MAGIC_SERVER_PROOF => decode_server_proof(data, pos).map(Inbound::Proof),
        _ => Err(WireError::UnknownMagic),
    }
}

/// A version byte other than `1` is parsed using the long (v2-shaped)
/// layout so `client_session` and `username` are always recoverable, even
/// for a version this core doesn't support. Validating the version itself
/// is the handler's job (it's the one that can reply `OUTDATED_PROTOCOL`
/// with the username the decoder just recovered).
fn decode_server_negotiate(data: &[u8], mut pos: usize) -> Result<ServerNegotiate, WireError> {
    let version = read_u8_at(data, &mut pos)?;

    if version == 1 {
        let username = read_cstr(data, &mut pos)?;
        Ok(ServerNegotiate {
            version,
            client_session: 0,
            username,
        })
    } else {
        let client_session = read_u32_at(data, &mut pos)?;
        let username = read_cstr(data, &mut pos)?;
        Ok(ServerNegotiate {
            version,
            client_session,
            username,
        })
    }
}

fn decode_server_ephemeral(data: &[u8], mut pos: usize) -> Result<ServerEphemeralPacket, WireError> {
    let session_id = read_u32_at(data, &mut pos)?;
    let eph_len = read_u16_at(data, &mut pos)? as usize;
    let client_ephemeral = read_bytes_at(data, &mut pos, eph_len)?;
    Ok(ServerEphemeralPacket {
        session_id,
        client_ephemeral,
    })
}

fn decode_server_proof(data: &[u8], mut pos: usize) -> Result<ServerProofPacket, WireError> {
    let session_id = read_u32_at(data, &mut pos)?;
    let proof_len = read_u16_at(data, &mut pos)? as usize;
    let proof = read_bytes_at(data, &mut pos, proof_len)?;
    Ok(ServerProofPacket { session_id, proof })
}

// ---- Encoders ----

/// v2: `magic u32 | 1 u8 | client_session u32 | session u32 | salt_len u8 | salt bytes | username cstr`.
/// v1 omits `client_session` entirely (shorter framing).
pub fn encode_auth_negotiate(
    protocol_version: u8,
    client_session: u32,
    session_id: u32,
    salt: &[u8],
    username: &str,
) -> Vec<u8> {
    let has_client_session = protocol_version != 1;
    let size = 4 + 1 + if has_client_session { 4 } else { 0 } + 4 + 1 + salt.len() + username.len() + 1;
    let mut buf = ByteBuffer::with_capacity(size);
    buf.write_u32(MAGIC_AUTH_NEGOTIATE);
    buf.write_u8(1);
    if has_client_session {
        buf.write_u32(client_session);
    }
    buf.write_u32(session_id);
    buf.write_u8(salt.len() as u8);
    buf.append(salt);
    buf.write_string(username);
    buf.contents().to_vec()
}

/// `magic u32 | session u32 | eph_len u16 | eph bytes`
pub fn encode_auth_ephemeral(session_id: u32, server_ephemeral: &[u8]) -> Vec<u8> {
    let size = 4 + 4 + 2 + server_ephemeral.len();
    let mut buf = ByteBuffer::with_capacity(size);
    buf.write_u32(MAGIC_AUTH_EPHEMERAL);
    buf.write_u32(session_id);
    buf.write_u16(server_ephemeral.len() as u16);
    buf.append(server_ephemeral);
    buf.contents().to_vec()
}

/// `magic u32 | session u32 | proof_len u16 | proof bytes`
pub fn encode_auth_proof(session_id: u32, server_proof: &[u8]) -> Vec<u8> {
    let size = 4 + 4 + 2 + server_proof.len();
    let mut buf = ByteBuffer::with_capacity(size);
    buf.write_u32(MAGIC_AUTH_PROOF);
    buf.write_u32(session_id);
    buf.write_u16(server_proof.len() as u16);
    buf.append(server_proof);
    buf.contents().to_vec()
}

/// `magic u32 | error u8 | username cstr`
pub fn encode_error_user(code: UserErrorCode, username: &str) -> Vec<u8> {
    let size = 4 + 1 + username.len() + 1;
    let mut buf = ByteBuffer::with_capacity(size);
    buf.write_u32(MAGIC_ERROR_USER);
    buf.write_u8(code as u8);
    buf.write_string(username);
    buf.contents().to_vec()
}

/// `magic u32 | error u8 | session u32`
pub fn encode_error_session(code: SessionErrorCode, session_id: u32) -> Vec<u8> {
    let size = 4 + 1 + 4;
    let mut buf = ByteBuffer::with_capacity(size);
    buf.write_u32(MAGIC_ERROR_SESSION);
    buf.write_u8(code as u8);
    buf.write_u32(session_id);
    buf.contents().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_server_negotiate_v1() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&MAGIC_SERVER_NEGOTIATE.to_le_bytes());
        raw.push(1);
        raw.extend_from_slice(b"alice\0");

        let decoded = decode(&raw).unwrap();
        match decoded {
            Inbound::Negotiate(n) => {
                assert_eq!(n.version, 1);
                assert_eq!(n.client_session, 0);
                assert_eq!(n.username, "alice");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_server_negotiate_v2() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&MAGIC_SERVER_NEGOTIATE.to_le_bytes());
        raw.push(2);
        raw.extend_from_slice(&42u32.to_le_bytes());
        raw.extend_from_slice(b"bob\0");

        let decoded = decode(&raw).unwrap();
        match decoded {
            Inbound::Negotiate(n) => {
                assert_eq!(n.version, 2);
                assert_eq!(n.client_session, 42);
                assert_eq!(n.username, "bob");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_server_negotiate_unknown_version_uses_long_layout() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&MAGIC_SERVER_NEGOTIATE.to_le_bytes());
        raw.push(9);
        raw.extend_from_slice(&42u32.to_le_bytes());
        raw.extend_from_slice(b"carol\0");

        let decoded = decode(&raw).unwrap();
        match decoded {
            Inbound::Negotiate(n) => {
                assert_eq!(n.version, 9);
                assert_eq!(n.client_session, 42);
                assert_eq!(n.username, "carol");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_rejects_missing_terminator() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&MAGIC_SERVER_NEGOTIATE.to_le_bytes());
        raw.push(1);
        raw.extend_from_slice(b"noterminator");
        let err = decode(&raw).unwrap_err();
        assert_eq!(err, WireError::MissingTerminator);
    }

    #[test]
    fn decode_rejects_unknown_magic() {
        let raw = 0xDEADBEEFu32.to_le_bytes();
        let err = decode(&raw).unwrap_err();
        assert_eq!(err, WireError::UnknownMagic);
    }

    #[test]
    fn decode_rejects_length_overrun() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&MAGIC_SERVER_EPHEMERAL.to_le_bytes());
        raw.extend_from_slice(&1u32.to_le_bytes());
        raw.extend_from_slice(&255u16.to_le_bytes());
        raw.extend_from_slice(&[1, 2, 3]);
        let err = decode(&raw).unwrap_err();
        assert_eq!(err, WireError::LengthOverrun);
    }

    #[test]
    fn decode_rejects_truncated_packet() {
        let raw = [0x01u8, 0xCA];
        let err = decode(&raw).unwrap_err();
        assert_eq!(err, WireError::Truncated);
    }

    #[test]
    fn encode_auth_negotiate_v2_round_trips_fields() {
        let packet = encode_auth_negotiate(2, 7, 99, &[1, 2, 3, 4], "alice");
        assert_eq!(&packet[0..4], &MAGIC_AUTH_NEGOTIATE.to_le_bytes());
        assert_eq!(packet[4], 1);
        assert_eq!(&packet[5..9], &7u32.to_le_bytes());
        assert_eq!(&packet[9..13], &99u32.to_le_bytes());
        assert_eq!(packet[13], 4);
        assert_eq!(&packet[14..18], &[1, 2, 3, 4]);
        assert_eq!(&packet[18..23], b"alice");
        assert_eq!(packet[23], 0);
    }

    #[test]
    fn encode_auth_negotiate_v1_omits_client_session() {
        let v1 = encode_auth_negotiate(1, 0, 99, &[1, 2, 3, 4], "alice");
        let v2 = encode_auth_negotiate(2, 0, 99, &[1, 2, 3, 4], "alice");
        assert_eq!(v1.len() + 4, v2.len());
        assert_eq!(&v1[5..9], &99u32.to_le_bytes());
    }

    #[test]
    fn encode_error_session_has_expected_layout() {
        let packet = encode_error_session(SessionErrorCode::AuthFailed, 5);
        assert_eq!(&packet[0..4], &MAGIC_ERROR_SESSION.to_le_bytes());
        assert_eq!(packet[4], SessionErrorCode::AuthFailed as u8);
        assert_eq!(&packet[5..9], &5u32.to_le_bytes());
    }
}
