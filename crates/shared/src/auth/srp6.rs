// SRP-6a server-side engine.
//
// Implements the fixed RFC 5054 2048-bit group (N, g=2, H=SHA-1), computing
// the multiplier k = H(N, g) rather than hardcoding it.

use subtle::ConstantTimeEq;

use super::big_number::BigNumber;
use super::crypto_hash::Sha1Hash;

/// RFC 5054 2048-bit group prime N, as a hex string.
const N_HEX: &str = "AC6BDB41324A9A9BF166DE5E1389582FAF72B6651987EE07FC3192943DB56050A37329CBB4A099ED8193E0757767A13DD52312AB4B03310DCD7F48A9DA04FD50E8083969EDB767B0CF6095179A163AB3661A05FBD5FAAAE82918A9962F0B93B855F97993EC975EEAA80D740ADBF4FF747359D041D5C33EA71D281E446B14773BCA97B43A23FB801676BD207A436C6481F1D2B9078717461A5B9D32E688F87748544523B524B0D57D5EA77A2775D2ECFA032CFBDBF52FB3786160279004E57AE6AF874E7303CE53299CCC041C7BC308D82A5698F3A8D0C38271AE35F8E9DBFBB694B5C803D89F7AE435DE236D525F54759B65E372FCD68EF20FA7111F9E4AFF73";

/// Server-side SRP-6a engine: fixed group parameters plus the derived
/// multiplier k. One instance is shared across all sessions.
pub struct Srp6Server {
    n: BigNumber,
    g: BigNumber,
    k: BigNumber,
}

/// Output of [`Srp6Server::server_ephemeral`]: the public `B` and the private
/// exponent `b` that must be kept alongside it for the next step.
pub struct ServerEphemeral {
    pub big_b: BigNumber,
    pub b: BigNumber,
}

/// Output of [`Srp6Server::session_key`]: the derived session key plus the
/// two proof hashes the protocol state machine needs for the remaining steps.
pub struct SessionKeyResult {
    pub session_key: BigNumber,
    pub expected_proof: [u8; 20],
    pub server_proof: [u8; 20],
}

/// Reasons [`Srp6Server::session_key`] can refuse to proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Srp6Error {
    #[error("client ephemeral A is congruent to 0 mod N")]
    UnsafeClientEphemeral,
    #[error("scrambling parameter u is 0")]
    ZeroScramblingParameter,
}

impl Default for Srp6Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Srp6Server {
    /// Fixed width (bytes) of N, B, A, and the premaster secret on the wire.
    pub const GROUP_BYTE_SIZE: usize = 256;
    /// Width (bytes) of the salt this core generates. The wire format accepts
    /// any 1-255 byte salt from a decoder's point of view.
    pub const SALT_BYTE_SIZE: usize = 4;

    pub fn new() -> Self {
        let n = {
            let mut bn = BigNumber::new();
            bn.set_hex_str(N_HEX);
            bn
        };
        let g = BigNumber::from_u32(2);
        let k = Self::compute_k(&n, &g);
        Srp6Server { n, g, k }
    }

    fn compute_k(n: &BigNumber, g: &BigNumber) -> BigNumber {
        let mut sha = Sha1Hash::new();
        sha.update_data_bytes(&n.as_byte_array_be(Self::GROUP_BYTE_SIZE));
        sha.update_data_bytes(&g.as_byte_array_be(Self::GROUP_BYTE_SIZE));
        sha.finalize();
        BigNumber::from_bytes_be(sha.get_digest())
    }

    pub fn prime(&self) -> &BigNumber {
        &self.n
    }

    pub fn generator(&self) -> &BigNumber {
        &self.g
    }

    /// `x = H(salt | H(username | ':' | password))`; `v = g^x mod N`.
    ///
    /// `username` must already be lowercased by the caller. `salt` and the
    /// returned verifier are big-endian byte strings.
    pub fn compute_verifier(salt: &[u8], username: &str, password: &str) -> BigNumber {
        let engine = Self::new();

        let mut inner = Sha1Hash::new();
        inner.update_data(username);
        inner.update_data_bytes(b":");
        inner.update_data(password);
        inner.finalize();

        let mut outer = Sha1Hash::new();
        outer.update_data_bytes(salt);
        outer.update_data_bytes(inner.get_digest());
        outer.finalize();

        let x = BigNumber::from_bytes_be(outer.get_digest());
        engine.g.mod_exp(&x, &engine.n)
    }

    /// `b` uniformly random in `[1, N-1]`; `B = (k*v + g^b) mod N`.
    /// Regenerates if `B mod N` comes out to zero (vanishingly unlikely, but
    /// required so the handshake can never hand out an unsafe public value).
    pub fn server_ephemeral(&self, verifier: &BigNumber) -> ServerEphemeral {
        loop {
            let mut b = BigNumber::random_below(&self.n);
            while b.is_zero() {
                b = BigNumber::random_below(&self.n);
            }

            let g_pow_b = self.g.mod_exp(&b, &self.n);
            let k_v = &self.k * verifier;
            let sum = &k_v + &g_pow_b;
            let big_b = &sum % &self.n;

            if !big_b.is_zero() {
                return ServerEphemeral { big_b, b };
            }
        }
    }

    /// `u = H(A, B)`; `S = (A * v^u)^b mod N`; derives `K`, `M_expected`, and `HAMK`.
    pub fn session_key(
        &self,
        client_a: &BigNumber,
        b: &BigNumber,
        big_b: &BigNumber,
        verifier: &BigNumber,
        username: &str,
        salt: &[u8],
    ) -> Result<SessionKeyResult, Srp6Error> {
        let a_mod_n = client_a % &self.n;
        if a_mod_n.is_zero() {
            return Err(Srp6Error::UnsafeClientEphemeral);
        }

        let u = self.scrambling_parameter(client_a, big_b);
        if u.is_zero() {
            return Err(Srp6Error::ZeroScramblingParameter);
        }

        let v_pow_u = verifier.mod_exp(&u, &self.n);
        let base = client_a * &v_pow_u;
        let s = base.mod_exp(b, &self.n);

        let mut k_hash = Sha1Hash::new();
        k_hash.update_data_bytes(&s.as_byte_array_be(Self::GROUP_BYTE_SIZE));
        k_hash.finalize();
        let session_key = BigNumber::from_bytes_be(k_hash.get_digest());

        let expected_proof = self.expected_proof(username, salt, client_a, big_b, &session_key);
        let server_proof = Self::server_proof(client_a, &expected_proof, &session_key);

        Ok(SessionKeyResult {
            session_key,
            expected_proof,
            server_proof,
        })
    }

    fn scrambling_parameter(&self, client_a: &BigNumber, big_b: &BigNumber) -> BigNumber {
        let mut sha = Sha1Hash::new();
        sha.update_data_bytes(&client_a.as_byte_array_be(Self::GROUP_BYTE_SIZE));
        sha.update_data_bytes(&big_b.as_byte_array_be(Self::GROUP_BYTE_SIZE));
        sha.finalize();
        BigNumber::from_bytes_be(sha.get_digest())
    }

    /// `M = H(H(N) XOR H(g), H(username), salt, A, B, K)`.
    fn expected_proof(
        &self,
        username: &str,
        salt: &[u8],
        client_a: &BigNumber,
        big_b: &BigNumber,
        session_key: &BigNumber,
    ) -> [u8; 20] {
        let mut h_n = Sha1Hash::new();
        h_n.update_data_bytes(&self.n.as_byte_array_be(Self::GROUP_BYTE_SIZE));
        h_n.finalize();
        let mut xored = *h_n.get_digest();

        let mut h_g = Sha1Hash::new();
        h_g.update_data_bytes(&self.g.as_byte_array_be(Self::GROUP_BYTE_SIZE));
        h_g.finalize();
        for (byte, g_byte) in xored.iter_mut().zip(h_g.get_digest().iter()) {
            *byte ^= g_byte;
        }

        let mut h_user = Sha1Hash::new();
        h_user.update_data(username);
        h_user.finalize();

        let mut m = Sha1Hash::new();
        m.update_data_bytes(&xored);
        m.update_data_bytes(h_user.get_digest());
        m.update_data_bytes(salt);
        m.update_data_bytes(&client_a.as_byte_array_be(Self::GROUP_BYTE_SIZE));
        m.update_data_bytes(&big_b.as_byte_array_be(Self::GROUP_BYTE_SIZE));
        m.update_data_bytes(&session_key.as_byte_array_be(Sha1Hash::DIGEST_LENGTH));
        m.finalize();
        *m.get_digest()
    }

    /// `HAMK = H(A, M, K)`.
    fn server_proof(client_a: &BigNumber, m: &[u8; 20], session_key: &BigNumber) -> [u8; 20] {
        let mut sha = Sha1Hash::new();
        sha.update_data_bytes(&client_a.as_byte_array_be(Self::GROUP_BYTE_SIZE));
        sha.update_data_bytes(m);
        sha.update_data_bytes(&session_key.as_byte_array_be(Sha1Hash::DIGEST_LENGTH));
        sha.finalize();
        *sha.get_digest()
    }

    /// Constant-time comparison of the client's proof against the expected one.
    pub fn verify_proof(client_m: &[u8], expected_m: &[u8; 20]) -> bool {
        if client_m.len() != expected_m.len() {
            return false;
        }
        client_m.ct_eq(expected_m).into()
    }
}
