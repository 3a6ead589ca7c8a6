// Auth module - cryptographic primitives and the SRP-6a engine

pub mod big_number;
pub mod crypto_hash;
pub mod srp6;

pub use big_number::BigNumber;
pub use crypto_hash::Sha1Hash;
pub use srp6::{Srp6Server, ServerEphemeral, SessionKeyResult, Srp6Error};
