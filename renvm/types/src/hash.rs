use {
    crate::ByteArray,
    sha2::Sha256,
    sha3::{Digest, Keccak256},
};

/// A 32-byte hash. Used for gateway, nonce, payload and transaction hashes.
pub type Hash256 = ByteArray<32>;

impl Hash256 {
    pub const LENGTH: usize = 32;
    pub const ZERO: Self = Self::from_inner([0; 32]);
}

pub trait HashExt {
    /// Keccak-256, used for every hash that ends up on an EVM-style chain.
    fn keccak256(&self) -> Hash256;

    /// SHA2-256, used for hashing network transactions.
    fn sha256(&self) -> Hash256;
}

impl<T> HashExt for T
where
    T: AsRef<[u8]>,
{
    fn keccak256(&self) -> Hash256 {
        let mut hasher = Keccak256::new();
        hasher.update(self.as_ref());
        Hash256::from_inner(hasher.finalize().into())
    }

    fn sha256(&self) -> Hash256 {
        let mut hasher = Sha256::new();
        hasher.update(self.as_ref());
        Hash256::from_inner(hasher.finalize().into())
    }
}
