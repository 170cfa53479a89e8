use crate::address::{Address, Network};
use alloy::signers::SignerSync;
use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::B256;
use anyhow::{Context, Result};

/// Signs transaction digests on behalf of one account.
pub trait Signer: Send + Sync {
    /// Returns `r || s || v` over a 32 byte digest.
    fn sign(&self, digest: &[u8; 32]) -> Result<[u8; 65]>;

    fn address(&self) -> Address;
}

/// secp256k1 key held in memory.
pub struct LocalSigner {
    inner: PrivateKeySigner,
    address: Address,
}

impl LocalSigner {
    pub fn from_hex(private_key: &str, network: Network) -> Result<Self> {
        let inner: PrivateKeySigner = private_key
            .trim()
            .parse()
            .context("Failed to parse private key")?;

        // Same keccak derived account hash as an EVM address, behind the network prefix.
        let address = Address::from_raw_without_prefix(inner.address().as_slice(), network)?;

        Ok(Self { inner, address })
    }
}

impl Signer for LocalSigner {
    fn sign(&self, digest: &[u8; 32]) -> Result<[u8; 65]> {
        let signature = self
            .inner
            .sign_hash_sync(&B256::from(*digest))
            .context("Failed to sign digest")?;
        Ok(signature.as_bytes())
    }

    fn address(&self) -> Address {
        self.address
    }
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::sha256;

    // Well known development key (private key = 1).
    const KEY: &str = "0000000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn test_address_derivation() {
        let signer = LocalSigner::from_hex(KEY, Network::Mainnet).unwrap();
        assert_eq!(
            signer.address().hex(),
            "417e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_signature_layout() {
        let signer = LocalSigner::from_hex(KEY, Network::Mainnet).unwrap();
        let signature = signer.sign(&sha256(b"payload")).unwrap();
        assert!(signature[64] == 27 || signature[64] == 28);
        assert_ne!(&signature[..32], &[0u8; 32]);
    }

    #[test]
    fn test_invalid_key() {
        assert!(LocalSigner::from_hex("zz", Network::Mainnet).is_err());
    }
}
