//! Nullable hardware signer: a secp256k1 key behind the device trait.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use k256::ecdsa::signature::Signer;
use k256::ecdsa::{Signature, SigningKey};

use cosmtx_crypto::{secp256k1, HdPath, LedgerDevice, PublicKey};
use cosmtx_types::SdkError;

/// Signs with an in-memory key and returns DER like a real device. The key
/// can be swapped from the test to simulate a different device being
/// plugged in.
#[derive(Clone)]
pub struct NullLedgerDevice {
    key: Arc<Mutex<SigningKey>>,
    closed: Arc<Mutex<bool>>,
}

impl NullLedgerDevice {
    pub fn new(secret: [u8; 32]) -> Result<Self, SdkError> {
        Ok(Self {
            key: Arc::new(Mutex::new(secp256k1::signing_key_from_bytes(&secret)?)),
            closed: Arc::new(Mutex::new(false)),
        })
    }

    /// Replace the key the device signs with.
    pub fn swap_key(&self, secret: [u8; 32]) -> Result<(), SdkError> {
        *self.key() = secp256k1::signing_key_from_bytes(&secret)?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key(&self) -> MutexGuard<'_, SigningKey> {
        self.key.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LedgerDevice for NullLedgerDevice {
    fn get_public_key(&mut self, _path: &HdPath) -> Result<Vec<u8>, SdkError> {
        Ok(secp256k1::public_key(&self.key()).to_vec())
    }

    fn get_address_and_public_key(
        &mut self,
        path: &HdPath,
        hrp: &str,
    ) -> Result<(Vec<u8>, String), SdkError> {
        let pk = self.get_public_key(path)?;
        let address = PublicKey::secp256k1(&pk)?.address().to_bech32(hrp);
        Ok((pk, address))
    }

    fn sign(&mut self, _path: &HdPath, msg: &[u8]) -> Result<Vec<u8>, SdkError> {
        let sig: Signature = self.key().sign(msg);
        Ok(sig.to_der().as_bytes().to_vec())
    }

    fn close(&mut self) -> Result<(), SdkError> {
        *self.closed.lock().unwrap_or_else(PoisonError::into_inner) = true;
        Ok(())
    }
}
