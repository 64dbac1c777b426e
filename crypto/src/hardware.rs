//! Hardware-backed secp256k1 signing.
//!
//! The device holds the secret; the host keeps only the compressed public
//! key. Every signature request re-reads the key from the device first and
//! refuses to sign if it changed (a different device or app was plugged in).

use std::sync::Mutex;

use tracing::{debug, warn};

use cosmtx_types::SdkError;

use crate::keys::PublicKey;
use crate::mnemonic::HdPath;
use crate::secp256k1;

/// Transport to a hardware signer running the Cosmos app.
pub trait LedgerDevice: Send {
    /// Compressed 33-byte public key at `path`.
    fn get_public_key(&mut self, path: &HdPath) -> Result<Vec<u8>, SdkError>;

    /// Public key plus the bech32 address the device displays for `hrp`.
    fn get_address_and_public_key(
        &mut self,
        path: &HdPath,
        hrp: &str,
    ) -> Result<(Vec<u8>, String), SdkError>;

    /// Sign `msg`; returns a DER-encoded ECDSA signature.
    fn sign(&mut self, path: &HdPath, msg: &[u8]) -> Result<Vec<u8>, SdkError>;

    fn close(&mut self) -> Result<(), SdkError>;
}

pub struct HardwareKey {
    device: Mutex<Box<dyn LedgerDevice>>,
    path: HdPath,
    cached: [u8; secp256k1::PUBKEY_LEN],
}

impl HardwareKey {
    /// Open a key at `path`, caching its public key.
    pub fn open(mut device: Box<dyn LedgerDevice>, path: HdPath) -> Result<Self, SdkError> {
        let cached = read_pubkey(device.as_mut(), &path)?;
        debug!(%path, "hardware key opened");
        Ok(Self {
            device: Mutex::new(device),
            path,
            cached,
        })
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::Secp256k1(self.cached)
    }

    pub fn path(&self) -> &HdPath {
        &self.path
    }

    /// Ask the device for its address under `hrp` and check it matches the
    /// cached key.
    pub fn show_address(&self, hrp: &str) -> Result<String, SdkError> {
        let mut device = self.lock()?;
        let (pk, addr) = device.get_address_and_public_key(&self.path, hrp)?;
        if pk.as_slice() != self.cached.as_slice() {
            return Err(SdkError::Keyring("device returned a different public key".into()));
        }
        Ok(addr)
    }

    /// Sign on the device and return 64-byte low-S `R ‖ S`.
    pub fn sign(&self, msg: &[u8]) -> Result<Vec<u8>, SdkError> {
        let mut device = self.lock()?;
        let current = read_pubkey(device.as_mut(), &self.path)?;
        if current != self.cached {
            warn!(path = %self.path, "device public key changed; refusing to sign");
            return Err(SdkError::Keyring(
                "device public key does not match the cached key".into(),
            ));
        }
        let der = device.sign(&self.path, msg)?;
        Ok(secp256k1::der_to_rs(&der)?.to_vec())
    }

    pub fn close(&self) -> Result<(), SdkError> {
        self.lock()?.close()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Box<dyn LedgerDevice>>, SdkError> {
        self.device
            .lock()
            .map_err(|_| SdkError::Keyring("hardware device lock poisoned".into()))
    }
}

impl std::fmt::Debug for HardwareKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareKey")
            .field("path", &self.path)
            .field("pubkey", &hex::encode(self.cached))
            .finish()
    }
}

fn read_pubkey(
    device: &mut dyn LedgerDevice,
    path: &HdPath,
) -> Result<[u8; secp256k1::PUBKEY_LEN], SdkError> {
    let pk = device.get_public_key(path)?;
    secp256k1::validate_pubkey(&pk)?;
    let mut out = [0u8; secp256k1::PUBKEY_LEN];
    out.copy_from_slice(&pk);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::signature::Signer;
    use k256::ecdsa::{Signature, SigningKey};
    use std::sync::{Arc, Mutex as StdMutex};

    /// In-test device with a swappable key.
    struct FakeDevice {
        key: Arc<StdMutex<SigningKey>>,
    }

    impl LedgerDevice for FakeDevice {
        fn get_public_key(&mut self, _path: &HdPath) -> Result<Vec<u8>, SdkError> {
            Ok(secp256k1::public_key(&self.key.lock().unwrap()).to_vec())
        }

        fn get_address_and_public_key(
            &mut self,
            path: &HdPath,
            hrp: &str,
        ) -> Result<(Vec<u8>, String), SdkError> {
            let pk = self.get_public_key(path)?;
            let addr = PublicKey::secp256k1(&pk)?.address().to_bech32(hrp);
            Ok((pk, addr))
        }

        fn sign(&mut self, _path: &HdPath, msg: &[u8]) -> Result<Vec<u8>, SdkError> {
            let sig: Signature = self.key.lock().unwrap().sign(msg);
            Ok(sig.to_der().as_bytes().to_vec())
        }

        fn close(&mut self) -> Result<(), SdkError> {
            Ok(())
        }
    }

    fn device(seed: u8) -> (Arc<StdMutex<SigningKey>>, Box<dyn LedgerDevice>) {
        let key = Arc::new(StdMutex::new(secp256k1::signing_key_from_bytes(&[seed; 32]).unwrap()));
        (key.clone(), Box::new(FakeDevice { key }))
    }

    #[test]
    fn signs_with_rs_encoding() {
        let (_, dev) = device(5);
        let hw = HardwareKey::open(dev, HdPath::default()).unwrap();
        let sig = hw.sign(b"sign me").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(hw.public_key().verify(b"sign me", &sig));
    }

    #[test]
    fn refuses_when_device_key_changes() {
        let (key, dev) = device(5);
        let hw = HardwareKey::open(dev, HdPath::default()).unwrap();
        *key.lock().unwrap() = secp256k1::signing_key_from_bytes(&[6; 32]).unwrap();
        assert!(matches!(hw.sign(b"x"), Err(SdkError::Keyring(_))));
    }

    #[test]
    fn show_address_matches_key() {
        let (_, dev) = device(7);
        let hw = HardwareKey::open(dev, HdPath::default()).unwrap();
        let addr = hw.show_address("cosmos").unwrap();
        assert_eq!(addr, hw.public_key().address().to_bech32("cosmos"));
    }
}
