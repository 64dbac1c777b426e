//! Threshold multisig keys, signer bitmaps and signature aggregation.

use prost::Message;

use cosmtx_types::proto::{self, CompactBitArray, MultiSignature};
use cosmtx_types::SdkError;

use crate::keys::PublicKey;

/// A `k`-of-`n` multisig public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LegacyAminoMultisig {
    pub threshold: u32,
    pub pubkeys: Vec<PublicKey>,
}

impl LegacyAminoMultisig {
    pub fn new(threshold: u32, pubkeys: Vec<PublicKey>) -> Result<Self, SdkError> {
        if threshold == 0 {
            return Err(SdkError::InvalidPubKey("threshold must be positive".into()));
        }
        if pubkeys.len() < threshold as usize {
            return Err(SdkError::InvalidPubKey(format!(
                "threshold {threshold} exceeds {} members",
                pubkeys.len()
            )));
        }
        Ok(Self { threshold, pubkeys })
    }

    pub fn to_proto(&self) -> proto::LegacyAminoPubKey {
        proto::LegacyAminoPubKey {
            threshold: self.threshold,
            public_keys: self.pubkeys.iter().map(PublicKey::to_any).collect(),
        }
    }

    pub fn from_proto(msg: &proto::LegacyAminoPubKey) -> Result<Self, SdkError> {
        let pubkeys = msg
            .public_keys
            .iter()
            .map(PublicKey::from_any)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(msg.threshold, pubkeys)
    }

    pub fn position(&self, member: &PublicKey) -> Option<usize> {
        self.pubkeys.iter().position(|k| k == member)
    }

    /// Verify an aggregate signature over `msg`. Passes when at least
    /// `threshold` sub-signatures verify against the distinct members set in
    /// `bits`, taken in bit order.
    pub fn verify(&self, msg: &[u8], bits: &CompactBitArray, sig: &MultiSignature) -> bool {
        if bit_count(bits) != self.pubkeys.len() {
            return false;
        }
        let signers: Vec<usize> = (0..self.pubkeys.len()).filter(|&i| get_bit(bits, i)).collect();
        if signers.len() != sig.signatures.len() || signers.len() < self.threshold as usize {
            return false;
        }
        let valid = signers
            .iter()
            .zip(&sig.signatures)
            .filter(|(i, s)| self.pubkeys[**i].verify(msg, s))
            .count();
        valid >= self.threshold as usize
    }

    /// Placeholder signature for gas simulation: `threshold` zeroed
    /// sub-signatures, one per leading member.
    pub fn sim_signature(&self) -> (CompactBitArray, MultiSignature) {
        let mut bits = new_bit_array(self.pubkeys.len());
        let mut signatures = Vec::with_capacity(self.threshold as usize);
        for (i, key) in self.pubkeys.iter().take(self.threshold as usize).enumerate() {
            set_bit(&mut bits, i, true);
            signatures.push(vec![0u8; key.signature_len()]);
        }
        (bits, MultiSignature { signatures })
    }

    pub fn sim_signature_bytes(&self) -> Vec<u8> {
        self.sim_signature().1.encode_to_vec()
    }
}

/// Accumulates member signatures into a `MultiSignature` plus bitmap.
#[derive(Debug, Clone)]
pub struct MultisigBuilder {
    key: LegacyAminoMultisig,
    bits: CompactBitArray,
    sig: MultiSignature,
}

impl MultisigBuilder {
    pub fn new(key: LegacyAminoMultisig) -> Self {
        let bits = new_bit_array(key.pubkeys.len());
        Self {
            key,
            bits,
            sig: MultiSignature::default(),
        }
    }

    /// Record `sig` for `member`. A repeat signature from the same member
    /// replaces the earlier one.
    pub fn add_signature(&mut self, member: &PublicKey, sig: Vec<u8>) -> Result<(), SdkError> {
        let index = self.key.position(member).ok_or_else(|| {
            SdkError::InvalidPubKey(format!("{} is not a member of this multisig", member.address()))
        })?;
        let slot = true_bits_before(&self.bits, index);
        if get_bit(&self.bits, index) {
            self.sig.signatures[slot] = sig;
        } else {
            set_bit(&mut self.bits, index, true);
            self.sig.signatures.insert(slot, sig);
        }
        Ok(())
    }

    pub fn signer_count(&self) -> usize {
        self.sig.signatures.len()
    }

    pub fn key(&self) -> &LegacyAminoMultisig {
        &self.key
    }

    pub fn finish(self) -> (CompactBitArray, MultiSignature) {
        (self.bits, self.sig)
    }
}

// ── CompactBitArray helpers ─────────────────────────────────────────────
//
// Bit `i` lives in `elems[i / 8]` at mask `0x80 >> (i % 8)`.
// `extra_bits_stored` is the number of used bits in the last byte.

pub fn new_bit_array(bits: usize) -> CompactBitArray {
    CompactBitArray {
        extra_bits_stored: (bits % 8) as u32,
        elems: vec![0u8; bits.div_ceil(8)],
    }
}

pub fn bit_count(bits: &CompactBitArray) -> usize {
    match bits.extra_bits_stored {
        0 => bits.elems.len() * 8,
        extra => bits.elems.len().saturating_sub(1) * 8 + extra as usize,
    }
}

pub fn get_bit(bits: &CompactBitArray, i: usize) -> bool {
    i < bit_count(bits) && bits.elems[i >> 3] & (0x80 >> (i % 8)) != 0
}

pub fn set_bit(bits: &mut CompactBitArray, i: usize, value: bool) -> bool {
    if i >= bit_count(bits) {
        return false;
    }
    let mask = 0x80u8 >> (i % 8);
    if value {
        bits.elems[i >> 3] |= mask;
    } else {
        bits.elems[i >> 3] &= !mask;
    }
    true
}

/// Number of set bits strictly before `index`.
pub fn true_bits_before(bits: &CompactBitArray, index: usize) -> usize {
    (0..index.min(bit_count(bits))).filter(|&i| get_bit(bits, i)).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{KeyAlgo, PrivateKey};

    fn members(n: usize) -> Vec<PrivateKey> {
        (0..n)
            .map(|_| PrivateKey::generate(KeyAlgo::Secp256k1).unwrap())
            .collect()
    }

    fn multisig(k: u32, sks: &[PrivateKey]) -> LegacyAminoMultisig {
        LegacyAminoMultisig::new(k, sks.iter().map(PrivateKey::public_key).collect()).unwrap()
    }

    #[test]
    fn bit_array_layout() {
        let mut bits = new_bit_array(10);
        assert_eq!(bits.elems.len(), 2);
        assert_eq!(bits.extra_bits_stored, 2);
        assert_eq!(bit_count(&bits), 10);
        set_bit(&mut bits, 0, true);
        set_bit(&mut bits, 9, true);
        assert_eq!(bits.elems, vec![0x80, 0x40]);
        assert!(!set_bit(&mut bits, 10, true));
        assert_eq!(true_bits_before(&bits, 9), 1);
    }

    #[test]
    fn two_of_three_verifies() {
        let sks = members(3);
        let key = multisig(2, &sks);
        let msg = b"amino sign bytes";
        let mut builder = MultisigBuilder::new(key.clone());
        // Out-of-order insertion still yields bit order.
        builder.add_signature(&sks[2].public_key(), sks[2].sign(msg).unwrap()).unwrap();
        builder.add_signature(&sks[0].public_key(), sks[0].sign(msg).unwrap()).unwrap();
        let (bits, sig) = builder.finish();
        assert!(get_bit(&bits, 0) && !get_bit(&bits, 1) && get_bit(&bits, 2));
        assert!(sks[0].public_key().verify(msg, &sig.signatures[0]));
        assert!(key.verify(msg, &bits, &sig));
    }

    #[test]
    fn below_threshold_fails() {
        let sks = members(3);
        let key = multisig(2, &sks);
        let msg = b"x";
        let mut builder = MultisigBuilder::new(key.clone());
        builder.add_signature(&sks[1].public_key(), sks[1].sign(msg).unwrap()).unwrap();
        let (bits, sig) = builder.finish();
        assert!(!key.verify(msg, &bits, &sig));
    }

    #[test]
    fn bad_sub_signature_counted_out() {
        let sks = members(3);
        let key = multisig(2, &sks);
        let msg = b"x";
        let mut builder = MultisigBuilder::new(key.clone());
        builder.add_signature(&sks[0].public_key(), sks[0].sign(msg).unwrap()).unwrap();
        builder.add_signature(&sks[1].public_key(), sks[1].sign(b"other").unwrap()).unwrap();
        let (bits, sig) = builder.finish();
        assert!(!key.verify(msg, &bits, &sig));

        let mut builder = MultisigBuilder::new(key.clone());
        for sk in &sks[..2] {
            builder.add_signature(&sk.public_key(), sk.sign(msg).unwrap()).unwrap();
        }
        builder.add_signature(&sks[2].public_key(), vec![0u8; 64]).unwrap();
        let (bits, sig) = builder.finish();
        assert!(key.verify(msg, &bits, &sig));
    }

    #[test]
    fn non_member_rejected() {
        let sks = members(2);
        let mut builder = MultisigBuilder::new(multisig(1, &sks));
        let outsider = PrivateKey::generate(KeyAlgo::Secp256k1).unwrap().public_key();
        assert!(builder.add_signature(&outsider, vec![0; 64]).is_err());
    }

    #[test]
    fn resigning_replaces() {
        let sks = members(2);
        let mut builder = MultisigBuilder::new(multisig(1, &sks));
        builder.add_signature(&sks[0].public_key(), vec![1; 64]).unwrap();
        builder.add_signature(&sks[0].public_key(), vec![2; 64]).unwrap();
        assert_eq!(builder.signer_count(), 1);
    }

    #[test]
    fn sim_signature_has_threshold_entries() {
        let sks = members(4);
        let (bits, sig) = multisig(3, &sks).sim_signature();
        assert_eq!(sig.signatures.len(), 3);
        assert!(sig.signatures.iter().all(|s| s.len() == 64 && s.iter().all(|b| *b == 0)));
        assert_eq!(true_bits_before(&bits, 4), 3);
    }

    #[test]
    fn threshold_bounds() {
        let sks = members(2);
        let keys: Vec<_> = sks.iter().map(PrivateKey::public_key).collect();
        assert!(LegacyAminoMultisig::new(0, keys.clone()).is_err());
        assert!(LegacyAminoMultisig::new(3, keys).is_err());
    }
}
