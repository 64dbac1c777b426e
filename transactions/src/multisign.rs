//! Combining member signatures into a multisig signature.

use tracing::info;

use cosmtx_crypto::{LegacyAminoMultisig, MultisigBuilder, PublicKey};
use cosmtx_types::{SdkError, SignMode};

use crate::builder::TxBuilder;
use crate::factory::Factory;
use crate::signing::{SignatureData, SignatureV2, SignerData};

fn multisig_signer(factory: &Factory, multisig: &LegacyAminoMultisig) -> SignerData {
    let pubkey = PublicKey::Multisig(multisig.clone());
    SignerData {
        address: pubkey.address(),
        chain_id: factory.chain_id().to_string(),
        account_number: factory.account_number(),
        sequence: factory.sequence(),
        pubkey,
    }
}

/// Sign `builder` with the member key `key_name` on behalf of `multisig`.
/// The factory's account number and sequence must be the multisig account's.
/// The builder is left untouched; the returned signature goes into a
/// signature file for [`multisign`].
pub async fn sign_as_member(
    factory: &Factory,
    key_name: &str,
    multisig: &LegacyAminoMultisig,
    builder: &TxBuilder,
) -> Result<SignatureV2, SdkError> {
    let keyring = factory.keyring()?;
    let member = keyring.key(key_name)?.pubkey;
    if multisig.position(&member).is_none() {
        return Err(SdkError::InvalidSigner(format!(
            "{} is not a member of the multisig",
            member.address()
        )));
    }
    let signer = multisig_signer(factory, multisig);
    if !builder.signers().contains(&signer.address) {
        return Err(SdkError::InvalidSigner(format!(
            "multisig {} is not a signer of this transaction",
            signer.address
        )));
    }
    let bytes = factory
        .sign_bytes_in(SignMode::LegacyAminoJson, &signer, builder)
        .await?;
    let (signature, pubkey) = keyring.sign(key_name, &bytes)?;
    Ok(SignatureV2 {
        pubkey,
        data: SignatureData::Single {
            mode: SignMode::LegacyAminoJson,
            signature,
        },
        sequence: factory.sequence(),
    })
}

/// Replace the signatures of `builder` with one multisig signature built from
/// `member_sigs`. Each member signature must be a valid LEGACY_AMINO_JSON
/// signature for the multisig account's number and sequence.
pub async fn multisign(
    factory: &Factory,
    multisig: &LegacyAminoMultisig,
    builder: &mut TxBuilder,
    member_sigs: &[SignatureV2],
) -> Result<(), SdkError> {
    let signer = multisig_signer(factory, multisig);
    let (address, pubkey) = (signer.address.clone(), signer.pubkey.clone());
    if !builder.signers().contains(&address) {
        return Err(SdkError::InvalidSigner(format!(
            "multisig {address} is not a signer of this transaction"
        )));
    }
    let bytes = factory
        .sign_bytes_in(SignMode::LegacyAminoJson, &signer, builder)
        .await?;

    let mut combined = MultisigBuilder::new(multisig.clone());
    for sig in member_sigs {
        let SignatureData::Single { mode, signature } = &sig.data else {
            return Err(SdkError::InvalidSignature("nested multisig signatures are not supported".into()));
        };
        if *mode != SignMode::LegacyAminoJson {
            return Err(SdkError::InvalidSignMode(format!(
                "multisig members must sign with SIGN_MODE_LEGACY_AMINO_JSON, got {}",
                mode.as_proto_name()
            )));
        }
        if !sig.pubkey.verify(&bytes, signature) {
            return Err(SdkError::InvalidSignature(format!(
                "couldn't verify signature for address {}",
                sig.address()
            )));
        }
        combined.add_signature(&sig.pubkey, signature.clone())?;
    }

    if combined.signer_count() < multisig.threshold as usize {
        return Err(SdkError::InvalidSignature(format!(
            "{} of {} required signatures",
            combined.signer_count(),
            multisig.threshold
        )));
    }
    let signers = combined.signer_count();
    let (bitarray, multi) = combined.finish();
    let data = SignatureData::Multi {
        bitarray,
        signatures: multi
            .signatures
            .into_iter()
            .map(|signature| SignatureData::Single {
                mode: SignMode::LegacyAminoJson,
                signature,
            })
            .collect(),
    };
    builder.set_signatures(vec![SignatureV2 {
        pubkey,
        data,
        sequence: factory.sequence(),
    }]);
    info!(multisig = %address, signers, "combined multisig signatures");
    Ok(())
}
