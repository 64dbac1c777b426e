//! Signing a built transaction with a keyring key.

use tracing::debug;

use cosmtx_types::{AccAddress, SdkError, SignMode};

use crate::builder::TxBuilder;
use crate::factory::Factory;
use crate::signing::{SignatureData, SignatureV2, SignerData};

/// Sign `builder` with the keyring key `key_name` in the factory's mode.
///
/// With `overwrite` every existing signature is dropped. Otherwise the new
/// signature joins the existing ones, which must all use the same mode, and
/// DIRECT allows only one signer.
pub async fn sign(
    factory: &Factory,
    key_name: &str,
    builder: &mut TxBuilder,
    overwrite: bool,
) -> Result<(), SdkError> {
    sign_with_exemptions(factory, key_name, builder, overwrite, &[]).await
}

/// Like [`sign`], but signatures by `exempt` addresses are left out of the
/// mode checks. Aux signers are exempt when the fee payer signs last.
pub(crate) async fn sign_with_exemptions(
    factory: &Factory,
    key_name: &str,
    builder: &mut TxBuilder,
    overwrite: bool,
    exempt: &[AccAddress],
) -> Result<(), SdkError> {
    let keyring = factory.keyring()?;
    let pubkey = keyring.key(key_name)?.pubkey;
    let address = pubkey.address();

    let signers = builder.signers();
    if !signers.contains(&address) {
        return Err(SdkError::InvalidSigner(format!(
            "{address} is not a signer of this transaction"
        )));
    }

    let mode = factory.resolved_sign_mode();
    let others: Vec<SignatureV2> = if overwrite {
        Vec::new()
    } else {
        builder
            .signatures()
            .iter()
            .filter(|s| s.address() != address)
            .cloned()
            .collect()
    };
    check_compatible(
        mode,
        others.iter().filter(|s| !exempt.contains(&s.address())),
    )?;

    // The slot goes in before computing sign bytes so DIRECT commits to the
    // final signer infos.
    let placeholder = SignatureV2 {
        pubkey: pubkey.clone(),
        data: SignatureData::Single { mode, signature: Vec::new() },
        sequence: factory.sequence(),
    };
    let mut slots = others;
    slots.push(placeholder);
    slots.sort_by_key(|s| {
        let addr = s.address();
        signers.iter().position(|a| *a == addr).unwrap_or(usize::MAX)
    });
    builder.set_signatures(slots.clone());

    let signer_data = SignerData {
        address: address.clone(),
        chain_id: factory.chain_id().to_string(),
        account_number: factory.account_number(),
        sequence: factory.sequence(),
        pubkey,
    };
    let bytes = factory.sign_bytes_in(mode, &signer_data, builder).await?;
    let (signature, _) = keyring.sign(key_name, &bytes)?;

    for slot in slots.iter_mut().filter(|s| s.address() == address) {
        slot.data = SignatureData::Single {
            mode,
            signature: signature.clone(),
        };
    }
    builder.set_signatures(slots);
    debug!(
        signer = %address,
        mode = mode.as_proto_name(),
        sequence = factory.sequence(),
        signatures = builder.signatures().len(),
        "signed transaction"
    );
    Ok(())
}

fn check_compatible<'a>(
    mode: SignMode,
    existing: impl Iterator<Item = &'a SignatureV2>,
) -> Result<(), SdkError> {
    for sig in existing {
        for existing_mode in sig.data.modes() {
            if existing_mode == SignMode::DirectAux {
                continue;
            }
            if mode == SignMode::Direct && existing_mode == SignMode::Direct {
                return Err(SdkError::DirectSignMultipleSigners);
            }
            if existing_mode != mode {
                return Err(SdkError::InvalidSignMode(format!(
                    "cannot add a {} signature to a transaction signed with {}",
                    mode.as_proto_name(),
                    existing_mode.as_proto_name()
                )));
            }
        }
    }
    Ok(())
}
