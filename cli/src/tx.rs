//! `tx` subcommands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context as _};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use cosmtx_crypto::{LegacyAminoMultisig, PublicKey};
use cosmtx_feegrant::{
    Allowance, AllowedMsgAllowance, BasicAllowance, MsgGrantAllowance, MsgRevokeAllowance,
    PeriodicAllowance,
};
use cosmtx_keyring::Keyring;
use cosmtx_tx::{sign, sign_as_member, Broadcaster, Factory, SignatureV2, TxBuilder};
use cosmtx_types::{format_duration, parse_duration, AccAddress, Coins, MsgRef, MsgSend, Timestamp};

use crate::cmd::{BankCommand, FeegrantCommand, TxCommand, TxFlags};
use crate::context::ClientContext;

pub async fn run(ctx: &ClientContext, cmd: TxCommand) -> anyhow::Result<Value> {
    match cmd {
        TxCommand::Bank(BankCommand::Send { sender, to, amount, flags }) => {
            let (from_address, from_name) = ctx.resolve_account(&sender)?;
            let msg = MsgSend {
                from_address: from_address.clone(),
                to_address: ctx.resolve_account(&to)?.0,
                amount: Coins::parse(&amount)?,
            };
            generate_or_broadcast(ctx, &flags, &from_address, from_name, vec![Arc::new(msg)]).await
        }
        TxCommand::Feegrant(FeegrantCommand::Grant {
            granter,
            grantee,
            spend_limit,
            expiration,
            period,
            period_limit,
            allowed_messages,
            flags,
        }) => {
            let (granter, granter_name) = ctx.resolve_account(&granter)?;
            let allowance = build_allowance(
                spend_limit.as_deref(),
                expiration.as_deref(),
                period.as_deref(),
                period_limit.as_deref(),
                allowed_messages,
            )?;
            let msg = MsgGrantAllowance {
                granter: granter.clone(),
                grantee: ctx.resolve_account(&grantee)?.0,
                allowance,
            };
            generate_or_broadcast(ctx, &flags, &granter, granter_name, vec![Arc::new(msg)]).await
        }
        TxCommand::Feegrant(FeegrantCommand::Revoke { granter, grantee, flags }) => {
            let (granter, granter_name) = ctx.resolve_account(&granter)?;
            let msg = MsgRevokeAllowance {
                granter: granter.clone(),
                grantee: ctx.resolve_account(&grantee)?.0,
            };
            generate_or_broadcast(ctx, &flags, &granter, granter_name, vec![Arc::new(msg)]).await
        }
        TxCommand::Sign { file, signature_only, overwrite, multisig, flags } => {
            let mut tx = read_tx_file(ctx, &file)?;
            let from = flags.from.as_deref().ok_or_else(|| anyhow!("--from is required"))?;
            let (address, name) = ctx.resolve_account(from)?;
            let name = name.ok_or_else(|| anyhow!("{from} is not a key in the keyring"))?;
            let factory = ctx.factory(&flags)?.with_from_name(name.as_str());

            if let Some(multisig) = multisig {
                let (multisig_address, key) = multisig_key(ctx, &multisig)?;
                let factory = factory.prepare(&multisig_address).await?;
                let sig = sign_as_member(&factory, &name, &key, &tx).await?;
                return Ok(json!({ "signatures": [sig.to_json()] }));
            }

            let factory = factory.prepare(&address).await?;
            sign(&factory, &name, &mut tx, overwrite).await?;
            if signature_only {
                let sigs: Vec<Value> = tx
                    .signatures()
                    .iter()
                    .filter(|s| s.address() == address)
                    .map(SignatureV2::to_json)
                    .collect();
                return Ok(json!({ "signatures": sigs }));
            }
            Ok(tx.to_json())
        }
        TxCommand::Multisign { file, name, signatures, flags } => {
            let mut tx = read_tx_file(ctx, &file)?;
            let (address, key) = multisig_key(ctx, &name)?;
            let mut member_sigs = Vec::new();
            for path in &signatures {
                member_sigs.extend(read_signature_file(path)?);
            }
            let factory = ctx.factory(&flags)?.prepare(&address).await?;
            cosmtx_tx::multisign(&factory, &key, &mut tx, &member_sigs).await?;
            Ok(tx.to_json())
        }
        TxCommand::Broadcast { file, flags } => {
            let tx = read_tx_file(ctx, &file)?;
            if tx.signatures().is_empty() {
                bail!("{} holds an unsigned transaction", file.display());
            }
            broadcast(ctx, &flags, &tx.encode()).await
        }
        TxCommand::Encode { file } => {
            let tx = read_tx_file(ctx, &file)?;
            Ok(json!({ "tx": tx.to_base64() }))
        }
        TxCommand::Decode { tx } => Ok(TxBuilder::from_base64(tx.trim(), &ctx.registry)?.to_json()),
        TxCommand::Simulate { file, flags } => {
            let tx = read_tx_file(ctx, &file)?;
            let signer = tx
                .fee_payer()
                .ok_or_else(|| anyhow!("transaction has no signers"))?;
            let mut factory = ctx.factory(&flags)?;
            if let Ok(info) = ctx.keyring.key_by_address(&signer) {
                factory = factory.with_from_name(info.name);
            }
            let factory = with_tx_settings(factory.prepare(&signer).await?, &tx)
                .with_simulate_and_execute(true);
            let (estimated, adjusted) = factory.calculate_gas(tx.msgs().to_vec()).await?;
            Ok(json!({
                "gas_estimate": estimated,
                "gas_adjusted": adjusted,
            }))
        }
    }
}

/// Print the unsigned transaction for `--generate-only`, or sign it with
/// `from` and broadcast.
async fn generate_or_broadcast(
    ctx: &ClientContext,
    flags: &TxFlags,
    from: &AccAddress,
    from_name: Option<String>,
    msgs: Vec<MsgRef>,
) -> anyhow::Result<Value> {
    let mut factory = ctx.factory(flags)?;
    if let Some(name) = &from_name {
        factory = factory.with_from_name(name.as_str());
    }

    if factory.generate_only() {
        if factory.simulate_and_execute() && !factory.offline() {
            let prepared = factory.prepare(from).await?;
            let (estimated, adjusted) = prepared.calculate_gas(msgs.clone()).await?;
            info!(estimated, adjusted, "estimated gas");
            factory.set_gas(adjusted);
        }
        return Ok(factory.build_unsigned(msgs)?.to_json());
    }

    let name = from_name.ok_or_else(|| anyhow!("{from} is not a key in the keyring"))?;
    let mut factory = factory.prepare(from).await?;
    if factory.simulate_and_execute() {
        factory = factory.with_simulated_gas(msgs.clone()).await?;
    }
    let mut tx = factory.build_unsigned(msgs)?;
    sign(&factory, &name, &mut tx, true).await?;
    broadcast(ctx, flags, &tx.encode()).await
}

/// Broadcast and render the response. A non-zero code is still a response,
/// not an error. Ctrl-C stops the wait in block mode.
async fn broadcast(ctx: &ClientContext, flags: &TxFlags, tx_bytes: &[u8]) -> anyhow::Result<Value> {
    if flags.offline {
        bail!("cannot broadcast in offline mode");
    }
    let mode = ClientContext::broadcast_mode(flags)?;
    let cancel = CancellationToken::new();
    let on_interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };
    let res = Broadcaster::new(ctx.client.clone())
        .broadcast(tx_bytes, mode, &cancel)
        .await;
    on_interrupt.abort();

    let res = res?;
    if !res.is_ok() {
        warn!(hash = %res.txhash, code = res.code, log = %res.raw_log, "transaction failed");
    }
    Ok(serde_json::to_value(res)?)
}

fn build_allowance(
    spend_limit: Option<&str>,
    expiration: Option<&str>,
    period: Option<&str>,
    period_limit: Option<&str>,
    allowed_messages: Vec<String>,
) -> anyhow::Result<Allowance> {
    let basic = BasicAllowance {
        spend_limit: spend_limit.map(Coins::parse).transpose()?.unwrap_or_else(Coins::empty),
        expiration: expiration
            .map(|text| {
                Timestamp::parse_rfc3339(text)
                    .ok_or_else(|| anyhow!("--expiration {text:?} is not an RFC 3339 time"))
            })
            .transpose()?,
    };

    let mut allowance = match (period, period_limit) {
        (Some(period), Some(limit)) => {
            let secs = parse_duration(period).with_context(|| format!("--period {period:?}"))?;
            let limit = Coins::parse(limit)?;
            info!(period = %format_duration(secs), limit = %limit, "periodic allowance");
            Allowance::Periodic(PeriodicAllowance {
                basic,
                period: secs,
                period_spend_limit: limit.clone(),
                period_can_spend: limit,
                period_reset: Timestamp::EPOCH,
            })
        }
        (None, None) => Allowance::Basic(basic),
        _ => bail!("--period and --period-limit go together"),
    };

    if !allowed_messages.is_empty() {
        allowance = Allowance::Allowed(AllowedMsgAllowance {
            allowance: Box::new(allowance),
            allowed_messages,
        });
    }
    allowance.validate_basic()?;
    Ok(allowance)
}

fn multisig_key(ctx: &ClientContext, name_or_address: &str) -> anyhow::Result<(AccAddress, LegacyAminoMultisig)> {
    let (address, name) = ctx.resolve_account(name_or_address)?;
    let name = name.ok_or_else(|| anyhow!("{name_or_address} is not a key in the keyring"))?;
    match ctx.keyring.key(&name)?.pubkey {
        PublicKey::Multisig(key) => Ok((address, key)),
        _ => bail!("{name} is not a multisig key"),
    }
}

/// Carry fee and memo settings of an existing transaction into `factory`
/// so a simulation sees the same body.
fn with_tx_settings(factory: Factory, tx: &TxBuilder) -> Factory {
    factory
        .with_memo(tx.memo())
        .with_timeout_height(tx.timeout_height())
        .with_fees(tx.fee().amount.clone())
        .with_fee_granter(tx.fee().granter.clone())
        .with_fee_payer(tx.fee().payer.clone())
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn read_tx_file(ctx: &ClientContext, path: &Path) -> anyhow::Result<TxBuilder> {
    Ok(TxBuilder::from_json(&read_json(path)?, &ctx.registry)?)
}

/// A file written by `tx sign --signature-only` or `tx sign --multisig`.
fn read_signature_file(path: &Path) -> anyhow::Result<Vec<SignatureV2>> {
    let value = read_json(path)?;
    let sigs = value
        .get("signatures")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("{} has no signatures array", path.display()))?;
    sigs.iter()
        .map(|sig| SignatureV2::from_json(sig).with_context(|| format!("in {}", path.display())))
        .collect()
}
