//! `keys` subcommands.

use std::io::BufRead;

use anyhow::{anyhow, bail, Context as _};
use serde_json::{json, Value};

use cosmtx_crypto::{generate_mnemonic, is_valid_mnemonic, HdPath, KeyAlgo, LegacyAminoMultisig};
use cosmtx_keyring::Keyring;

use crate::cmd::KeysCommand;
use crate::context::ClientContext;

/// What `keys add` should create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewKey {
    /// Fresh key; secp256k1 keys come with a mnemonic.
    Generate { algo: KeyAlgo, hd_path: HdPath },
    Recover { mnemonic: String, hd_path: HdPath },
    Multisig { members: Vec<String>, threshold: u32 },
}

pub fn run(ctx: &ClientContext, cmd: KeysCommand) -> anyhow::Result<Value> {
    match cmd {
        KeysCommand::Add { name, recover, algo, hd_path, multisig, multisig_threshold } => {
            let hd_path = HdPath::parse(&hd_path)?;
            let new_key = if !multisig.is_empty() {
                NewKey::Multisig {
                    threshold: multisig_threshold.unwrap_or(1),
                    members: multisig,
                }
            } else if recover {
                NewKey::Recover { mnemonic: read_mnemonic()?, hd_path }
            } else {
                NewKey::Generate { algo: algo.parse()?, hd_path }
            };
            add(ctx, &name, new_key)
        }
        KeysCommand::Show { name } => {
            let info = match ctx.keyring.key(&name) {
                Ok(info) => info,
                Err(_) => {
                    let (address, _) = ctx.resolve_account(&name)?;
                    ctx.keyring.key_by_address(&address)?
                }
            };
            Ok(info.to_json())
        }
        KeysCommand::List => {
            let mut keys = ctx.keyring.list()?;
            keys.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(Value::Array(keys.iter().map(|k| k.to_json()).collect()))
        }
    }
}

/// Store a new key under `name`. Generated secp256k1 keys return their
/// mnemonic once in the output; it is not kept anywhere else.
pub fn add(ctx: &ClientContext, name: &str, new_key: NewKey) -> anyhow::Result<Value> {
    match new_key {
        NewKey::Generate { algo: KeyAlgo::Secp256k1, hd_path } => {
            let mnemonic = generate_mnemonic()?;
            let info = ctx.keyring.new_account(name, &mnemonic, "", &hd_path)?;
            let mut out = info.to_json();
            out["mnemonic"] = Value::String(mnemonic);
            Ok(out)
        }
        NewKey::Generate { algo, .. } => Ok(ctx.keyring.generate(name, algo)?.to_json()),
        NewKey::Recover { mnemonic, hd_path } => {
            if !is_valid_mnemonic(&mnemonic) {
                bail!("invalid mnemonic");
            }
            Ok(ctx.keyring.new_account(name, &mnemonic, "", &hd_path)?.to_json())
        }
        NewKey::Multisig { members, threshold } => {
            let pubkeys = members
                .iter()
                .map(|member| {
                    ctx.keyring
                        .key(member)
                        .map(|info| info.pubkey)
                        .with_context(|| format!("multisig member {member}"))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            let key = LegacyAminoMultisig::new(threshold, pubkeys)?;
            let info = ctx.keyring.save_multisig(name, key)?;
            Ok(json!({
                "name": info.name,
                "type": info.kind,
                "address": info.address().to_string(),
                "threshold": threshold,
                "members": members,
            }))
        }
    }
}

fn read_mnemonic() -> anyhow::Result<String> {
    eprintln!("> Enter your bip39 mnemonic");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading mnemonic from stdin")?;
    let mnemonic = line.trim().to_string();
    if mnemonic.is_empty() {
        return Err(anyhow!("no mnemonic given on stdin"));
    }
    Ok(mnemonic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use cosmtx_keyring::LocalKeyring;
    use cosmtx_nullables::NullNode;

    use crate::config::ClientConfig;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon \
                           abandon abandon abandon abandon abandon about";

    fn context() -> ClientContext {
        ClientContext::with_parts(
            ClientConfig::default(),
            Arc::new(LocalKeyring::in_memory()),
            Arc::new(NullNode::new("test-1")),
        )
    }

    #[test]
    fn generated_key_prints_mnemonic_once() {
        let ctx = context();
        let out = add(
            &ctx,
            "alice",
            NewKey::Generate { algo: KeyAlgo::Secp256k1, hd_path: HdPath::default() },
        )
        .unwrap();
        let mnemonic = out["mnemonic"].as_str().unwrap();
        assert!(is_valid_mnemonic(mnemonic));

        let shown = run(&ctx, KeysCommand::Show { name: "alice".into() }).unwrap();
        assert_eq!(shown["address"], out["address"]);
        assert!(shown.get("mnemonic").is_none());
    }

    #[test]
    fn recover_is_deterministic() {
        let ctx = context();
        let out = add(
            &ctx,
            "bob",
            NewKey::Recover { mnemonic: ABANDON.into(), hd_path: HdPath::default() },
        )
        .unwrap();
        assert_eq!(out["address"], "cosmos19rl4cm2hmr8afy4kldpxz3fka4jguq0auqdal4");

        assert!(add(
            &ctx,
            "carol",
            NewKey::Recover { mnemonic: "not a mnemonic".into(), hd_path: HdPath::default() },
        )
        .is_err());
    }

    #[test]
    fn multisig_from_members() {
        let ctx = context();
        for name in ["a", "b", "c"] {
            add(&ctx, name, NewKey::Generate { algo: KeyAlgo::Ed25519, hd_path: HdPath::default() })
                .unwrap();
        }
        let members = vec!["a".to_string(), "b".into(), "c".into()];
        let out = add(&ctx, "ms", NewKey::Multisig { members: members.clone(), threshold: 2 }).unwrap();
        assert_eq!(out["threshold"], 2);
        assert_eq!(out["type"], "multi");

        let listed = run(&ctx, KeysCommand::List).unwrap();
        let names: Vec<&str> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|k| k["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b", "c", "ms"]);

        assert!(add(&ctx, "bad", NewKey::Multisig { members: vec!["a".into(), "zz".into()], threshold: 1 }).is_err());
        assert!(add(&ctx, "too-high", NewKey::Multisig { members, threshold: 4 }).is_err());
    }

    #[test]
    fn show_by_address() {
        let ctx = context();
        let out = add(&ctx, "d", NewKey::Generate { algo: KeyAlgo::Ed25519, hd_path: HdPath::default() })
            .unwrap();
        let address = out["address"].as_str().unwrap().to_string();
        let shown = run(&ctx, KeysCommand::Show { name: address }).unwrap();
        assert_eq!(shown["name"], "d");
    }
}
