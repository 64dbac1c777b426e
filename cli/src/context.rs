//! Everything a command needs: config, keyring, node client, message registry.

use std::sync::Arc;

use anyhow::{bail, Context as _};
use tracing::debug;

use cosmtx_keyring::{Backend, Keyring, LocalKeyring};
use cosmtx_rpc::{ClientPool, CometClient};
use cosmtx_tx::{Factory, GasSetting};
use cosmtx_types::{AccAddress, BroadcastMode, Coins, DecCoins, MsgRegistry, SignMode};

use crate::cmd::TxFlags;
use crate::config::ClientConfig;

pub struct ClientContext {
    pub config: ClientConfig,
    pub keyring: Arc<LocalKeyring>,
    pub client: Arc<dyn CometClient>,
    pub registry: MsgRegistry,
}

impl ClientContext {
    /// Open the configured keyring and node pool.
    pub fn open(config: ClientConfig, keyring_password: Option<&str>) -> anyhow::Result<Self> {
        let backend: Backend = config
            .keyring_backend
            .parse()
            .with_context(|| format!("keyring backend {:?}", config.keyring_backend))?;
        let keyring = cosmtx_keyring::open(backend, &config.home_dir, keyring_password)?;
        let client = ClientPool::from_endpoints(&config.node_uri)
            .with_context(|| format!("node {:?}", config.node_uri))?;
        debug!(
            backend = %backend,
            home = %config.home_dir.display(),
            node = %config.node_uri,
            "client context ready"
        );
        Ok(Self::with_parts(config, Arc::new(keyring), Arc::new(client)))
    }

    pub fn with_parts(
        config: ClientConfig,
        keyring: Arc<LocalKeyring>,
        client: Arc<dyn CometClient>,
    ) -> Self {
        let mut registry = MsgRegistry::with_defaults();
        cosmtx_feegrant::register(&mut registry);
        Self {
            config,
            keyring,
            client,
            registry,
        }
    }

    pub fn keyring(&self) -> Arc<dyn Keyring> {
        self.keyring.clone()
    }

    /// A key name from the keyring, or else a bech32 address.
    /// Returns the address and the key name when there is one.
    pub fn resolve_account(&self, name_or_address: &str) -> anyhow::Result<(AccAddress, Option<String>)> {
        if let Ok(info) = self.keyring.key(name_or_address) {
            return Ok((info.address(), Some(info.name)));
        }
        let address = AccAddress::from_account_bech32(name_or_address)
            .with_context(|| format!("{name_or_address:?} is neither a key name nor an address"))?;
        let name = self.keyring.key_by_address(&address).ok().map(|info| info.name);
        Ok((address, name))
    }

    /// Build a factory from the transaction flags.
    pub fn factory(&self, flags: &TxFlags) -> anyhow::Result<Factory> {
        let gas: GasSetting = flags.gas.parse()?;
        let sign_mode: SignMode = flags.sign_mode.parse()?;

        let fee_granter = match &flags.fee_granter {
            Some(granter) => {
                if !self.config.fee_granter_enabled {
                    bail!("--fee-granter is disabled by fee_granter_enabled = false");
                }
                Some(self.resolve_account(granter)?.0)
            }
            None => None,
        };
        let fee_payer = flags
            .fee_payer
            .as_deref()
            .map(|payer| self.resolve_account(payer).map(|(address, _)| address))
            .transpose()?;

        let mut factory = Factory::new(self.config.chain_id.clone())
            .with_keyring(self.keyring())
            .with_gas_setting(gas)
            .with_gas_adjustment(flags.gas_adjustment)
            .with_memo(flags.memo.clone())
            .with_timeout_height(flags.timeout_height)
            .with_sign_mode(sign_mode)
            .with_fee_granter(fee_granter)
            .with_fee_payer(fee_payer)
            .with_offline(flags.offline)
            .with_generate_only(flags.generate_only);
        if let Some(fees) = &flags.fees {
            factory = factory.with_fees(Coins::parse(fees)?);
        }
        if let Some(prices) = &flags.gas_prices {
            factory = factory.with_gas_prices(DecCoins::parse(prices)?);
        }
        if let Some(n) = flags.account_number {
            factory = factory.with_account_number(n);
        }
        if let Some(seq) = flags.sequence {
            factory = factory.with_sequence(seq);
        }
        if !flags.offline {
            factory = factory.with_client(self.client.clone());
        }
        Ok(factory)
    }

    pub fn broadcast_mode(flags: &TxFlags) -> anyhow::Result<BroadcastMode> {
        Ok(flags.broadcast_mode.parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmtx_crypto::KeyAlgo;
    use cosmtx_nullables::NullNode;

    fn context() -> ClientContext {
        let config = ClientConfig {
            chain_id: "test-1".into(),
            ..ClientConfig::default()
        };
        ClientContext::with_parts(
            config,
            Arc::new(LocalKeyring::in_memory()),
            Arc::new(NullNode::new("test-1")),
        )
    }

    #[test]
    fn resolves_names_and_addresses() {
        let ctx = context();
        let alice = ctx.keyring.generate("alice", KeyAlgo::Secp256k1).unwrap();
        let (addr, name) = ctx.resolve_account("alice").unwrap();
        assert_eq!((addr.clone(), name.as_deref()), (alice.address(), Some("alice")));

        let (by_addr, name) = ctx.resolve_account(&addr.to_string()).unwrap();
        assert_eq!((by_addr, name.as_deref()), (addr, Some("alice")));

        assert!(ctx.resolve_account("nobody").is_err());
    }

    #[test]
    fn factory_from_flags() {
        let ctx = context();
        let flags = TxFlags {
            gas: "auto".into(),
            gas_adjustment: 1.3,
            gas_prices: Some("0.025uatom".into()),
            memo: "hi".into(),
            sign_mode: "amino-json".into(),
            account_number: Some(7),
            ..TxFlags::default()
        };
        let f = ctx.factory(&flags).unwrap();
        assert_eq!(f.chain_id(), "test-1");
        assert!(f.simulate_and_execute());
        assert_eq!(f.gas_adjustment(), 1.3);
        assert_eq!(f.memo(), "hi");
        assert_eq!(f.sign_mode(), SignMode::LegacyAminoJson);
        assert_eq!(f.account_number(), 7);
    }

    #[test]
    fn fee_granter_can_be_disabled() {
        let mut ctx = context();
        ctx.config.fee_granter_enabled = false;
        let granter = AccAddress::from([3; 20]).to_string();
        let flags = TxFlags {
            fee_granter: Some(granter),
            ..TxFlags::default()
        };
        assert!(ctx.factory(&flags).is_err());
    }

    #[test]
    fn bad_flags_rejected() {
        let ctx = context();
        let bad_mode = TxFlags { sign_mode: "fancy".into(), ..TxFlags::default() };
        assert!(ctx.factory(&bad_mode).is_err());
        let bad_gas = TxFlags { gas: "lots".into(), ..TxFlags::default() };
        assert!(ctx.factory(&bad_gas).is_err());
        let bad_mode = TxFlags { broadcast_mode: "later".into(), ..TxFlags::default() };
        assert!(ClientContext::broadcast_mode(&bad_mode).is_err());
    }
}
