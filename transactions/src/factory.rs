//! Transaction assembly.
//!
//! A [`Factory`] carries every parameter that shapes a transaction but is not
//! a message: chain, account, gas, fees, memo, sign mode and the capabilities
//! (keyring, node, account lookup) needed to fill in the rest. It behaves as a
//! value: every `with_*` call returns a modified copy.

use std::fmt;
use std::sync::Arc;

use prost::Message;
use tracing::{debug, error, warn};

use cosmtx_crypto::{is_valid_mnemonic, PublicKey};
use cosmtx_keyring::Keyring;
use cosmtx_rpc::{CometClient, RpcError, SIMULATE_PATH};
use cosmtx_types::proto::{SimulateRequest, SimulateResponse};
use cosmtx_types::{
    AccAddress, Any, Coin, Coins, DecCoins, MsgRef, SdkError, SignMode, MAX_MEMO_CHARS,
};

use crate::account::{AccountRetriever, NodeAccountRetriever};
use crate::builder::TxBuilder;
use crate::gas::{adjust_gas, GasSetting, DEFAULT_GAS_ADJUSTMENT, DEFAULT_GAS_LIMIT};
use crate::sign_mode;
use crate::signing::{SignatureData, SignatureV2, SignerData};
use crate::textual::{CoinMetadataQuerier, NodeMetadataQuerier};

#[derive(Clone)]
pub struct Factory {
    chain_id: String,
    account_number: u64,
    sequence: u64,
    gas: u64,
    gas_adjustment: f64,
    simulate_and_execute: bool,
    fees: Coins,
    gas_prices: DecCoins,
    memo: String,
    timeout_height: u64,
    fee_granter: Option<AccAddress>,
    fee_payer: Option<AccAddress>,
    sign_mode: SignMode,
    offline: bool,
    generate_only: bool,
    from_name: String,
    extension_options: Vec<Any>,
    non_critical_extension_options: Vec<Any>,
    keyring: Option<Arc<dyn Keyring>>,
    account_retriever: Option<Arc<dyn AccountRetriever>>,
    client: Option<Arc<dyn CometClient>>,
    metadata: Option<Arc<dyn CoinMetadataQuerier>>,
}

impl Default for Factory {
    fn default() -> Self {
        Self {
            chain_id: String::new(),
            account_number: 0,
            sequence: 0,
            gas: DEFAULT_GAS_LIMIT,
            gas_adjustment: DEFAULT_GAS_ADJUSTMENT,
            simulate_and_execute: false,
            fees: Coins::empty(),
            gas_prices: DecCoins::default(),
            memo: String::new(),
            timeout_height: 0,
            fee_granter: None,
            fee_payer: None,
            sign_mode: SignMode::Unspecified,
            offline: false,
            generate_only: false,
            from_name: String::new(),
            extension_options: Vec::new(),
            non_critical_extension_options: Vec::new(),
            keyring: None,
            account_retriever: None,
            client: None,
            metadata: None,
        }
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("chain_id", &self.chain_id)
            .field("account_number", &self.account_number)
            .field("sequence", &self.sequence)
            .field("gas", &self.gas)
            .field("gas_adjustment", &self.gas_adjustment)
            .field("simulate_and_execute", &self.simulate_and_execute)
            .field("fees", &self.fees)
            .field("gas_prices", &self.gas_prices)
            .field("memo", &self.memo)
            .field("timeout_height", &self.timeout_height)
            .field("fee_granter", &self.fee_granter)
            .field("fee_payer", &self.fee_payer)
            .field("sign_mode", &self.sign_mode)
            .field("offline", &self.offline)
            .field("generate_only", &self.generate_only)
            .field("from_name", &self.from_name)
            .finish_non_exhaustive()
    }
}

impl Factory {
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            ..Self::default()
        }
    }

    // ── builders ────────────────────────────────────────────────────────

    pub fn with_chain_id(mut self, chain_id: impl Into<String>) -> Self {
        self.chain_id = chain_id.into();
        self
    }

    pub fn with_account_number(mut self, n: u64) -> Self {
        self.account_number = n;
        self
    }

    pub fn with_sequence(mut self, seq: u64) -> Self {
        self.sequence = seq;
        self
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = gas;
        self
    }

    /// Apply a `--gas` flag value: `auto` turns on simulation.
    pub fn with_gas_setting(mut self, setting: GasSetting) -> Self {
        self.simulate_and_execute = setting.simulate();
        self.gas = setting.limit();
        self
    }

    pub fn with_gas_adjustment(mut self, adjustment: f64) -> Self {
        self.gas_adjustment = adjustment;
        self
    }

    pub fn with_simulate_and_execute(mut self, simulate: bool) -> Self {
        self.simulate_and_execute = simulate;
        self
    }

    pub fn with_fees(mut self, fees: Coins) -> Self {
        self.fees = fees;
        self
    }

    pub fn with_gas_prices(mut self, prices: DecCoins) -> Self {
        self.gas_prices = prices;
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn with_timeout_height(mut self, height: u64) -> Self {
        self.timeout_height = height;
        self
    }

    pub fn with_fee_granter(mut self, granter: Option<AccAddress>) -> Self {
        self.fee_granter = granter;
        self
    }

    pub fn with_fee_payer(mut self, payer: Option<AccAddress>) -> Self {
        self.fee_payer = payer;
        self
    }

    pub fn with_sign_mode(mut self, mode: SignMode) -> Self {
        self.sign_mode = mode;
        self
    }

    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn with_generate_only(mut self, generate_only: bool) -> Self {
        self.generate_only = generate_only;
        self
    }

    /// Keyring name of the signing key, used for simulation public keys.
    pub fn with_from_name(mut self, name: impl Into<String>) -> Self {
        self.from_name = name.into();
        self
    }

    pub fn with_extension_options(mut self, options: Vec<Any>) -> Self {
        self.extension_options = options;
        self
    }

    pub fn with_non_critical_extension_options(mut self, options: Vec<Any>) -> Self {
        self.non_critical_extension_options = options;
        self
    }

    pub fn with_keyring(mut self, keyring: Arc<dyn Keyring>) -> Self {
        self.keyring = Some(keyring);
        self
    }

    pub fn with_account_retriever(mut self, retriever: Arc<dyn AccountRetriever>) -> Self {
        self.account_retriever = Some(retriever);
        self
    }

    pub fn with_metadata_querier(mut self, querier: Arc<dyn CoinMetadataQuerier>) -> Self {
        self.metadata = Some(querier);
        self
    }

    /// Attach a node. Account lookup and denom metadata default to querying
    /// it unless set explicitly.
    pub fn with_client(mut self, client: Arc<dyn CometClient>) -> Self {
        if self.account_retriever.is_none() {
            self.account_retriever = Some(Arc::new(NodeAccountRetriever::new(client.clone())));
        }
        if self.metadata.is_none() {
            self.metadata = Some(Arc::new(NodeMetadataQuerier::new(client.clone())));
        }
        self.client = Some(client);
        self
    }

    pub fn set_gas(&mut self, gas: u64) {
        self.gas = gas;
    }

    pub fn set_sequence(&mut self, seq: u64) {
        self.sequence = seq;
    }

    pub fn set_account_number(&mut self, n: u64) {
        self.account_number = n;
    }

    // ── accessors ───────────────────────────────────────────────────────

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn account_number(&self) -> u64 {
        self.account_number
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn gas(&self) -> u64 {
        self.gas
    }

    pub fn gas_adjustment(&self) -> f64 {
        self.gas_adjustment
    }

    pub fn simulate_and_execute(&self) -> bool {
        self.simulate_and_execute
    }

    pub fn fees(&self) -> &Coins {
        &self.fees
    }

    pub fn memo(&self) -> &str {
        &self.memo
    }

    pub fn fee_granter(&self) -> Option<&AccAddress> {
        self.fee_granter.as_ref()
    }

    pub fn fee_payer(&self) -> Option<&AccAddress> {
        self.fee_payer.as_ref()
    }

    pub fn sign_mode(&self) -> SignMode {
        self.sign_mode
    }

    /// The mode signatures are produced in. Unspecified means DIRECT.
    pub fn resolved_sign_mode(&self) -> SignMode {
        match self.sign_mode {
            SignMode::Unspecified => SignMode::Direct,
            mode => mode,
        }
    }

    pub fn offline(&self) -> bool {
        self.offline
    }

    pub fn generate_only(&self) -> bool {
        self.generate_only
    }

    pub fn from_name(&self) -> &str {
        &self.from_name
    }

    pub fn keyring(&self) -> Result<&Arc<dyn Keyring>, SdkError> {
        self.keyring
            .as_ref()
            .ok_or_else(|| SdkError::Keyring("no keyring configured".into()))
    }

    pub fn client(&self) -> Result<&Arc<dyn CometClient>, SdkError> {
        self.client.as_ref().ok_or(SdkError::MissingEndpoints)
    }

    fn account_retriever(&self) -> Result<&Arc<dyn AccountRetriever>, SdkError> {
        self.account_retriever
            .as_ref()
            .ok_or_else(|| SdkError::Logic("no account retriever configured".into()))
    }

    // ── operations ──────────────────────────────────────────────────────

    /// Fill in the account number and sequence of `from` from the chain.
    /// Values the caller already set are kept; offline factories are
    /// returned unchanged.
    pub async fn prepare(&self, from: &AccAddress) -> Result<Self, SdkError> {
        if self.offline {
            return Ok(self.clone());
        }
        let retriever = self.account_retriever()?;
        retriever.ensure_exists(from).await?;

        let mut prepared = self.clone();
        if prepared.account_number == 0 || prepared.sequence == 0 {
            let (number, sequence) = retriever.get_account_number_sequence(from).await?;
            if prepared.account_number == 0 {
                prepared.account_number = number;
            }
            if prepared.sequence == 0 {
                prepared.sequence = sequence;
            }
            debug!(
                address = %from,
                account_number = prepared.account_number,
                sequence = prepared.sequence,
                "prepared factory"
            );
        }
        Ok(prepared)
    }

    /// Fees to put in the transaction: the explicit fees, or
    /// `ceil(gas × price)` per priced denom.
    pub fn effective_fees(&self) -> Result<Coins, SdkError> {
        if self.gas_prices.is_empty() {
            return Ok(self.fees.clone());
        }
        if !self.fees.is_empty() {
            return Err(SdkError::InvalidRequest(
                "cannot provide both fees and gas prices".into(),
            ));
        }
        let derived = self
            .gas_prices
            .iter()
            .map(|price| Coin::new(price.amount.mul_u64_ceil(self.gas)?, price.denom.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Coins::new(derived)
    }

    /// Build a transaction with no signatures.
    pub fn build_unsigned(&self, msgs: Vec<MsgRef>) -> Result<TxBuilder, SdkError> {
        if self.chain_id.is_empty() && !(self.offline && self.generate_only) {
            return Err(SdkError::InvalidChainId("chain ID required but not specified".into()));
        }
        let fees = self.effective_fees()?;

        let memo_len = self.memo.chars().count();
        if memo_len > MAX_MEMO_CHARS {
            return Err(SdkError::MemoTooLarge { len: memo_len, max: MAX_MEMO_CHARS });
        }
        if !self.memo.is_empty() && is_valid_mnemonic(&self.memo) {
            return Err(SdkError::InvalidRequest(
                "cannot provide a valid mnemonic seed in the memo field".into(),
            ));
        }

        let mut builder = TxBuilder::new();
        builder.set_msgs(msgs);
        builder.set_memo(self.memo.clone());
        builder.set_timeout_height(self.timeout_height);
        builder.set_extension_options(self.extension_options.clone());
        builder.set_non_critical_extension_options(self.non_critical_extension_options.clone());
        builder.set_fee_amount(fees);
        builder.set_gas_limit(self.gas);
        builder.set_fee_granter(self.fee_granter.clone());
        builder.set_fee_payer(self.fee_payer.clone());
        Ok(builder)
    }

    /// Public key used in simulations: the signing key's when simulating
    /// ahead of execution, otherwise an empty secp256k1 key.
    fn simulation_pubkey(&self) -> Result<PublicKey, SdkError> {
        if self.simulate_and_execute && !self.from_name.is_empty() {
            if let Some(keyring) = &self.keyring {
                return Ok(keyring.key(&self.from_name)?.pubkey);
            }
        }
        Ok(PublicKey::Secp256k1([0; 33]))
    }

    /// Encoded transaction for the simulate endpoint, carrying one zeroed
    /// signature of the right length.
    pub fn build_simulation_tx(&self, msgs: Vec<MsgRef>) -> Result<Vec<u8>, SdkError> {
        let mut builder = self.build_unsigned(msgs)?;
        let pubkey = self.simulation_pubkey()?;
        let mode = self.resolved_sign_mode();
        let data = match &pubkey {
            PublicKey::Multisig(multi) => {
                let (bitarray, sig) = multi.sim_signature();
                SignatureData::Multi {
                    bitarray,
                    signatures: sig
                        .signatures
                        .into_iter()
                        .map(|signature| SignatureData::Single {
                            mode: SignMode::LegacyAminoJson,
                            signature,
                        })
                        .collect(),
                }
            }
            key => SignatureData::Single {
                mode,
                signature: vec![0; key.signature_len()],
            },
        };
        builder.set_signatures(vec![SignatureV2 {
            pubkey,
            data,
            sequence: self.sequence,
        }]);
        Ok(builder.encode())
    }

    /// Run `msgs` through the node's simulate endpoint.
    pub async fn simulate(&self, msgs: Vec<MsgRef>) -> Result<SimulateResponse, SdkError> {
        let tx_bytes = self.build_simulation_tx(msgs)?;
        let request = SimulateRequest { tx_bytes };
        let res = self
            .client()?
            .abci_query(SIMULATE_PATH, &request.encode_to_vec(), None)
            .await
            .map_err(|e| match e {
                RpcError::Node { log, .. } => SdkError::GasEstimationFailed(log),
                other => other.into(),
            })?;
        Ok(SimulateResponse::decode(res.value.as_slice())?)
    }

    /// Simulate and return `(estimated, adjusted)` gas.
    pub async fn calculate_gas(&self, msgs: Vec<MsgRef>) -> Result<(u64, u64), SdkError> {
        let res = match self.simulate(msgs).await {
            Ok(res) => res,
            Err(e) => {
                error!(error = %e, "tx simulation failed");
                return Err(e);
            }
        };
        let estimated = match res.gas_info {
            Some(info) => info.gas_used,
            None => {
                warn!("simulation returned no gas info");
                return Err(SdkError::GasEstimationFailed("simulation returned no gas info".into()));
            }
        };
        let adjusted = adjust_gas(estimated, self.gas_adjustment)?;
        debug!(estimated, adjusted, adjustment = self.gas_adjustment, "tx simulation successful");
        Ok((estimated, adjusted))
    }

    /// Simulate and return a copy whose gas is the adjusted estimate.
    pub async fn with_simulated_gas(&self, msgs: Vec<MsgRef>) -> Result<Self, SdkError> {
        let (_, adjusted) = self.calculate_gas(msgs).await?;
        let mut factory = self.clone();
        factory.gas = adjusted;
        Ok(factory)
    }

    /// Sign bytes for `signer` over `builder` in the factory's mode.
    pub async fn sign_bytes(
        &self,
        signer: &SignerData,
        builder: &TxBuilder,
    ) -> Result<Vec<u8>, SdkError> {
        self.sign_bytes_in(self.resolved_sign_mode(), signer, builder).await
    }

    pub async fn sign_bytes_in(
        &self,
        mode: SignMode,
        signer: &SignerData,
        builder: &TxBuilder,
    ) -> Result<Vec<u8>, SdkError> {
        sign_mode::sign_bytes(mode, signer, builder, self.metadata.as_deref()).await
    }
}
