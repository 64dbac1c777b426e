//! Account number and sequence lookup.

use std::sync::Arc;

use async_trait::async_trait;
use prost::Message;
use tracing::debug;

use cosmtx_crypto::PublicKey;
use cosmtx_rpc::{CometClient, ACCOUNT_KEY_PREFIX, ACCOUNT_STORE_PATH};
use cosmtx_types::proto::{self, TYPE_URL_BASE_ACCOUNT, TYPE_URL_MODULE_ACCOUNT};
use cosmtx_types::{AccAddress, Any, SdkError};

/// On-chain account state relevant to signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: AccAddress,
    pub pub_key: Option<PublicKey>,
    pub number: u64,
    pub sequence: u64,
}

impl Account {
    fn from_base(base: proto::BaseAccount) -> Result<Self, SdkError> {
        Ok(Self {
            address: AccAddress::from_account_bech32(&base.address)?,
            pub_key: base.pub_key.as_ref().map(PublicKey::from_any).transpose()?,
            number: base.account_number,
            sequence: base.sequence,
        })
    }

    /// Decode an `Any`-wrapped base or module account.
    pub fn from_any(any: &Any) -> Result<Self, SdkError> {
        match any.type_url.as_str() {
            TYPE_URL_BASE_ACCOUNT => Self::from_base(any.unpack(TYPE_URL_BASE_ACCOUNT)?),
            TYPE_URL_MODULE_ACCOUNT => {
                let module: proto::ModuleAccount = any.unpack(TYPE_URL_MODULE_ACCOUNT)?;
                let base = module.base_account.ok_or_else(|| {
                    SdkError::Serialization(format!("module account {} has no base", module.name))
                })?;
                Self::from_base(base)
            }
            other => Err(SdkError::Serialization(format!(
                "unsupported account type {other}"
            ))),
        }
    }
}

#[async_trait]
pub trait AccountRetriever: Send + Sync {
    async fn get_account(&self, address: &AccAddress) -> Result<Account, SdkError>;

    async fn ensure_exists(&self, address: &AccAddress) -> Result<(), SdkError> {
        self.get_account(address).await.map(|_| ())
    }

    async fn get_account_number_sequence(
        &self,
        address: &AccAddress,
    ) -> Result<(u64, u64), SdkError> {
        let account = self.get_account(address).await?;
        Ok((account.number, account.sequence))
    }
}

/// Reads accounts straight from the auth module's store.
pub struct NodeAccountRetriever {
    client: Arc<dyn CometClient>,
}

impl NodeAccountRetriever {
    pub fn new(client: Arc<dyn CometClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AccountRetriever for NodeAccountRetriever {
    async fn get_account(&self, address: &AccAddress) -> Result<Account, SdkError> {
        let mut key = Vec::with_capacity(1 + address.as_bytes().len());
        key.push(ACCOUNT_KEY_PREFIX);
        key.extend_from_slice(address.as_bytes());

        let res = self.client.abci_query(ACCOUNT_STORE_PATH, &key, None).await?;
        if res.value.is_empty() {
            return Err(SdkError::AccountNotFound(address.to_string()));
        }
        let any = Any::decode(res.value.as_slice())?;
        let account = Account::from_any(&any)?;
        debug!(
            address = %address,
            number = account.number,
            sequence = account.sequence,
            height = res.height,
            "fetched account"
        );
        Ok(account)
    }
}
