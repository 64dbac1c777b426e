//! Human-readable sign bytes (`SIGN_MODE_TEXTUAL`).
//!
//! The transaction is rendered as an ordered list of screens, each a
//! `title: content` pair with an indent level and an expert flag, and the
//! JSON encoding of that list is what gets signed. Coin amounts are shown in
//! display units when the bank module has metadata for the denom.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use prost::Message;
use serde::Serialize;
use serde_json::Value;

use cosmtx_crypto::sha256;
use cosmtx_rpc::{CometClient, RpcError, DENOM_METADATA_PATH};
use cosmtx_types::proto::{Metadata, QueryDenomMetadataRequest, QueryDenomMetadataResponse};
use cosmtx_types::{Coin, Coins, SdkError};

use crate::builder::TxBuilder;
use crate::signing::SignerData;

/// Source of denom display metadata.
#[async_trait]
pub trait CoinMetadataQuerier: Send + Sync {
    /// `Ok(None)` when the chain has no metadata for `denom`.
    async fn denom_metadata(&self, denom: &str) -> Result<Option<Metadata>, SdkError>;
}

/// Canned metadata, keyed by base denom.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    entries: HashMap<String, Metadata>,
}

impl StaticMetadata {
    pub fn new(entries: impl IntoIterator<Item = Metadata>) -> Self {
        Self {
            entries: entries.into_iter().map(|m| (m.base.clone(), m)).collect(),
        }
    }
}

#[async_trait]
impl CoinMetadataQuerier for StaticMetadata {
    async fn denom_metadata(&self, denom: &str) -> Result<Option<Metadata>, SdkError> {
        Ok(self.entries.get(denom).cloned())
    }
}

/// Queries the bank module's `DenomMetadata` endpoint.
pub struct NodeMetadataQuerier {
    client: Arc<dyn CometClient>,
}

impl NodeMetadataQuerier {
    pub fn new(client: Arc<dyn CometClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CoinMetadataQuerier for NodeMetadataQuerier {
    async fn denom_metadata(&self, denom: &str) -> Result<Option<Metadata>, SdkError> {
        let request = QueryDenomMetadataRequest {
            denom: denom.to_string(),
        };
        match self
            .client
            .abci_query(DENOM_METADATA_PATH, &request.encode_to_vec(), None)
            .await
        {
            Ok(res) => Ok(QueryDenomMetadataResponse::decode(res.value.as_slice())?.metadata),
            Err(RpcError::Node { log, .. }) if log.contains("not found") => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Screen {
    pub title: String,
    pub content: String,
    pub indent: u32,
    pub expert: bool,
}

impl Screen {
    fn new(title: &str, content: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            content: content.into(),
            indent: 0,
            expert: false,
        }
    }

    fn indented(mut self, indent: u32) -> Self {
        self.indent = indent;
        self
    }

    fn expert(mut self) -> Self {
        self.expert = true;
        self
    }
}

pub async fn sign_bytes(
    signer: &SignerData,
    builder: &TxBuilder,
    querier: &dyn CoinMetadataQuerier,
) -> Result<Vec<u8>, SdkError> {
    let screens = render(signer, builder, querier).await?;
    Ok(serde_json::to_vec(&screens)?)
}

/// Render the screens a signer reviews before signing.
pub async fn render(
    signer: &SignerData,
    builder: &TxBuilder,
    querier: &dyn CoinMetadataQuerier,
) -> Result<Vec<Screen>, SdkError> {
    let mut r = Renderer {
        querier,
        cache: HashMap::new(),
    };
    let mut screens = vec![
        Screen::new("Chain id", signer.chain_id.clone()),
        Screen::new("Account number", signer.account_number.to_string()),
        Screen::new("Sequence", signer.sequence.to_string()),
        Screen::new("Address", signer.address.to_string()),
        Screen::new("Public key", signer.pubkey.type_url()).expert(),
    ];

    let msgs = builder.msgs();
    let plural = if msgs.len() == 1 { "" } else { "s" };
    screens.push(Screen::new(
        "",
        format!("This transaction has {} Message{plural}", msgs.len()),
    ));
    for (i, msg) in msgs.iter().enumerate() {
        screens.push(
            Screen::new(&format!("Message ({}/{})", i + 1, msgs.len()), msg.type_url()).indented(1),
        );
        r.render_fields(&msg.to_json(), 2, &mut screens).await?;
    }
    screens.push(Screen::new("", "End of Messages"));

    if !builder.memo().is_empty() {
        screens.push(Screen::new("Memo", builder.memo()));
    }
    let fee = builder.fee();
    screens.push(Screen::new("Fees", r.format_coins(&fee.amount).await?));
    if let Some(payer) = &fee.payer {
        screens.push(Screen::new("Fee payer", payer.to_string()).expert());
    }
    if let Some(granter) = &fee.granter {
        screens.push(Screen::new("Fee granter", granter.to_string()).expert());
    }
    screens.push(Screen::new("Gas limit", fee.gas_limit.to_string()).expert());
    if builder.timeout_height() != 0 {
        screens.push(Screen::new("Timeout height", builder.timeout_height().to_string()));
    }

    let mut raw = builder.body_bytes();
    raw.extend_from_slice(&builder.auth_info_bytes());
    screens.push(Screen::new("Hash of raw bytes", hex::encode(sha256(&raw))).expert());
    Ok(screens)
}

struct Renderer<'a> {
    querier: &'a dyn CoinMetadataQuerier,
    cache: HashMap<String, Option<Metadata>>,
}

impl Renderer<'_> {
    async fn metadata(&mut self, denom: &str) -> Result<Option<Metadata>, SdkError> {
        if let Some(hit) = self.cache.get(denom) {
            return Ok(hit.clone());
        }
        let fetched = self.querier.denom_metadata(denom).await?;
        self.cache.insert(denom.to_string(), fetched.clone());
        Ok(fetched)
    }

    async fn format_coin(&mut self, coin: &Coin) -> Result<String, SdkError> {
        let metadata = self.metadata(&coin.denom).await?;
        Ok(format_coin(coin, metadata.as_ref()))
    }

    async fn format_coins(&mut self, coins: &Coins) -> Result<String, SdkError> {
        if coins.is_empty() {
            return Ok("zero".into());
        }
        let mut parts = Vec::with_capacity(coins.len());
        for coin in coins.iter() {
            parts.push(self.format_coin(coin).await?);
        }
        Ok(parts.join(", "))
    }

    async fn render_fields(
        &mut self,
        value: &Value,
        indent: u32,
        out: &mut Vec<Screen>,
    ) -> Result<(), SdkError> {
        let Value::Object(map) = value else {
            return Ok(());
        };
        for (key, v) in map.iter().filter(|(k, _)| k.as_str() != "@type") {
            let title = field_title(key);
            if let Some(coins) = as_coins(v) {
                let content = self.format_coins(&coins).await?;
                out.push(Screen::new(&title, content).indented(indent));
                continue;
            }
            if let Some(coin) = as_coin(v) {
                let content = self.format_coin(&coin).await?;
                out.push(Screen::new(&title, content).indented(indent));
                continue;
            }
            match v {
                Value::Object(_) => {
                    out.push(Screen::new(&title, "").indented(indent));
                    Box::pin(self.render_fields(v, indent + 1, out)).await?;
                }
                Value::Array(items) => {
                    out.push(Screen::new(&title, format!("{} items", items.len())).indented(indent));
                    for item in items {
                        match item {
                            Value::Object(_) => Box::pin(self.render_fields(item, indent + 1, out)).await?,
                            other => out.push(Screen::new("", scalar(other)).indented(indent + 1)),
                        }
                    }
                }
                other => out.push(Screen::new(&title, scalar(other)).indented(indent)),
            }
        }
        Ok(())
    }
}

/// `from_address` → `From address`.
fn field_title(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "nil".into(),
        other => other.to_string(),
    }
}

fn as_coin(value: &Value) -> Option<Coin> {
    let obj = value.as_object()?;
    if obj.len() != 2 {
        return None;
    }
    let denom = obj.get("denom")?.as_str()?;
    let amount = obj.get("amount")?.as_str()?.parse().ok()?;
    Some(Coin {
        denom: denom.to_string(),
        amount,
    })
}

fn as_coins(value: &Value) -> Option<Coins> {
    let items = value.as_array()?;
    if items.is_empty() {
        return None;
    }
    let coins = items.iter().map(as_coin).collect::<Option<Vec<_>>>()?;
    Coins::new(coins).ok()
}

/// Render `coin` in its display unit, or in the base denom when metadata
/// is missing or has no usable display unit.
pub fn format_coin(coin: &Coin, metadata: Option<&Metadata>) -> String {
    let base = || format!("{} {}", group_thousands(&coin.amount.to_string()), coin.denom);
    let Some(meta) = metadata else {
        return base();
    };
    let exponent_of = |denom: &str| {
        meta.denom_units
            .iter()
            .find(|u| u.denom == denom || u.aliases.iter().any(|a| a == denom))
            .map(|u| u.exponent)
    };
    let (Some(display_exp), Some(base_exp)) = (exponent_of(&meta.display), exponent_of(&coin.denom))
    else {
        return base();
    };
    let shift = match display_exp.checked_sub(base_exp) {
        Some(s) if s > 0 && s < 39 => s,
        Some(0) => return format!("{} {}", group_thousands(&coin.amount.to_string()), meta.display),
        _ => return base(),
    };
    let unit = 10u128.pow(shift);
    let int = coin.amount / unit;
    let frac = coin.amount % unit;
    let int = group_thousands(&int.to_string());
    if frac == 0 {
        format!("{int} {}", meta.display)
    } else {
        let frac = format!("{frac:0width$}", width = shift as usize);
        format!("{int}.{} {}", frac.trim_end_matches('0'), meta.display)
    }
}

/// `1234567` → `1'234'567`.
fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('\'');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmtx_crypto::{KeyAlgo, PrivateKey};
    use cosmtx_types::proto::DenomUnit;
    use cosmtx_types::{AccAddress, MsgSend};

    fn atom_metadata() -> Metadata {
        Metadata {
            description: "The native staking token".into(),
            denom_units: vec![
                DenomUnit { denom: "uatom".into(), exponent: 0, aliases: vec![] },
                DenomUnit { denom: "atom".into(), exponent: 6, aliases: vec![] },
            ],
            base: "uatom".into(),
            display: "atom".into(),
            name: "Atom".into(),
            symbol: "ATOM".into(),
        }
    }

    fn coin(s: &str) -> Coin {
        s.parse().unwrap()
    }

    #[test]
    fn display_units() {
        let meta = atom_metadata();
        assert_eq!(format_coin(&coin("1500000uatom"), Some(&meta)), "1.5 atom");
        assert_eq!(format_coin(&coin("2000000uatom"), Some(&meta)), "2 atom");
        assert_eq!(format_coin(&coin("1uatom"), Some(&meta)), "0.000001 atom");
        assert_eq!(format_coin(&coin("1234567000000uatom"), Some(&meta)), "1'234'567 atom");
    }

    #[test]
    fn missing_metadata_uses_base_denom() {
        assert_eq!(format_coin(&coin("1500uatom"), None), "1'500 uatom");
        let mut meta = atom_metadata();
        meta.display = "unknown".into();
        assert_eq!(format_coin(&coin("7uatom"), Some(&meta)), "7 uatom");
    }

    #[test]
    fn titles() {
        assert_eq!(field_title("from_address"), "From address");
        assert_eq!(group_thousands("100"), "100");
        assert_eq!(group_thousands("1000"), "1'000");
    }

    #[tokio::test]
    async fn renders_with_canned_metadata() {
        let sk = PrivateKey::generate(KeyAlgo::Secp256k1).unwrap();
        let mut b = TxBuilder::new();
        b.set_msgs(vec![Arc::new(MsgSend {
            from_address: sk.public_key().address(),
            to_address: AccAddress::from([2; 20]),
            amount: Coins::parse("2500000uatom").unwrap(),
        })]);
        b.set_fee_amount(Coins::parse("5000uatom").unwrap());
        b.set_gas_limit(200_000);
        let signer = SignerData {
            address: sk.public_key().address(),
            chain_id: "test-1".into(),
            account_number: 1,
            sequence: 0,
            pubkey: sk.public_key(),
        };
        let querier = StaticMetadata::new([atom_metadata()]);
        let screens = render(&signer, &b, &querier).await.unwrap();
        assert!(screens.contains(&Screen::new("Amount", "2.5 atom").indented(2)));
        assert!(screens.contains(&Screen::new("Fees", "0.005 atom")));
        assert_eq!(screens[0], Screen::new("Chain id", "test-1"));

        let bytes = sign_bytes(&signer, &b, &querier).await.unwrap();
        let again = sign_bytes(&signer, &b, &querier).await.unwrap();
        assert_eq!(bytes, again);

        let plain = render(&signer, &b, &StaticMetadata::default()).await.unwrap();
        assert!(plain.contains(&Screen::new("Fees", "5'000 uatom")));
    }
}
