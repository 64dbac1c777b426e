//! Grant storage and fee spending.
//!
//! Layout:
//! - `0x00 ‖ len(granter) ‖ granter ‖ len(grantee) ‖ grantee` → `Grant`
//! - `0x01 ‖ expiration (u64 BE) ‖ granter ‖ grantee` → empty
//!
//! The expiry index is never read on the spend path; expired grants are
//! deleted when they are next used. [`FeeGrantKeeper::prune_expired`] walks
//! the index for operator cleanup.

use prost::Message;
use tracing::{debug, info};

use cosmtx_store::{length_prefixed, KvStore, StoreError};
use cosmtx_types::{AccAddress, Coins, MsgRef, SdkError, Timestamp};

use crate::allowance::{Allowance, Outcome};
use crate::msgs::{MsgGrantAllowance, MsgRevokeAllowance};
use crate::proto;

pub const GRANT_PREFIX: u8 = 0x00;
pub const EXPIRY_PREFIX: u8 = 0x01;

pub fn grant_key(granter: &AccAddress, grantee: &AccAddress) -> Result<Vec<u8>, StoreError> {
    let mut key = vec![GRANT_PREFIX];
    key.extend(length_prefixed(granter.as_bytes())?);
    key.extend(length_prefixed(grantee.as_bytes())?);
    Ok(key)
}

pub fn expiry_key(expiration: Timestamp, granter: &AccAddress, grantee: &AccAddress) -> Vec<u8> {
    let mut key = vec![EXPIRY_PREFIX];
    key.extend_from_slice(&expiration.to_be_bytes());
    key.extend_from_slice(granter.as_bytes());
    key.extend_from_slice(grantee.as_bytes());
    key
}

fn not_found(granter: &AccAddress, grantee: &AccAddress) -> SdkError {
    SdkError::GrantNotFound {
        granter: granter.to_string(),
        grantee: grantee.to_string(),
    }
}

pub struct FeeGrantKeeper<S> {
    store: S,
}

impl<S: KvStore> FeeGrantKeeper<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create a grant. Fails if one already exists for the pair.
    pub fn grant_allowance(
        &self,
        granter: &AccAddress,
        grantee: &AccAddress,
        mut allowance: Allowance,
        now: Timestamp,
    ) -> Result<(), SdkError> {
        if granter == grantee {
            return Err(SdkError::InvalidAddress("cannot self-grant fee authorization".into()));
        }
        if self.store.has(&grant_key(granter, grantee)?)? {
            return Err(SdkError::InvalidRequest("fee allowance already exists".into()));
        }
        allowance.validate_basic()?;
        allowance.validate_at(now)?;
        allowance.init_period(now);

        self.save(granter, grantee, &allowance)?;
        info!(
            granter = %granter,
            grantee = %grantee,
            kind = allowance.type_url(),
            "fee allowance granted"
        );
        Ok(())
    }

    pub fn revoke_allowance(&self, granter: &AccAddress, grantee: &AccAddress) -> Result<(), SdkError> {
        let allowance = self
            .get_allowance(granter, grantee)?
            .ok_or_else(|| not_found(granter, grantee))?;
        self.remove(granter, grantee, &allowance)?;
        info!(granter = %granter, grantee = %grantee, "fee allowance revoked");
        Ok(())
    }

    pub fn get_allowance(
        &self,
        granter: &AccAddress,
        grantee: &AccAddress,
    ) -> Result<Option<Allowance>, SdkError> {
        let Some(bytes) = self.store.get(&grant_key(granter, grantee)?)? else {
            return Ok(None);
        };
        let grant = proto::Grant::decode(bytes.as_slice()).map_err(StoreError::from)?;
        let any = grant
            .allowance
            .ok_or_else(|| StoreError::Corruption("grant without allowance".into()))?;
        Ok(Some(Allowance::from_any(&any)?))
    }

    /// Every grant issued by `granter`, ordered by grantee bytes.
    pub fn grants_by_granter(&self, granter: &AccAddress) -> Result<Vec<(AccAddress, Allowance)>, SdkError> {
        let mut prefix = vec![GRANT_PREFIX];
        prefix.extend(length_prefixed(granter.as_bytes())?);
        let mut out = Vec::new();
        for (key, _) in self.store.iter_prefix(&prefix)? {
            let grantee_part = &key[prefix.len()..];
            let (&len, rest) = grantee_part
                .split_first()
                .ok_or_else(|| StoreError::Corruption("truncated grant key".into()))?;
            if rest.len() != usize::from(len) {
                return Err(StoreError::Corruption("grant key length mismatch".into()).into());
            }
            let grantee = AccAddress::new(rest.to_vec())?;
            if let Some(allowance) = self.get_allowance(granter, &grantee)? {
                out.push((grantee, allowance));
            }
        }
        Ok(out)
    }

    /// Charge `fee` against the grant from `granter` to `grantee`.
    ///
    /// An expired grant is deleted and `GrantExpired` returned. A grant
    /// spent down to zero is deleted after the fee is accepted.
    pub fn use_granted_fees(
        &self,
        granter: &AccAddress,
        grantee: &AccAddress,
        fee: &Coins,
        msgs: &[MsgRef],
        now: Timestamp,
    ) -> Result<(), SdkError> {
        let allowance = self
            .get_allowance(granter, grantee)?
            .ok_or_else(|| not_found(granter, grantee))?;
        let msg_types: Vec<&str> = msgs.iter().map(|m| m.type_url()).collect();

        match allowance.accept(fee, &msg_types, now) {
            Err(SdkError::GrantExpired) => {
                self.remove(granter, grantee, &allowance)?;
                info!(granter = %granter, grantee = %grantee, "deleted expired fee allowance");
                Err(SdkError::GrantExpired)
            }
            Err(e) => {
                debug!(granter = %granter, grantee = %grantee, fee = %fee, error = %e, "fee allowance rejected");
                Err(e)
            }
            Ok(Outcome::Unchanged) => {
                debug!(granter = %granter, grantee = %grantee, fee = %fee, "fee allowance used");
                Ok(())
            }
            Ok(Outcome::Updated(next)) => {
                self.save(granter, grantee, &next)?;
                debug!(granter = %granter, grantee = %grantee, fee = %fee, "fee allowance used");
                Ok(())
            }
            Ok(Outcome::Exhausted) => {
                self.remove(granter, grantee, &allowance)?;
                info!(granter = %granter, grantee = %grantee, fee = %fee, "fee allowance exhausted");
                Ok(())
            }
        }
    }

    /// Delete up to `limit` grants whose expiration is before `now`.
    /// Returns how many were removed.
    pub fn prune_expired(&self, now: Timestamp, limit: usize) -> Result<usize, SdkError> {
        let mut pruned = 0;
        for (key, _) in self.store.iter_prefix(&[EXPIRY_PREFIX])? {
            if pruned >= limit {
                break;
            }
            if key.len() < 9 {
                return Err(StoreError::Corruption("truncated expiry key".into()).into());
            }
            let mut exp = [0u8; 8];
            exp.copy_from_slice(&key[1..9]);
            let expiration = Timestamp::new(u64::from_be_bytes(exp));
            if expiration >= now {
                break;
            }
            match self.resolve_index_entry(expiration, &key[9..])? {
                Some((granter, grantee)) => {
                    self.store.delete(&grant_key(&granter, &grantee)?)?;
                    debug!(granter = %granter, grantee = %grantee, "pruned expired fee allowance");
                }
                None => debug!(key = ?key, "dropping dangling expiry index entry"),
            }
            self.store.delete(&key)?;
            pruned += 1;
        }
        if pruned > 0 {
            info!(pruned, "pruned expired fee allowances");
        }
        Ok(pruned)
    }

    /// The index stores `granter ‖ grantee` without lengths; find the split
    /// that names a live grant with this expiration.
    fn resolve_index_entry(
        &self,
        expiration: Timestamp,
        pair: &[u8],
    ) -> Result<Option<(AccAddress, AccAddress)>, SdkError> {
        for split in 1..pair.len() {
            let (Ok(granter), Ok(grantee)) = (
                AccAddress::new(pair[..split].to_vec()),
                AccAddress::new(pair[split..].to_vec()),
            ) else {
                continue;
            };
            if let Some(allowance) = self.get_allowance(&granter, &grantee)? {
                if allowance.expiration() == Some(expiration) {
                    return Ok(Some((granter, grantee)));
                }
            }
        }
        Ok(None)
    }

    /// Apply a `MsgGrantAllowance` at block time `now`.
    pub fn handle_grant(&self, msg: &MsgGrantAllowance, now: Timestamp) -> Result<(), SdkError> {
        self.grant_allowance(&msg.granter, &msg.grantee, msg.allowance.clone(), now)
    }

    pub fn handle_revoke(&self, msg: &MsgRevokeAllowance) -> Result<(), SdkError> {
        self.revoke_allowance(&msg.granter, &msg.grantee)
    }

    fn save(&self, granter: &AccAddress, grantee: &AccAddress, allowance: &Allowance) -> Result<(), SdkError> {
        let grant = proto::Grant {
            granter: granter.to_string(),
            grantee: grantee.to_string(),
            allowance: Some(allowance.to_any()),
        };
        self.store.set(&grant_key(granter, grantee)?, &grant.encode_to_vec())?;
        if let Some(exp) = allowance.expiration() {
            self.store.set(&expiry_key(exp, granter, grantee), &[])?;
        }
        Ok(())
    }

    fn remove(&self, granter: &AccAddress, grantee: &AccAddress, allowance: &Allowance) -> Result<(), SdkError> {
        self.store.delete(&grant_key(granter, grantee)?)?;
        if let Some(exp) = allowance.expiration() {
            self.store.delete(&expiry_key(exp, granter, grantee))?;
        }
        Ok(())
    }
}
