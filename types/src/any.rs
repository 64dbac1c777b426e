//! The `google.protobuf.Any` envelope.

use prost::Message;

use crate::error::SdkError;

/// A type-URL tagged, protobuf-encoded value.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct Any {
    #[prost(string, tag = "1")]
    pub type_url: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: ::prost::alloc::vec::Vec<u8>,
}

impl Any {
    /// Pack `msg` under its canonical type URL. Encoding is deterministic:
    /// prost writes fields in tag order and skips default scalars.
    pub fn pack<M: Message>(type_url: &str, msg: &M) -> Self {
        Any {
            type_url: type_url.to_string(),
            value: msg.encode_to_vec(),
        }
    }

    /// Decode the payload as `M`, checking the type URL first.
    pub fn unpack<M: Message + Default>(&self, type_url: &str) -> Result<M, SdkError> {
        if self.type_url != type_url {
            return Err(SdkError::Serialization(format!(
                "expected {type_url}, got {}",
                self.type_url
            )));
        }
        Ok(M::decode(self.value.as_slice())?)
    }
}
