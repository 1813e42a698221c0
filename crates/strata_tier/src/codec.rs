// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Value codecs for byte-oriented cache tiers.
//!
//! Backends that store raw bytes (such as a networked key-value store) turn values into
//! bytes with a [`Codec`]. Backends that keep values natively never need one.
//!
//! Two interchangeable codecs are provided with the `serde` feature:
//!
//! - [`JsonCodec`]: self-describing text, easy to inspect from other tools.
//! - [`MessagePackCodec`]: compact binary.

use crate::Error;

/// Encodes values to bytes and decodes them back.
///
/// Failures are reported as [`ErrorKind::Codec`](crate::ErrorKind::Codec) errors.
pub trait Codec<V>: Send + Sync {
    /// Serializes a value to bytes.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the value cannot be represented.
    fn encode(&self, value: &V) -> Result<Vec<u8>, Error>;

    /// Deserializes bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the bytes are not a valid encoding of `V`.
    fn decode(&self, bytes: &[u8]) -> Result<V, Error>;
}

#[cfg(feature = "serde")]
mod serde_codecs {
    use serde::{Serialize, de::DeserializeOwned};

    use super::Codec;
    use crate::Error;

    /// A [`Codec`] storing values as JSON.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_tier::{Codec, JsonCodec};
    ///
    /// let bytes = JsonCodec.encode(&vec![1, 2, 3]).unwrap();
    /// assert_eq!(bytes, b"[1,2,3]");
    ///
    /// let value: Vec<i32> = JsonCodec.decode(&bytes).unwrap();
    /// assert_eq!(value, vec![1, 2, 3]);
    /// ```
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct JsonCodec;

    impl<V> Codec<V> for JsonCodec
    where
        V: Serialize + DeserializeOwned,
    {
        fn encode(&self, value: &V) -> Result<Vec<u8>, Error> {
            serde_json::to_vec(value).map_err(Error::codec)
        }

        fn decode(&self, bytes: &[u8]) -> Result<V, Error> {
            serde_json::from_slice(bytes).map_err(Error::codec)
        }
    }

    /// A [`Codec`] storing values as MessagePack.
    ///
    /// Structs are encoded with field names so that adding optional fields stays compatible
    /// with entries written by older versions.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct MessagePackCodec;

    impl<V> Codec<V> for MessagePackCodec
    where
        V: Serialize + DeserializeOwned,
    {
        fn encode(&self, value: &V) -> Result<Vec<u8>, Error> {
            rmp_serde::to_vec_named(value).map_err(Error::codec)
        }

        fn decode(&self, bytes: &[u8]) -> Result<V, Error> {
            rmp_serde::from_slice(bytes).map_err(Error::codec)
        }
    }
}

#[cfg(feature = "serde")]
pub use serde_codecs::{JsonCodec, MessagePackCodec};
