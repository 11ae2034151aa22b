//! Conversion between user values and [Payload]s. The activity context treats the converter as an
//! opaque, shared collaborator: heartbeat details are encoded through it and previous-attempt
//! details are decoded through it.

use crate::protos::{Payload, Payloads};
use serde::de::DeserializeOwned;
use std::{collections::HashMap, fmt::Debug, sync::Arc};

const ENCODING_KEY: &str = "encoding";
const JSON_ENCODING: &[u8] = b"json/plain";

/// Errors converting values to or from payloads
#[derive(Debug, thiserror::Error)]
pub enum PayloadConversionError {
    /// The payload was not produced by an encoding this converter understands
    #[error("Wrong encoding")]
    WrongEncoding,
    /// Decoding asked for more values than there are payloads
    #[error("Expected at least {expected} payloads but found {actual}")]
    WrongArity {
        /// Number of values requested
        expected: usize,
        /// Number of payloads available
        actual: usize,
    },
    /// The underlying serializer failed
    #[error("Encoding error: {0}")]
    EncodingError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Converts single values to and from payloads. Implementations must be safe to share between
/// any number of concurrently running activities.
pub trait DataConverter: Send + Sync + Debug {
    /// Serialize one value into a payload
    fn to_payload(
        &self,
        value: &dyn erased_serde::Serialize,
    ) -> Result<Payload, PayloadConversionError>;

    /// Produce a deserializer over the value stored in `payload`
    #[allow(clippy::wrong_self_convention)]
    fn from_payload(
        &self,
        payload: &Payload,
    ) -> Result<Box<dyn erased_serde::Deserializer<'static>>, PayloadConversionError>;
}

/// The default converter. Stores values as JSON tagged with `json/plain` encoding metadata.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonDataConverter;

impl DataConverter for JsonDataConverter {
    fn to_payload(
        &self,
        value: &dyn erased_serde::Serialize,
    ) -> Result<Payload, PayloadConversionError> {
        let as_json = serde_json::to_vec(value)
            .map_err(|e| PayloadConversionError::EncodingError(e.into()))?;
        Ok(Payload {
            metadata: HashMap::from([(ENCODING_KEY.to_string(), JSON_ENCODING.to_vec())]),
            data: as_json,
        })
    }

    fn from_payload(
        &self,
        payload: &Payload,
    ) -> Result<Box<dyn erased_serde::Deserializer<'static>>, PayloadConversionError> {
        let encoding = payload.metadata.get(ENCODING_KEY).map(|v| v.as_slice());
        if encoding != Some(JSON_ENCODING) {
            return Err(PayloadConversionError::WrongEncoding);
        }
        let json_v: serde_json::Value = serde_json::from_slice(&payload.data)
            .map_err(|e| PayloadConversionError::EncodingError(Box::new(e)))?;
        Ok(Box::new(<dyn erased_serde::Deserializer>::erase(json_v)))
    }
}

/// The converter used when none is supplied
pub fn default_data_converter() -> Arc<dyn DataConverter> {
    Arc::new(JsonDataConverter)
}

/// Encode each value into its own payload, preserving order
pub fn encode_args(
    converter: &dyn DataConverter,
    values: &[&(dyn erased_serde::Serialize + Sync)],
) -> Result<Payloads, PayloadConversionError> {
    values
        .iter()
        .map(|v| converter.to_payload(*v))
        .collect::<Result<Vec<_>, _>>()
        .map(Payloads::from)
}

/// Decode a single payload into `T`
pub fn decode_payload<T: DeserializeOwned>(
    converter: &dyn DataConverter,
    payload: &Payload,
) -> Result<T, PayloadConversionError> {
    let mut de = converter.from_payload(payload)?;
    erased_serde::deserialize(&mut de).map_err(|e| PayloadConversionError::EncodingError(e.into()))
}

/// Types which can be decoded out of an ordered list of payloads. Implemented for tuples, where
/// each element takes the next payload, and for raw [Payloads].
///
/// Payloads beyond the number of tuple elements are ignored. Asking for more elements than there
/// are payloads is a [PayloadConversionError::WrongArity] error.
pub trait FromPayloads: Sized {
    /// Decode from `payloads` with `converter`
    fn from_payloads(
        converter: &dyn DataConverter,
        payloads: &Payloads,
    ) -> Result<Self, PayloadConversionError>;
}

impl FromPayloads for Payloads {
    fn from_payloads(
        _: &dyn DataConverter,
        payloads: &Payloads,
    ) -> Result<Self, PayloadConversionError> {
        Ok(payloads.clone())
    }
}

macro_rules! impl_from_payloads_for_tuple {
    ($count:expr; $($idx:tt: $ty:ident),+) => {
        impl<$($ty),+> FromPayloads for ($($ty,)+)
        where
            $($ty: DeserializeOwned),+
        {
            fn from_payloads(
                converter: &dyn DataConverter,
                payloads: &Payloads,
            ) -> Result<Self, PayloadConversionError> {
                let p = &payloads.payloads;
                if p.len() < $count {
                    return Err(PayloadConversionError::WrongArity {
                        expected: $count,
                        actual: p.len(),
                    });
                }
                Ok(($(decode_payload::<$ty>(converter, &p[$idx])?,)+))
            }
        }
    };
}

impl_from_payloads_for_tuple!(1; 0: A);
impl_from_payloads_for_tuple!(2; 0: A, 1: B);
impl_from_payloads_for_tuple!(3; 0: A, 1: B, 2: C);
impl_from_payloads_for_tuple!(4; 0: A, 1: B, 2: C, 3: D);
impl_from_payloads_for_tuple!(5; 0: A, 1: B, 2: C, 3: D, 4: E);
impl_from_payloads_for_tuple!(6; 0: A, 1: B, 2: C, 3: D, 4: E, 5: F);

/// A set of payloads paired with the converter able to decode them
#[derive(Clone, Copy, Debug)]
pub struct EncodedValues<'a> {
    payloads: &'a Payloads,
    converter: &'a dyn DataConverter,
}

impl<'a> EncodedValues<'a> {
    pub(crate) fn new(payloads: &'a Payloads, converter: &'a dyn DataConverter) -> Self {
        Self {
            payloads,
            converter,
        }
    }

    /// Number of encoded values
    pub fn len(&self) -> usize {
        self.payloads.payloads.len()
    }

    /// Returns true if there are no encoded values
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Decode the values into `T`, see [FromPayloads]
    pub fn get<T: FromPayloads>(&self) -> Result<T, PayloadConversionError> {
        T::from_payloads(self.converter, self.payloads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Progress {
        processed: u64,
        cursor: String,
    }

    fn progress() -> Progress {
        Progress {
            processed: 17,
            cursor: "page-3".to_string(),
        }
    }

    #[test]
    fn json_payloads_are_tagged() {
        let p = JsonDataConverter.to_payload(&progress()).unwrap();
        assert_eq!(p.metadata.get("encoding").unwrap(), b"json/plain");
        assert_eq!(
            p.data,
            br#"{"processed":17,"cursor":"page-3"}"#.to_vec()
        );
    }

    #[test]
    fn tuples_take_payloads_in_order() {
        let dc = JsonDataConverter;
        let encoded = encode_args(&dc, &[&progress(), &"note", &3_u8]).unwrap();
        let (p, note): (Progress, String) = EncodedValues::new(&encoded, &dc).get().unwrap();
        assert_eq!(p, progress());
        assert_eq!(note, "note");
    }

    #[test]
    fn more_slots_than_payloads_is_an_error() {
        let dc = JsonDataConverter;
        let encoded = encode_args(&dc, &[&1_u32]).unwrap();
        let res = EncodedValues::new(&encoded, &dc).get::<(u32, u32)>();
        assert_matches!(
            res,
            Err(PayloadConversionError::WrongArity {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        let payloads = Payloads::from(vec![Payload {
            metadata: HashMap::from([("encoding".to_string(), b"binary/plain".to_vec())]),
            data: vec![0xde, 0xad],
        }]);
        let res = EncodedValues::new(&payloads, &JsonDataConverter).get::<(u32,)>();
        assert_matches!(res, Err(PayloadConversionError::WrongEncoding));
    }

    #[test]
    fn mismatched_type_surfaces_serde_error() {
        let dc = JsonDataConverter;
        let encoded = encode_args(&dc, &[&"not a number"]).unwrap();
        let res = EncodedValues::new(&encoded, &dc).get::<(u32,)>();
        assert_matches!(res, Err(PayloadConversionError::EncodingError(_)));
    }

    #[test]
    fn raw_payloads_pass_through() {
        let dc = JsonDataConverter;
        let encoded = encode_args(&dc, &[&1_u32, &2_u32]).unwrap();
        let raw: Payloads = EncodedValues::new(&encoded, &dc).get().unwrap();
        assert_eq!(raw, encoded);
    }
}
