//! Canonical CBOR encoding for payout requests.
//!
//! This module implements RFC 8949 Core Deterministic Encoding for the
//! request map:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (amounts are u64 base units)
//!
//! The canonical bytes feed the log's hash chain, so the same request must
//! produce identical bytes on every platform.

use bytes::Bytes;
use ciborium::value::Value;

use crate::crypto::PartyId;
use crate::error::CoreError;
use crate::request::PayoutRequest;
use crate::types::Amount;

/// Request field keys (integer keys for compact encoding).
///
/// Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const RECIPIENT: u64 = 0;
    pub const AMOUNT: u64 = 1;
    pub const IS_PENDING: u64 = 2;
}

/// The value kinds a request map is built from.
enum Field<'a> {
    Uint(u64),
    Bytes(&'a [u8]),
    Bool(bool),
}

/// Encode a request to canonical CBOR bytes.
pub fn canonical_request_bytes(request: &PayoutRequest) -> Bytes {
    let entries = [
        (keys::RECIPIENT, Field::Bytes(request.recipient.as_bytes())),
        (keys::AMOUNT, Field::Uint(request.amount.get())),
        (keys::IS_PENDING, Field::Bool(request.is_pending)),
    ];
    let mut buf = Vec::with_capacity(48);
    encode_map_canonical(&mut buf, &entries);
    Bytes::from(buf)
}

fn encode_field(buf: &mut Vec<u8>, field: &Field<'_>) {
    match field {
        Field::Uint(n) => encode_uint(buf, 0, *n),
        Field::Bytes(b) => encode_bytes(buf, b),
        Field::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(u64, Field<'_>)]) {
    let mut pairs: Vec<(Vec<u8>, &Field<'_>)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_uint(&mut key_buf, 0, *k);
            (key_buf, v)
        })
        .collect();

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_field(buf, value);
    }
}

/// Decode a request from canonical bytes.
///
/// Rejects input that decodes but is not in canonical form, so a stored
/// request always re-encodes to the exact bytes it was read from.
pub fn decode_request(bytes: &[u8]) -> Result<PayoutRequest, CoreError> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| CoreError::Decoding(e.to_string()))?;

    let map = match value {
        Value::Map(m) => m,
        _ => return Err(CoreError::MalformedRequest("expected map".into())),
    };

    let get = |key: u64| -> Option<&Value> {
        map.iter()
            .find(|(k, _)| match k {
                Value::Integer(i) => i128::from(*i) == i128::from(key),
                _ => false,
            })
            .map(|(_, v)| v)
    };

    let recipient = match get(keys::RECIPIENT) {
        Some(Value::Bytes(b)) if b.len() == 32 => {
            let mut arr = [0u8; 32];
            arr.copy_from_slice(b);
            PartyId(arr)
        }
        _ => return Err(CoreError::MalformedRequest("invalid recipient".into())),
    };

    let amount = match get(keys::AMOUNT) {
        Some(Value::Integer(i)) => u64::try_from(*i)
            .map(Amount)
            .map_err(|_| CoreError::MalformedRequest("amount out of range".into()))?,
        _ => return Err(CoreError::MalformedRequest("missing amount".into())),
    };

    let is_pending = match get(keys::IS_PENDING) {
        Some(Value::Bool(b)) => *b,
        _ => return Err(CoreError::MalformedRequest("missing is_pending".into())),
    };

    let request = PayoutRequest {
        recipient,
        amount,
        is_pending,
    };

    if canonical_request_bytes(&request).as_ref() != bytes {
        return Err(CoreError::MalformedRequest("non-canonical encoding".into()));
    }

    Ok(request)
}
