use malachite::base::num::arithmetic::traits::{Pow, UnsignedAbs};
use malachite::base::num::conversion::traits::{FromStringBase, ToStringBase};
use malachite::{Integer, Natural};

use super::{AbiError, AbiResult, AbiType, AbiValue};
use crate::types::Address;

const WORD: usize = 32;
/// `Error(string)` selector used by Solidity `require`/`revert`.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
/// `Panic(uint256)` selector emitted on assertion failures and overflows.
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

fn two_pow(bits: usize) -> Natural {
    Natural::from(2u32).pow(bits as u64)
}

fn natural_to_word(value: &Natural) -> AbiResult<[u8; WORD]> {
    let digits = value.to_string_base(16);
    if digits.len() > WORD * 2 {
        return Err(AbiError::OutOfRange("uint256".to_string()));
    }
    let padded = format!("{digits:0>64}");
    let mut word = [0u8; WORD];
    hex::decode_to_slice(padded, &mut word).map_err(|_| AbiError::Truncated)?;
    Ok(word)
}

fn word_to_natural(word: &[u8]) -> Natural {
    Natural::from_string_base(16, &hex::encode(word)).unwrap_or_else(|| Natural::from(0u32))
}

fn read_word(data: &[u8], position: usize) -> AbiResult<&[u8]> {
    data.get(position..position + WORD).ok_or(AbiError::Truncated)
}

fn read_usize(data: &[u8], position: usize) -> AbiResult<usize> {
    let word = read_word(data, position)?;
    // offsets and lengths never need more than 8 bytes
    if word[..WORD - 8].iter().any(|byte| *byte != 0) {
        return Err(AbiError::Truncated);
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(tail)).map_err(|_| AbiError::Truncated)
}

fn usize_word(value: usize) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&(value as u64).to_be_bytes());
    word
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(WORD) * WORD
}

fn mismatch(kind: &AbiType) -> AbiError {
    AbiError::TypeMismatch {
        expected: kind.to_string(),
    }
}

/// Encodes `values` as a tuple of `types`.
pub fn encode_values(types: &[AbiType], values: &[AbiValue]) -> AbiResult<Vec<u8>> {
    if types.len() != values.len() {
        return Err(AbiError::TypeMismatch {
            expected: AbiType::Tuple(
                types
                    .iter()
                    .map(|kind| super::AbiParam {
                        name: String::new(),
                        kind: kind.clone(),
                        indexed: false,
                    })
                    .collect(),
            )
            .to_string(),
        });
    }

    let head_len: usize = types.iter().map(AbiType::head_size).sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();
    for (kind, value) in types.iter().zip(values) {
        if kind.is_dynamic() {
            head.extend_from_slice(&usize_word(head_len + tail.len()));
            tail.extend(encode_single(kind, value)?);
        } else {
            head.extend(encode_single(kind, value)?);
        }
    }
    head.extend(tail);
    Ok(head)
}

fn encode_single(kind: &AbiType, value: &AbiValue) -> AbiResult<Vec<u8>> {
    match (kind, value) {
        (AbiType::Uint(bits), AbiValue::Uint(value)) => {
            if *value >= two_pow(*bits) {
                return Err(AbiError::OutOfRange(kind.to_string()));
            }
            Ok(natural_to_word(value)?.to_vec())
        }
        (AbiType::Int(bits), AbiValue::Int(value)) => {
            let bound = Integer::from(two_pow(bits - 1));
            if *value >= bound || *value < -bound {
                return Err(AbiError::OutOfRange(kind.to_string()));
            }
            let twos = if *value < 0 {
                (Integer::from(two_pow(256)) + value).unsigned_abs()
            } else {
                value.unsigned_abs_ref().clone()
            };
            Ok(natural_to_word(&twos)?.to_vec())
        }
        (AbiType::Bool, AbiValue::Bool(flag)) => Ok(usize_word(usize::from(*flag)).to_vec()),
        (AbiType::Address, AbiValue::Address(address)) => {
            let mut word = [0u8; WORD];
            word[12..].copy_from_slice(address.as_bytes());
            Ok(word.to_vec())
        }
        (AbiType::FixedBytes(size), AbiValue::FixedBytes(bytes)) => {
            if bytes.len() != *size {
                return Err(mismatch(kind));
            }
            let mut word = [0u8; WORD];
            word[..bytes.len()].copy_from_slice(bytes);
            Ok(word.to_vec())
        }
        (AbiType::Bytes, AbiValue::Bytes(bytes)) => Ok(encode_packed_bytes(bytes)),
        (AbiType::String, AbiValue::String(text)) => Ok(encode_packed_bytes(text.as_bytes())),
        (AbiType::Array(element), AbiValue::Array(items)) => {
            let types = vec![(**element).clone(); items.len()];
            let mut out = usize_word(items.len()).to_vec();
            out.extend(encode_values(&types, items)?);
            Ok(out)
        }
        (AbiType::FixedArray(element, size), AbiValue::Array(items)) => {
            if items.len() != *size {
                return Err(mismatch(kind));
            }
            let types = vec![(**element).clone(); items.len()];
            encode_values(&types, items)
        }
        (AbiType::Tuple(params), AbiValue::Tuple(items)) => {
            let types: Vec<AbiType> = params.iter().map(|param| param.kind.clone()).collect();
            encode_values(&types, items)
        }
        _ => Err(mismatch(kind)),
    }
}

fn encode_packed_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut out = usize_word(bytes.len()).to_vec();
    out.extend_from_slice(bytes);
    out.resize(WORD + padded_len(bytes.len()), 0);
    out
}

/// Decodes `data` as a tuple of `types`.
pub fn decode_values(types: &[AbiType], data: &[u8]) -> AbiResult<Vec<AbiValue>> {
    let mut values = Vec::with_capacity(types.len());
    let mut position = 0;
    for kind in types {
        let value = if kind.is_dynamic() {
            let offset = read_usize(data, position)?;
            let section = data.get(offset..).ok_or(AbiError::Truncated)?;
            decode_single(kind, section)?
        } else {
            decode_single(kind, data.get(position..).ok_or(AbiError::Truncated)?)?
        };
        values.push(value);
        position += kind.head_size();
    }
    Ok(values)
}

fn decode_single(kind: &AbiType, data: &[u8]) -> AbiResult<AbiValue> {
    match kind {
        AbiType::Uint(bits) => {
            let value = word_to_natural(read_word(data, 0)?);
            if value >= two_pow(*bits) {
                return Err(AbiError::OutOfRange(kind.to_string()));
            }
            Ok(AbiValue::Uint(value))
        }
        AbiType::Int(bits) => {
            let raw = word_to_natural(read_word(data, 0)?);
            let value = if raw >= two_pow(255) {
                Integer::from(raw) - Integer::from(two_pow(256))
            } else {
                Integer::from(raw)
            };
            let bound = Integer::from(two_pow(bits - 1));
            if value >= bound || value < -bound {
                return Err(AbiError::OutOfRange(kind.to_string()));
            }
            Ok(AbiValue::Int(value))
        }
        AbiType::Bool => match read_usize(data, 0)? {
            0 => Ok(AbiValue::Bool(false)),
            1 => Ok(AbiValue::Bool(true)),
            _ => Err(mismatch(kind)),
        },
        AbiType::Address => {
            let word = read_word(data, 0)?;
            if word[..12].iter().any(|byte| *byte != 0) {
                return Err(mismatch(kind));
            }
            let mut bytes = [0u8; 20];
            bytes.copy_from_slice(&word[12..]);
            Ok(AbiValue::Address(Address::new(bytes)))
        }
        AbiType::FixedBytes(size) => {
            let word = read_word(data, 0)?;
            Ok(AbiValue::FixedBytes(word[..*size].to_vec()))
        }
        AbiType::Bytes => decode_packed_bytes(data).map(AbiValue::Bytes),
        AbiType::String => {
            let bytes = decode_packed_bytes(data)?;
            String::from_utf8(bytes)
                .map(AbiValue::String)
                .map_err(|_| AbiError::InvalidUtf8)
        }
        AbiType::Array(element) => {
            let len = read_usize(data, 0)?;
            let body = data.get(WORD..).ok_or(AbiError::Truncated)?;
            // every element occupies at least one head word
            if len > body.len() / WORD {
                return Err(AbiError::Truncated);
            }
            let types = vec![(**element).clone(); len];
            decode_values(&types, body).map(AbiValue::Array)
        }
        AbiType::FixedArray(element, size) => {
            let types = vec![(**element).clone(); *size];
            decode_values(&types, data).map(AbiValue::Array)
        }
        AbiType::Tuple(params) => {
            let types: Vec<AbiType> = params.iter().map(|param| param.kind.clone()).collect();
            decode_values(&types, data).map(AbiValue::Tuple)
        }
    }
}

fn decode_packed_bytes(data: &[u8]) -> AbiResult<Vec<u8>> {
    let len = read_usize(data, 0)?;
    let end = WORD.checked_add(len).ok_or(AbiError::Truncated)?;
    data.get(WORD..end)
        .map(<[u8]>::to_vec)
        .ok_or(AbiError::Truncated)
}

/// Packs a short string into a zero-padded `bytes32` value.
pub fn encode_bytes32_string(text: &str) -> AbiResult<[u8; WORD]> {
    let bytes = text.as_bytes();
    if bytes.len() > WORD - 1 {
        return Err(AbiError::StringTooLong(text.to_string()));
    }
    let mut word = [0u8; WORD];
    word[..bytes.len()].copy_from_slice(bytes);
    Ok(word)
}

/// Reads a `bytes32` string, dropping the trailing zero padding.
pub fn decode_bytes32_string(bytes: &[u8]) -> AbiResult<String> {
    let end = bytes
        .iter()
        .rposition(|byte| *byte != 0)
        .map(|last| last + 1)
        .unwrap_or(0);
    String::from_utf8(bytes[..end].to_vec()).map_err(|_| AbiError::InvalidUtf8)
}

/// Extracts a human-readable reason from revert data.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let (selector, payload) = (data.get(..4)?, data.get(4..)?);
    if selector == ERROR_STRING_SELECTOR {
        let values = decode_values(&[AbiType::String], payload).ok()?;
        return values.into_iter().next().and_then(|value| match value {
            AbiValue::String(reason) => Some(reason),
            _ => None,
        });
    }
    if selector == PANIC_SELECTOR {
        let values = decode_values(&[AbiType::Uint(256)], payload).ok()?;
        let code = values.first()?.as_uint()?.to_string_base(16);
        return Some(format!("panic code 0x{code}"));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::AbiParam;

    fn proposal_tuple() -> AbiType {
        AbiType::Tuple(vec![
            AbiParam {
                name: "name".into(),
                kind: AbiType::FixedBytes(32),
                indexed: false,
            },
            AbiParam {
                name: "voteCount".into(),
                kind: AbiType::Uint(256),
                indexed: false,
            },
        ])
    }

    #[test]
    fn dynamic_array_of_static_tuples_layout() {
        let kind = AbiType::Array(Box::new(proposal_tuple()));
        let name = encode_bytes32_string("A").expect("name");
        let value = AbiValue::Array(vec![AbiValue::Tuple(vec![
            AbiValue::FixedBytes(name.to_vec()),
            AbiValue::uint(7),
        ])]);
        let encoded = encode_values(&[kind.clone()], &[value.clone()]).expect("encode");
        // offset, length, one tuple of two words
        assert_eq!(encoded.len(), 4 * WORD);
        assert_eq!(read_usize(&encoded, 0).expect("offset"), 32);
        assert_eq!(read_usize(&encoded, 32).expect("len"), 1);
        assert_eq!(encoded[64], b'A');
        assert_eq!(read_usize(&encoded, 96).expect("count"), 7);
        assert_eq!(decode_values(&[kind], &encoded).expect("decode"), vec![value]);
    }

    #[test]
    fn strings_are_padded_to_words() {
        let encoded =
            encode_values(&[AbiType::String], &[AbiValue::String("hello".into())]).expect("enc");
        assert_eq!(encoded.len(), 3 * WORD);
        assert_eq!(&encoded[64..69], b"hello");
        assert!(encoded[69..].iter().all(|byte| *byte == 0));
    }

    #[test]
    fn signed_integers_use_twos_complement() {
        let encoded =
            encode_values(&[AbiType::Int(256)], &[AbiValue::Int(Integer::from(-1))]).expect("enc");
        assert!(encoded.iter().all(|byte| *byte == 0xff));
        assert_eq!(
            decode_values(&[AbiType::Int(256)], &encoded).expect("dec"),
            vec![AbiValue::Int(Integer::from(-1))]
        );
        assert!(encode_values(&[AbiType::Int(8)], &[AbiValue::Int(Integer::from(128))]).is_err());
        assert!(encode_values(&[AbiType::Uint(8)], &[AbiValue::uint(256)]).is_err());
    }

    #[test]
    fn truncated_data_is_an_error() {
        let kind = AbiType::Array(Box::new(proposal_tuple()));
        assert_eq!(decode_values(&[kind], &[0u8; 16]), Err(AbiError::Truncated));
        let mut huge_len = usize_word(32).to_vec();
        huge_len.extend_from_slice(&usize_word(1_000_000));
        assert_eq!(
            decode_values(&[AbiType::Array(Box::new(AbiType::Uint(256)))], &huge_len),
            Err(AbiError::Truncated)
        );
    }

    #[test]
    fn oversized_string_length_is_an_error() {
        let mut data = usize_word(32).to_vec();
        data.extend_from_slice(&usize_word(usize::MAX));
        assert_eq!(decode_values(&[AbiType::String], &data), Err(AbiError::Truncated));
    }

    #[test]
    fn bytes32_strings_drop_trailing_zeros() {
        let word = encode_bytes32_string("Lower Transaction Fees").expect("encode");
        assert_eq!(
            decode_bytes32_string(&word).expect("decode"),
            "Lower Transaction Fees"
        );
        assert_eq!(decode_bytes32_string(&[0u8; 32]).expect("empty"), "");
        assert!(encode_bytes32_string(&"x".repeat(32)).is_err());
        assert!(decode_bytes32_string(&[0xff; 32]).is_err());
    }

    #[test]
    fn revert_reasons_decode() {
        let mut data = ERROR_STRING_SELECTOR.to_vec();
        data.extend(
            encode_values(&[AbiType::String], &[AbiValue::String("Already voted.".into())])
                .expect("enc"),
        );
        assert_eq!(decode_revert_reason(&data).as_deref(), Some("Already voted."));

        let mut panic = PANIC_SELECTOR.to_vec();
        panic.extend(encode_values(&[AbiType::Uint(256)], &[AbiValue::uint(0x32)]).expect("enc"));
        assert_eq!(decode_revert_reason(&panic).as_deref(), Some("panic code 0x32"));

        assert_eq!(decode_revert_reason(&[1, 2, 3]), None);
    }
}
