use std::collections::BTreeMap;

use bytes::Bytes;

use super::*;

#[test]
fn test_decode_byte_string() {
    assert_eq!(
        decode(b"5:hello").unwrap(),
        Value::Bytes(Bytes::from_static(b"hello"))
    );
    assert_eq!(decode(b"0:").unwrap(), Value::Bytes(Bytes::from_static(b"")));
}

#[test]
fn test_decode_integer() {
    assert_eq!(decode(b"i52e").unwrap(), Value::Integer(52));
    assert_eq!(decode(b"i-52e").unwrap(), Value::Integer(-52));
    assert_eq!(decode(b"i0e").unwrap(), Value::Integer(0));
}

#[test]
fn test_decode_integer_rejects_bad_grammar() {
    assert!(matches!(decode(b"i-0e"), Err(BencodeError::BadInteger(_))));
    assert!(matches!(decode(b"i03e"), Err(BencodeError::BadInteger(_))));
    assert!(matches!(decode(b"ie"), Err(BencodeError::BadInteger(_))));
    assert!(matches!(decode(b"i-e"), Err(BencodeError::BadInteger(_))));
}

#[test]
fn test_decode_integer_rejects_overflow() {
    // One past i64::MAX.
    assert!(matches!(
        decode(b"i9223372036854775808e"),
        Err(BencodeError::BadInteger(_))
    ));
    assert_eq!(
        decode(b"i9223372036854775807e").unwrap(),
        Value::Integer(i64::MAX)
    );
}

#[test]
fn test_decode_list() {
    let value = decode(b"l5:helloi52ee").unwrap();
    assert_eq!(
        value,
        Value::List(vec![Value::string("hello"), Value::Integer(52)])
    );
}

#[test]
fn test_decode_dict() {
    let value = decode(b"d3:foo3:bar5:helloi52ee").unwrap();
    let dict = value.as_dict().unwrap();
    assert_eq!(dict.len(), 2);
    assert_eq!(value.get(b"foo").and_then(|v| v.as_str()), Some("bar"));
    assert_eq!(value.get(b"hello").and_then(|v| v.as_integer()), Some(52));
}

#[test]
fn test_decode_dict_rejects_non_string_key() {
    assert!(matches!(
        decode(b"di1e3:fooe"),
        Err(BencodeError::Malformed(_))
    ));
}

#[test]
fn test_decode_truncated() {
    assert!(matches!(decode(b"i42"), Err(BencodeError::UnexpectedEnd)));
    assert!(matches!(decode(b"5:hel"), Err(BencodeError::UnexpectedEnd)));
    assert!(matches!(decode(b"l5:hello"), Err(BencodeError::UnexpectedEnd)));
    assert!(matches!(decode(b"d3:foo"), Err(BencodeError::UnexpectedEnd)));
}

#[test]
fn test_decode_trailing_data() {
    assert!(matches!(decode(b"i42eextra"), Err(BencodeError::TrailingData)));
}

#[test]
fn test_decode_nesting_cap() {
    let mut deep = vec![b'l'; 100];
    deep.extend(vec![b'e'; 100]);
    assert!(matches!(decode(&deep), Err(BencodeError::NestingTooDeep)));
}

#[test]
fn test_decode_prefix_reports_consumed() {
    let (value, consumed) = decode_prefix(b"i42e5:hello").unwrap();
    assert_eq!(value, Value::Integer(42));
    assert_eq!(consumed, 4);

    let (value, consumed) = decode_prefix(b"5:helloi42e").unwrap();
    assert_eq!(value, Value::string("hello"));
    assert_eq!(consumed, 7);
}

#[test]
fn test_encode_sorts_dict_keys() {
    let mut dict = BTreeMap::new();
    dict.insert(Bytes::from_static(b"b"), Value::Integer(1));
    dict.insert(Bytes::from_static(b"a"), Value::Integer(2));
    assert_eq!(encode(&Value::Dict(dict)), b"d1:ai2e1:bi1ee");
}

#[test]
fn test_encode_raw_bytes() {
    // Piece digests are arbitrary bytes; they must survive untouched.
    let raw = Bytes::from_static(&[0x00, 0xff, 0x13, 0x37]);
    assert_eq!(encode(&Value::Bytes(raw)), b"4:\x00\xff\x13\x37");
}

#[test]
fn test_roundtrip() {
    let inputs: &[&[u8]] = &[
        b"i52e",
        b"5:hello",
        b"l5:helloi52ee",
        b"d3:foo3:bar5:helloi52ee",
        b"d8:announce15:http://test.com4:infod4:name4:test12:piece lengthi16384eee",
        b"d4:listl4:spami42eee",
    ];
    for input in inputs {
        let decoded = decode(input).unwrap();
        assert_eq!(&encode(&decoded), input);
    }
}
