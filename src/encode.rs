//! Length/type-tagged literal encoding used for list payloads on the wire.
//!
//! Scalars carry a one-byte tag (`i` int, `f` float, `b` bool, `s` string,
//! `n` none); composites nest between `l`/`d` and a closing `e`. The decoder
//! additionally accepts the historical `I` (long), `u` (unicode string) and
//! `t` (tuple) tags so payloads produced by older writers keep parsing.

use std::collections::BTreeMap;

use crate::domain::Value;
use crate::error::RequestError;

pub fn encode(value: &Value) -> String {
    let mut out = String::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &Value, out: &mut String) {
    match value {
        Value::None => out.push('n'),
        Value::Bool(true) => out.push_str("b1"),
        Value::Bool(false) => out.push_str("b0"),
        Value::Int(number) => {
            out.push('i');
            out.push_str(&number.to_string());
            out.push('e');
        }
        Value::Float(number) => {
            out.push('f');
            out.push_str(&number.to_string());
            out.push('e');
        }
        Value::Text(text) => encode_text(text, out),
        Value::List(items) => {
            out.push('l');
            for item in items {
                encode_into(item, out);
            }
            out.push('e');
        }
        Value::Map(map) => {
            out.push('d');
            for (key, item) in map {
                encode_text(key, out);
                encode_into(item, out);
            }
            out.push('e');
        }
    }
}

fn encode_text(text: &str, out: &mut String) {
    out.push('s');
    out.push_str(&text.len().to_string());
    out.push(':');
    out.push_str(text);
}

pub fn decode(input: &str) -> Result<Value, RequestError> {
    let (value, _) = decode_at(input, 0)?;
    Ok(value)
}

fn decode_at(input: &str, pos: usize) -> Result<(Value, usize), RequestError> {
    let bytes = input.as_bytes();
    let tag = *bytes.get(pos).ok_or_else(|| truncated(pos))?;
    match tag {
        b'n' => Ok((Value::None, pos + 1)),
        b'b' => {
            let flag = *bytes.get(pos + 1).ok_or_else(|| truncated(pos + 1))?;
            match flag {
                b'0' => Ok((Value::Bool(false), pos + 2)),
                b'1' => Ok((Value::Bool(true), pos + 2)),
                other => Err(unexpected(other, pos + 1)),
            }
        }
        b'i' | b'I' => {
            let (body, next) = read_until_end(input, pos + 1)?;
            let number = body
                .parse::<i64>()
                .map_err(|_| RequestError::MalformedPayload(format!("invalid integer: {body}")))?;
            Ok((Value::Int(number), next))
        }
        b'f' => {
            let (body, next) = read_until_end(input, pos + 1)?;
            let number = body
                .parse::<f64>()
                .map_err(|_| RequestError::MalformedPayload(format!("invalid float: {body}")))?;
            Ok((Value::Float(number), next))
        }
        b's' | b'u' => {
            let (text, next) = read_text(input, pos + 1)?;
            Ok((Value::Text(text), next))
        }
        b'l' | b't' => {
            let mut items = Vec::new();
            let mut cursor = pos + 1;
            loop {
                if *bytes.get(cursor).ok_or_else(|| truncated(cursor))? == b'e' {
                    return Ok((Value::List(items), cursor + 1));
                }
                let (item, next) = decode_at(input, cursor)?;
                items.push(item);
                cursor = next;
            }
        }
        b'd' => {
            let mut map = BTreeMap::new();
            let mut cursor = pos + 1;
            loop {
                if *bytes.get(cursor).ok_or_else(|| truncated(cursor))? == b'e' {
                    return Ok((Value::Map(map), cursor + 1));
                }
                let (key, next) = decode_at(input, cursor)?;
                let Value::Text(key) = key else {
                    return Err(RequestError::MalformedPayload(format!(
                        "map key at offset {cursor} is not a string"
                    )));
                };
                let (item, next) = decode_at(input, next)?;
                map.insert(key, item);
                cursor = next;
            }
        }
        other => Err(unexpected(other, pos)),
    }
}

fn read_until_end(input: &str, pos: usize) -> Result<(&str, usize), RequestError> {
    let end = input[pos..]
        .find('e')
        .map(|offset| pos + offset)
        .ok_or_else(|| truncated(pos))?;
    Ok((&input[pos..end], end + 1))
}

fn read_text(input: &str, pos: usize) -> Result<(String, usize), RequestError> {
    let colon = input[pos..]
        .find(':')
        .map(|offset| pos + offset)
        .ok_or_else(|| truncated(pos))?;
    let length = input[pos..colon]
        .parse::<usize>()
        .map_err(|_| RequestError::MalformedPayload(format!("invalid string length at offset {pos}")))?;
    let start = colon + 1;
    let end = start
        .checked_add(length)
        .ok_or_else(|| truncated(start))?;
    let text = input
        .get(start..end)
        .ok_or_else(|| truncated(start))?;
    Ok((text.to_string(), end))
}

fn truncated(pos: usize) -> RequestError {
    RequestError::MalformedPayload(format!("payload truncated at offset {pos}"))
}

fn unexpected(byte: u8, pos: usize) -> RequestError {
    RequestError::MalformedPayload(format!(
        "unexpected tag {:?} at offset {pos}",
        byte as char
    ))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn text(value: &str) -> Value {
        Value::Text(value.to_string())
    }

    #[test]
    fn scalar_round_trips() {
        for value in [
            Value::None,
            Value::Bool(true),
            Value::Bool(false),
            Value::Int(0),
            Value::Int(-17),
            Value::Float(2.5),
            text(""),
            text("hello"),
        ] {
            assert_eq!(decode(&encode(&value)).unwrap(), value);
        }
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encode(&Value::Int(42)), "i42e");
        assert_eq!(encode(&text("abc")), "s3:abc");
        assert_eq!(encode(&Value::Bool(true)), "b1");
        assert_eq!(encode(&Value::None), "n");
        assert_eq!(
            encode(&Value::List(vec![Value::Int(1), text("x")])),
            "li1es1:xe"
        );
    }

    #[test]
    fn record_list_round_trips() {
        let mut fields = BTreeMap::new();
        fields.insert("LFN".to_string(), text("/grid/data/file.raw"));
        fields.insert("Attempt".to_string(), Value::Int(1));
        fields.insert("Status".to_string(), text("Waiting"));
        let value = Value::List(vec![Value::Map(fields)]);
        assert_eq!(decode(&encode(&value)).unwrap(), value);
    }

    #[test]
    fn legacy_tags_decode() {
        assert_eq!(decode("I123e").unwrap(), Value::Int(123));
        assert_eq!(decode("u3:abc").unwrap(), text("abc"));
        assert_eq!(
            decode("ti1ei2ee").unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn multibyte_text_length_is_bytes() {
        let value = text("héllo");
        let encoded = encode(&value);
        assert!(encoded.starts_with("s6:"));
        assert_eq!(decode(&encoded).unwrap(), value);
    }

    #[test]
    fn malformed_payloads_fail() {
        assert_matches!(decode("i12"), Err(RequestError::MalformedPayload(_)));
        assert_matches!(decode("s9:abc"), Err(RequestError::MalformedPayload(_)));
        assert_matches!(decode("x"), Err(RequestError::MalformedPayload(_)));
        assert_matches!(decode("li1e"), Err(RequestError::MalformedPayload(_)));
        assert_matches!(decode("di1ei2ee"), Err(RequestError::MalformedPayload(_)));
    }
}
