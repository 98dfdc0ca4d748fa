use crate::domain::Record;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )` is escaped.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Like [`COMPONENT`] but leaves reserved URI delimiters intact.
const URI: &AsciiSet = &COMPONENT
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'#');

pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

pub fn encode_uri(value: &str) -> String {
    utf8_percent_encode(value, URI).to_string()
}

/// Serializes a record as `key=value` pairs joined by `&`.
///
/// `_app` is escaped with the lenient URI rule, every other value with the
/// component rule. Consumers must not depend on pair order.
pub fn encode_query(record: &Record) -> String {
    let mut pairs: Vec<String> = Vec::with_capacity(8);
    pairs.push(format!("_ack={}", encode_component(record.kind().code())));

    for (key, value) in record.fields() {
        pairs.push(format!("{key}={}", encode_component(&value.to_string())));
    }

    if let Some(stamp) = record.stamp() {
        pairs.push(format!("_app={}", encode_uri(&stamp.app)));
        pairs.push(format!("_time={}", stamp.time_ms));
        if let Some(nickname) = &stamp.nickname {
            pairs.push(format!("_nick={}", encode_component(nickname)));
        }
    }

    pairs.join("&")
}
