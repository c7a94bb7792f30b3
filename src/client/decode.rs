use serde::de::DeserializeOwned;
use serde_json::Value;

/// Keys probed, in order, for a capability's text result.
pub(crate) const TEXT_KEYS: &[&str] = &["result", "response", "content", "text", "summary"];
pub(crate) const IMAGE_URL_KEYS: &[&str] = &["imageUrl", "url"];

/// Strips a `{success, data}` envelope.
///
/// `{success: false}` becomes `Err` with the backend's error message; payloads
/// without an envelope pass through unchanged.
pub(crate) fn unwrap_envelope(payload: Value) -> Result<Value, String> {
    let Value::Object(mut object) = payload else {
        return Ok(payload);
    };

    match object.get("success").and_then(Value::as_bool) {
        Some(false) => Err(object
            .get("error")
            .and_then(error_message)
            .unwrap_or_else(|| "request failed".to_string())),
        Some(true) => Ok(object.remove("data").unwrap_or(Value::Object(object))),
        None => Ok(Value::Object(object)),
    }
}

fn error_message(error: &Value) -> Option<String> {
    match error {
        Value::String(message) => Some(message.clone()),
        Value::Object(object) => object
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// First non-empty string found under `keys`, or the payload itself when it is a string.
pub(crate) fn text_field(data: &Value, keys: &[&str]) -> Option<String> {
    if let Value::String(text) = data {
        return Some(text.clone());
    }
    keys.iter()
        .filter_map(|key| data.get(*key))
        .find_map(|value| match value {
            Value::String(text) if !text.is_empty() => Some(text.clone()),
            _ => None,
        })
}

/// Deserializes `data`, or `data[key]` when present.
pub(crate) fn typed<T: DeserializeOwned>(data: Value, key: &str) -> Result<T, serde_json::Error> {
    match data {
        Value::Object(mut object) if object.contains_key(key) => {
            serde_json::from_value(object.remove(key).unwrap_or(Value::Null))
        }
        other => serde_json::from_value(other),
    }
}

/// Incremental UTF-8 decoder for streamed bodies.
///
/// A multi-byte sequence split across segments is held back until its
/// remaining bytes arrive. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(error) => {
                    let valid = error.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match error.error_len() {
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + invalid);
                        }
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// Flushes bytes still held back at end of stream.
    pub fn finish(&mut self) -> String {
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn envelope_success_yields_data() {
        assert_eq!(
            unwrap_envelope(json!({ "success": true, "data": { "result": "ok" } })),
            Ok(json!({ "result": "ok" }))
        );
        assert_eq!(
            unwrap_envelope(json!({ "result": "bare" })),
            Ok(json!({ "result": "bare" }))
        );
    }

    #[test]
    fn envelope_failure_yields_backend_message() {
        assert_eq!(
            unwrap_envelope(json!({ "success": false, "error": "quota exceeded" })),
            Err("quota exceeded".to_string())
        );
        assert_eq!(
            unwrap_envelope(json!({ "success": false, "error": { "message": "bad input" } })),
            Err("bad input".to_string())
        );
        assert_eq!(
            unwrap_envelope(json!({ "success": false })),
            Err("request failed".to_string())
        );
    }

    #[test]
    fn text_field_probes_keys_in_order() {
        assert_eq!(
            text_field(&json!({ "content": "c", "response": "r" }), TEXT_KEYS),
            Some("r".to_string())
        );
        assert_eq!(text_field(&json!("plain"), TEXT_KEYS), Some("plain".to_string()));
        assert_eq!(text_field(&json!({ "result": "" }), TEXT_KEYS), None);
    }

    #[test]
    fn typed_reads_nested_key_or_whole_value() {
        let nested: Vec<u32> = typed(json!({ "testCases": [1, 2] }), "testCases").expect("nested");
        assert_eq!(nested, vec![1, 2]);
        let whole: Vec<u32> = typed(json!([3]), "testCases").expect("whole");
        assert_eq!(whole, vec![3]);
    }

    #[test]
    fn split_multibyte_sequence_is_carried_across_segments() {
        let bytes = "héllo wörld".as_bytes();
        let mut decoder = Utf8ChunkDecoder::new();
        let mut out = String::new();
        for byte in bytes {
            out.push_str(&decoder.push(std::slice::from_ref(byte)));
        }
        out.push_str(&decoder.finish());
        assert_eq!(out, "héllo wörld");
    }

    #[test]
    fn invalid_bytes_decode_to_replacement_character() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.push(b"a\xffb"), "a\u{FFFD}b");
        assert_eq!(decoder.push(&[0xE2, 0x82]), "");
        assert_eq!(decoder.finish(), "\u{FFFD}");
    }
}
