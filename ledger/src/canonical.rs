//! Deterministic, fixed-field-order JSON encoding.
//!
//! `Transaction` and `Block` hashes and signatures must be computed over a
//! byte-identical encoding across every node in the cluster. Rather than
//! rely on serde's struct field order (fragile to refactors) or on a
//! non-cluster-internal format, each record's canonical bytes are built
//! here field-by-field in the pinned order documented in the data model.
//!
//! No inserted whitespace, minimal (RFC 8259) string escaping.

/// Appends a JSON string value (including the surrounding quotes) for `s`.
pub fn push_json_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// A tiny fixed-order object writer: each call to `field`/`field_raw`
/// appends `,"key":value` (the first call omits the leading comma), and
/// the caller wraps the result in braces.
pub struct ObjectWriter {
    buf: String,
    first: bool,
}

impl ObjectWriter {
    pub fn new() -> Self {
        let mut buf = String::new();
        buf.push('{');
        Self { buf, first: true }
    }

    fn comma(&mut self) {
        if !self.first {
            self.buf.push(',');
        }
        self.first = false;
    }

    /// Appends a string-valued field.
    pub fn field_str(&mut self, key: &str, value: &str) -> &mut Self {
        self.comma();
        push_json_string(&mut self.buf, key);
        self.buf.push(':');
        push_json_string(&mut self.buf, value);
        self
    }

    /// Appends an integer-valued field.
    pub fn field_u64(&mut self, key: &str, value: u64) -> &mut Self {
        self.comma();
        push_json_string(&mut self.buf, key);
        self.buf.push(':');
        self.buf.push_str(&value.to_string());
        self
    }

    /// Appends a field whose value is pre-rendered raw JSON (e.g. a nested
    /// object or array produced by another `ObjectWriter`).
    pub fn field_raw(&mut self, key: &str, raw_value: &str) -> &mut Self {
        self.comma();
        push_json_string(&mut self.buf, key);
        self.buf.push(':');
        self.buf.push_str(raw_value);
        self
    }

    /// Consumes the writer, returning the closed JSON object text.
    pub fn finish(mut self) -> String {
        self.buf.push('}');
        self.buf
    }
}

/// Encodes a list of already-rendered JSON values as a JSON array.
pub fn render_array<'a, I: IntoIterator<Item = &'a str>>(items: I) -> String {
    let mut out = String::from("[");
    let mut first = true;
    for item in items {
        if !first {
            out.push(',');
        }
        first = false;
        out.push_str(item);
    }
    out.push(']');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_writer_preserves_field_order() {
        let mut w = ObjectWriter::new();
        w.field_str("b", "2").field_str("a", "1");
        assert_eq!(w.finish(), r#"{"b":"2","a":"1"}"#);
    }

    #[test]
    fn string_escaping_handles_quotes_and_backslashes() {
        let mut s = String::new();
        push_json_string(&mut s, "a\"b\\c");
        assert_eq!(s, r#""a\"b\\c""#);
    }

    #[test]
    fn array_rendering_joins_with_commas() {
        let items = vec![r#"{"x":1}"#, r#"{"x":2}"#];
        assert_eq!(
            render_array(items.iter().map(|s| *s)),
            r#"[{"x":1},{"x":2}]"#
        );
    }
}
