//! Key normalization
//!
//! Tag tokens arrive in several spellings of the same logical tag: raw,
//! HTML-entity escaped, case variants, sometimes with a stray leading
//! backslash. This module computes the candidate lookup keys for a token and
//! the index keys a freshly fetched record is stored under.

/// Drop a single leading backslash, if present.
pub fn strip_leading_backslash(token: &str) -> &str {
    token.strip_prefix('\\').unwrap_or(token)
}

/// Replace apostrophes with their named entity, leaving everything else as is.
pub fn escape_apostrophe(input: &str) -> String {
    input.replace('\'', "&#039;")
}

/// HTML-escape the five special characters, mapping the apostrophe to
/// `&#039;`.
pub fn html_escape(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Decode HTML entities: the named forms seen in tag dumps plus decimal and
/// hex numeric references. Unrecognized entities are left untouched.
pub fn html_unescape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match tail[1..].find(';') {
            Some(semi) => {
                let entity = &tail[1..semi + 1];
                if let Some(decoded) = decode_entity(entity) {
                    out.push(decoded);
                    rest = &tail[semi + 2..];
                } else {
                    out.push('&');
                    rest = &tail[1..];
                }
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let digits = entity.strip_prefix('#')?;
            let code = if let Some(hex) = digits.strip_prefix(['x', 'X']) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                digits.parse::<u32>().ok()?
            };
            char::from_u32(code)
        }
    }
}

/// The five candidate index keys computed for one raw token.
#[derive(Debug, Clone)]
pub struct LookupKeys {
    /// Apostrophes mapped to `&#039;`
    pub escaped: String,
    /// Lowercased
    pub lower: String,
    /// Uppercased
    pub upper: String,
    /// Token as given (minus a leading backslash)
    pub raw: String,
    /// HTML-unescaped, apostrophes mapped back to `&#039;`
    pub unescaped: String,
}

impl LookupKeys {
    pub fn for_token(token: &str) -> Self {
        let raw = strip_leading_backslash(token);
        LookupKeys {
            escaped: escape_apostrophe(raw),
            lower: raw.to_lowercase(),
            upper: raw.to_uppercase(),
            raw: raw.to_string(),
            unescaped: escape_apostrophe(&html_unescape(raw)),
        }
    }

    /// Probe order for index lookups, first hit wins.
    ///
    /// The order is load-bearing: when more than one variant is cached with
    /// diverging entries, a different order selects a different record.
    pub fn probe_order(&self) -> [&str; 5] {
        [
            &self.escaped,
            &self.lower,
            &self.upper,
            &self.raw,
            &self.unescaped,
        ]
    }
}

/// The three keys a fetched record is indexed under: the source-declared
/// name, its HTML-escaped form, and its lowercase form.
pub fn index_keys(name: &str) -> [String; 3] {
    [name.to_string(), html_escape(name), name.to_lowercase()]
}
