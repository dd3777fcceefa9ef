// Free-text table headers -> canonical labels -> column positions.

use std::collections::HashMap;

use itertools::Itertools;

/// Canonical labels produced by [`normalize_header`].
pub mod label {
    pub const RANK: &str = "#";
    pub const COIN: &str = "coin";
    pub const PRICE: &str = "price";
    pub const CHANGE_1H: &str = "1h";
    pub const CHANGE_24H: &str = "24h";
    pub const CHANGE_7D: &str = "7d";
    pub const CHANGE_30D: &str = "30d";
    pub const VOLUME_24H: &str = "24h volume";
    pub const CIRCULATING_SUPPLY: &str = "circulating supply";
    pub const TOTAL_SUPPLY: &str = "total supply";
    pub const MARKET_CAP: &str = "market cap";
}

// Applied in order, after whitespace collapsing and lowercasing.
const SYNONYMS: [(&str, &str); 5] = [
    ("volume (24h)", label::VOLUME_24H),
    ("vol (24h)", label::VOLUME_24H),
    ("marketcap", label::MARKET_CAP),
    ("market capitalization", label::MARKET_CAP),
    ("coin name", label::COIN),
];

pub fn normalize_header(raw: &str) -> String {
    let mut text = raw.split_whitespace().join(" ").to_lowercase();
    for (from, to) in SYNONYMS {
        if text.contains(from) {
            text = text.replace(from, to);
        }
    }
    // catch-all for "Trading Volume 24h", "24h Vol." and friends
    if text.contains("24h") && text.contains("vol") {
        text = label::VOLUME_24H.to_string();
    }
    text
}

/// Label -> zero-based column index for one table snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    positions: HashMap<String, usize>,
}

impl HeaderMap {
    /// Build the map from every header cell's text. Blank headers are
    /// skipped; when two headers normalise to the same label the later
    /// position wins.
    pub fn resolve<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut positions = HashMap::new();
        for (idx, raw) in headers.into_iter().enumerate() {
            let label = normalize_header(raw.as_ref());
            if !label.is_empty() {
                positions.insert(label, idx);
            }
        }
        Self { positions }
    }

    pub fn get(&self, label: &str) -> Option<usize> {
        self.positions.get(label).copied()
    }

    /// Text of the cell holding `label`, or "" when the label never
    /// resolved or the row is shorter than the header.
    pub fn cell<'c, S: AsRef<str>>(&self, cells: &'c [S], label: &str) -> &'c str {
        self.get(label)
            .and_then(|idx| cells.get(idx))
            .map_or("", |s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
