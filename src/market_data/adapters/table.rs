// Row extraction shared by the static and dynamic HTML fetchers.

use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};

use crate::error::{FetchError, SourceResult};
use crate::market_data::header::{label, HeaderMap};
use crate::market_data::types::{CanonicalRecord, Column};

const CELL: &str = "td";
const COIN_LINK: &str = "a[href*='/coins/']";

/// Where a listing keeps its header cells, data rows and ticker text.
#[derive(Debug, Clone, Copy)]
pub struct TableLayout {
    pub header_cells: &'static str,
    pub rows: &'static str,
    /// Tried in order inside the coin cell.
    pub symbol: &'static [&'static str],
}

fn selector(css: &str) -> SourceResult<Selector> {
    Selector::parse(css).map_err(|_| FetchError::Selector(css.to_string()))
}

/// Trimmed text fragments joined by single spaces.
fn text_of(el: ElementRef<'_>) -> String {
    el.text().map(str::trim).filter(|t| !t.is_empty()).join(" ")
}

// (column, header label) for every plain text column
const TEXT_COLUMNS: [(Column, &str); 10] = [
    (Column::Rank, label::RANK),
    (Column::Price, label::PRICE),
    (Column::Change1h, label::CHANGE_1H),
    (Column::Change24h, label::CHANGE_24H),
    (Column::Change7d, label::CHANGE_7D),
    (Column::Change30d, label::CHANGE_30D),
    (Column::Volume24h, label::VOLUME_24H),
    (Column::CirculatingSupply, label::CIRCULATING_SUPPLY),
    (Column::TotalSupply, label::TOTAL_SUPPLY),
    (Column::MarketCap, label::MARKET_CAP),
];

impl TableLayout {
    pub fn read_headers(&self, html: &str) -> SourceResult<HeaderMap> {
        let doc = Html::parse_document(html);
        let th = selector(self.header_cells)?;
        Ok(HeaderMap::resolve(doc.select(&th).map(text_of)))
    }

    /// Every data row in the document, mapped through `headers`.
    pub fn extract(&self, html: &str, headers: &HeaderMap) -> SourceResult<Vec<CanonicalRecord>> {
        let doc = Html::parse_document(html);
        let row_sel = selector(self.rows)?;
        let cell_sel = selector(CELL)?;
        let link_sel = selector(COIN_LINK)?;
        let symbol_sels = self
            .symbol
            .iter()
            .map(|css| selector(css))
            .collect::<SourceResult<Vec<_>>>()?;

        let mut out = Vec::new();
        for row in doc.select(&row_sel) {
            let cells: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();
            if cells.is_empty() {
                continue;
            }
            let texts: Vec<String> = cells.iter().copied().map(text_of).collect();

            let mut record = CanonicalRecord::from_pairs(
                TEXT_COLUMNS
                    .iter()
                    .map(|(col, lab)| (*col, headers.cell(&texts, lab).to_string())),
            );

            if let Some(coin) = headers.get(label::COIN).and_then(|i| cells.get(i)) {
                record.name = match coin.select(&link_sel).next() {
                    Some(link) => text_of(link),
                    None => text_of(*coin),
                };
                record.symbol = symbol_sels
                    .iter()
                    .find_map(|sel| coin.select(sel).next())
                    .map(|el| text_of(el).to_uppercase())
                    .unwrap_or_default();
            }
            out.push(record);
        }
        Ok(out)
    }
}
