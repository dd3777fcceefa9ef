use std::fmt;

use crate::error::FetchError;

/// The twelve output columns, in the order every table is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Rank,
    Name,
    Symbol,
    Price,
    Change1h,
    Change24h,
    Change7d,
    Change30d,
    Volume24h,
    CirculatingSupply,
    TotalSupply,
    MarketCap,
}

pub const CANONICAL_COLUMNS: [Column; 12] = [
    Column::Rank,
    Column::Name,
    Column::Symbol,
    Column::Price,
    Column::Change1h,
    Column::Change24h,
    Column::Change7d,
    Column::Change30d,
    Column::Volume24h,
    Column::CirculatingSupply,
    Column::TotalSupply,
    Column::MarketCap,
];

impl Column {
    /// Name written in the header row of the outbound table.
    pub fn name(self) -> &'static str {
        match self {
            Column::Rank => "Rank",
            Column::Name => "Name",
            Column::Symbol => "Symbol",
            Column::Price => "Price",
            Column::Change1h => "Change_1h",
            Column::Change24h => "Change_24h",
            Column::Change7d => "Change_7d",
            Column::Change30d => "Change_30d",
            Column::Volume24h => "Volume_24h",
            Column::CirculatingSupply => "Circulating_Supply",
            Column::TotalSupply => "Total_Supply",
            Column::MarketCap => "Market_Cap",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of market data. Numeric fields hold display strings; empty = unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalRecord {
    pub rank: String,
    pub name: String,
    pub symbol: String,
    pub price: String,
    pub change_1h: String,
    pub change_24h: String,
    pub change_7d: String,
    pub change_30d: String,
    pub volume_24h: String,
    pub circulating_supply: String,
    pub total_supply: String,
    pub market_cap: String,
}

impl CanonicalRecord {
    pub fn get(&self, column: Column) -> &str {
        match column {
            Column::Rank => &self.rank,
            Column::Name => &self.name,
            Column::Symbol => &self.symbol,
            Column::Price => &self.price,
            Column::Change1h => &self.change_1h,
            Column::Change24h => &self.change_24h,
            Column::Change7d => &self.change_7d,
            Column::Change30d => &self.change_30d,
            Column::Volume24h => &self.volume_24h,
            Column::CirculatingSupply => &self.circulating_supply,
            Column::TotalSupply => &self.total_supply,
            Column::MarketCap => &self.market_cap,
        }
    }

    fn slot(&mut self, column: Column) -> &mut String {
        match column {
            Column::Rank => &mut self.rank,
            Column::Name => &mut self.name,
            Column::Symbol => &mut self.symbol,
            Column::Price => &mut self.price,
            Column::Change1h => &mut self.change_1h,
            Column::Change24h => &mut self.change_24h,
            Column::Change7d => &mut self.change_7d,
            Column::Change30d => &mut self.change_30d,
            Column::Volume24h => &mut self.volume_24h,
            Column::CirculatingSupply => &mut self.circulating_supply,
            Column::TotalSupply => &mut self.total_supply,
            Column::MarketCap => &mut self.market_cap,
        }
    }

    /// Build a record from whichever fields a source produced, in any order.
    /// Later pairs for the same column win.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Column, String)>,
    {
        let mut record = Self::default();
        for (column, value) in pairs {
            *record.slot(column) = value;
        }
        record
    }
}

/// Run-level contract, built once and shared read-only by every component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub target_rows: usize,
    pub columns: Vec<Column>,
    pub base_url: String,
}

impl Target {
    pub fn new(target_rows: usize, base_url: impl Into<String>) -> Self {
        Self {
            target_rows,
            columns: CANONICAL_COLUMNS.to_vec(),
            base_url: base_url.into(),
        }
    }
}

/// Records from one fetch plus the row count the source showed at fetch time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResult {
    pub records: Vec<CanonicalRecord>,
    pub observed_rows: usize,
}

impl FetchResult {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Unit of work handed to one orchestrator worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTask {
    pub page: u32,
}

/// What a page fetcher reports for one request.
#[derive(Debug)]
pub enum PageOutcome {
    /// Got a page; advance.
    Rows(FetchResult),
    /// Rate limited or transport hiccup; cool down and retry the same page.
    Transient(FetchError),
    /// No more data.
    Exhausted,
    /// Fatal for this fetch unit. Rows collected so far are kept.
    Failed(FetchError),
}

impl PageOutcome {
    pub fn from_error(err: FetchError) -> Self {
        if err.is_transient() {
            PageOutcome::Transient(err)
        } else {
            PageOutcome::Failed(err)
        }
    }
}
