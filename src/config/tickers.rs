//! Static watchlist: the fund basket plus individually tracked symbols.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerGroup {
    FundMember,
    Individual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickerEntry {
    pub symbol: &'static str,
    pub name: &'static str,
    pub sector: &'static str,
    pub group: TickerGroup,
    /// Short names headlines use instead of the registered name.
    pub aliases: &'static [&'static str],
}

impl TickerEntry {
    const fn aka(self, aliases: &'static [&'static str]) -> Self {
        TickerEntry { aliases, ..self }
    }
}

const fn fund(symbol: &'static str, name: &'static str, sector: &'static str) -> TickerEntry {
    TickerEntry { symbol, name, sector, group: TickerGroup::FundMember, aliases: &[] }
}

const fn single(symbol: &'static str, name: &'static str, sector: &'static str) -> TickerEntry {
    TickerEntry { symbol, name, sector, group: TickerGroup::Individual, aliases: &[] }
}

pub const FUND_LABEL: &str = "FNILX";

/// Largest holdings by weight; the fund prompt asks the model to separate
/// their signal from broader breadth.
pub const TOP_WEIGHTS: [&str; 7] = ["NVDA", "AAPL", "MSFT", "GOOGL", "AMZN", "META", "TSLA"];

const WATCHLIST: [TickerEntry; 51] = [
    fund("AAPL", "Apple", "Tech/Hardware"),
    fund("MSFT", "Microsoft", "Tech/Software"),
    fund("NVDA", "NVIDIA", "Tech/Semiconductors"),
    fund("AMZN", "Amazon", "Consumer/E-commerce"),
    fund("META", "Meta Platforms", "Tech/Internet").aka(&["Meta", "Facebook"]),
    fund("GOOGL", "Alphabet", "Tech/Internet").aka(&["Google"]),
    fund("BRK.B", "Berkshire Hathaway", "Financials/Conglomerate").aka(&["Berkshire"]),
    fund("AVGO", "Broadcom", "Tech/Semiconductors"),
    fund("TSLA", "Tesla", "Consumer/Automotive"),
    fund("LLY", "Eli Lilly", "Healthcare/Pharma").aka(&["Lilly"]),
    fund("JPM", "JPMorgan Chase", "Financials/Banking").aka(&["JPMorgan", "JP Morgan"]),
    fund("UNH", "UnitedHealth", "Healthcare/Insurance"),
    fund("V", "Visa", "Financials/Payments"),
    fund("XOM", "Exxon Mobil", "Energy/Oil & Gas").aka(&["Exxon", "ExxonMobil"]),
    fund("MA", "Mastercard", "Financials/Payments"),
    fund("JNJ", "Johnson & Johnson", "Healthcare/Pharma").aka(&["J&J"]),
    fund("PG", "Procter & Gamble", "Consumer/Staples").aka(&["P&G"]),
    fund("HD", "Home Depot", "Consumer/Retail"),
    fund("COST", "Costco", "Consumer/Retail"),
    fund("ABBV", "AbbVie", "Healthcare/Pharma"),
    fund("MRK", "Merck", "Healthcare/Pharma"),
    fund("CVX", "Chevron", "Energy/Oil & Gas"),
    fund("CRM", "Salesforce", "Tech/Software"),
    fund("AMD", "Advanced Micro Devices", "Tech/Semiconductors"),
    fund("NFLX", "Netflix", "Tech/Media"),
    fund("PEP", "PepsiCo", "Consumer/Staples"),
    fund("KO", "Coca-Cola", "Consumer/Staples"),
    fund("WMT", "Walmart", "Consumer/Retail"),
    fund("BAC", "Bank of America", "Financials/Banking").aka(&["BofA"]),
    fund("ADBE", "Adobe", "Tech/Software"),
    fund("TMO", "Thermo Fisher Scientific", "Healthcare/Life Sciences").aka(&["Thermo Fisher"]),
    fund("ACN", "Accenture", "Tech/Services"),
    fund("LIN", "Linde", "Materials/Chemicals"),
    fund("MCD", "McDonald's", "Consumer/Restaurants"),
    fund("CSCO", "Cisco Systems", "Tech/Networking").aka(&["Cisco"]),
    fund("ABT", "Abbott Laboratories", "Healthcare/Devices").aka(&["Abbott"]),
    fund("ORCL", "Oracle", "Tech/Software"),
    fund("DIS", "Walt Disney", "Tech/Media").aka(&["Disney"]),
    fund("WFC", "Wells Fargo", "Financials/Banking"),
    fund("INTU", "Intuit", "Tech/Software"),
    fund("QCOM", "Qualcomm", "Tech/Semiconductors"),
    fund("DHR", "Danaher", "Healthcare/Life Sciences"),
    fund("VZ", "Verizon", "Tech/Telecom"),
    fund("TXN", "Texas Instruments", "Tech/Semiconductors"),
    fund("IBM", "IBM", "Tech/Services"),
    fund("CAT", "Caterpillar", "Industrials/Machinery"),
    fund("AMGN", "Amgen", "Healthcare/Biotech"),
    fund("GE", "GE Aerospace", "Industrials/Aerospace"),
    fund("PFE", "Pfizer", "Healthcare/Pharma"),
    fund("NOW", "ServiceNow", "Tech/Software"),
    single("UURAF", "Ucore Rare Metals", "Energy/Uranium").aka(&["Ucore"]),
];

#[derive(Debug, Clone)]
pub struct TickerRegistry {
    fund_label: String,
    entries: Vec<TickerEntry>,
}

impl TickerRegistry {
    pub fn standard() -> Self {
        Self::new(FUND_LABEL, WATCHLIST.to_vec())
    }

    pub fn new(fund_label: &str, entries: Vec<TickerEntry>) -> Self {
        Self { fund_label: fund_label.to_string(), entries }
    }

    pub fn fund_label(&self) -> &str {
        &self.fund_label
    }

    /// Every entry, fund members first, in fixed order.
    pub fn all(&self) -> &[TickerEntry] {
        &self.entries
    }

    pub fn fund_members(&self) -> impl Iterator<Item = &TickerEntry> {
        self.entries.iter().filter(|e| e.group == TickerGroup::FundMember)
    }

    pub fn individuals(&self) -> impl Iterator<Item = &TickerEntry> {
        self.entries.iter().filter(|e| e.group == TickerGroup::Individual)
    }

    #[cfg(test)]
    pub fn get(&self, symbol: &str) -> Option<&TickerEntry> {
        self.entries.iter().find(|e| e.symbol == symbol)
    }

    #[cfg(test)]
    pub fn sector(&self, symbol: &str) -> &str {
        self.get(symbol).map(|e| e.sector).unwrap_or("Unknown")
    }
}

pub fn is_top_weight(symbol: &str) -> bool {
    TOP_WEIGHTS.contains(&symbol)
}

/// 1-12 characters of `A-Z`, `0-9`, `.`, `-` or `:`.
pub fn is_valid_symbol(symbol: &str) -> bool {
    let len = symbol.chars().count();
    (1..=12).contains(&len)
        && symbol
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '.' | '-' | ':'))
}
