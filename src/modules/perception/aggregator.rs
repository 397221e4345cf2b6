use super::structs::{Corpus, CorpusKind, NewsBatch};
use crate::config::tickers::TickerRegistry;

/// Analysis inputs for one run: the merged fund basket and one corpus per
/// individually tracked ticker, in registry order.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub fund: Corpus,
    pub individuals: Vec<Corpus>,
}

impl Aggregation {
    pub fn all_quiet(&self) -> bool {
        self.fund.is_quiet() && self.individuals.iter().all(Corpus::is_quiet)
    }

    pub fn corpora(&self) -> impl Iterator<Item = &Corpus> {
        std::iter::once(&self.fund).chain(self.individuals.iter())
    }

    pub fn total_articles(&self) -> usize {
        self.corpora().map(Corpus::article_count).sum()
    }
}

/// Pure merge step. Tickers missing from the batch count as empty.
pub fn aggregate(registry: &TickerRegistry, batch: &NewsBatch) -> Aggregation {
    let members: Vec<_> = registry.fund_members().collect();
    let items = members
        .iter()
        .flat_map(|e| batch.get(e.symbol).unwrap_or_default().iter().cloned())
        .collect();

    let fund = Corpus {
        subject: registry.fund_label().to_string(),
        kind: CorpusKind::Fund { total_holdings: members.len() },
        items,
    };

    let individuals = registry
        .individuals()
        .map(|e| {
            let kind = CorpusKind::Individual { sector: e.sector.to_string() };
            match batch.get(e.symbol) {
                Some(items) => Corpus { subject: e.symbol.to_string(), kind, items: items.to_vec() },
                None => Corpus::quiet(e.symbol, kind),
            }
        })
        .collect();

    Aggregation { fund, individuals }
}
