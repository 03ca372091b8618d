use crate::scorer::ScoredRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreKind {
    Bullish,
    Bearish,
    Trap,
}

impl ScoreKind {
    pub fn of(self, row: &ScoredRow) -> u8 {
        match self {
            ScoreKind::Bullish => row.bullish_score,
            ScoreKind::Bearish => row.bearish_score,
            ScoreKind::Trap => row.trap_score,
        }
    }

    /// Trap candidates need at least one hit; trend rankings fill up with
    /// zero-score rows when fewer than N qualify.
    fn is_eligible(self, row: &ScoredRow) -> bool {
        match self {
            ScoreKind::Trap => row.trap_score > 0,
            ScoreKind::Bullish | ScoreKind::Bearish => true,
        }
    }
}

/// Top `n` rows by the selected score, highest first.
///
/// `sort_by` is stable, so rows with equal scores keep their normalized input
/// order. Output is reproducible for a given batch.
pub fn rank(rows: &[ScoredRow], kind: ScoreKind, n: usize) -> Vec<&ScoredRow> {
    let mut eligible: Vec<&ScoredRow> = rows.iter().filter(|r| kind.is_eligible(r)).collect();
    eligible.sort_by(|a, b| kind.of(b).cmp(&kind.of(a)));
    eligible.truncate(n);
    eligible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::AssetRow;
    use crate::scorer::PatternTags;

    fn scored(symbol: &str, bullish: u8, bearish: u8, trap: u8) -> ScoredRow {
        ScoredRow {
            row: AssetRow {
                symbol: symbol.to_string(),
                price_change_24h: 0.0,
                price_change_7d: None,
                rsi: 50.0,
                cci: 0.0,
                momentum: Some(0.0),
                volume_quote: None,
                btc_correlation: None,
            },
            bullish_score: bullish,
            bearish_score: bearish,
            trap_score: trap,
            tags: PatternTags::default(),
        }
    }

    fn symbols(rows: &[&ScoredRow]) -> Vec<String> {
        rows.iter().map(|r| r.row.symbol.clone()).collect()
    }

    #[test]
    fn test_sorted_descending() {
        let rows = vec![scored("A", 1, 0, 0), scored("B", 4, 0, 0), scored("C", 2, 0, 0)];
        let top = rank(&rows, ScoreKind::Bullish, 10);
        assert_eq!(symbols(&top), vec!["B", "C", "A"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let rows = vec![
            scored("P0", 1, 0, 0),
            scored("P1", 0, 0, 0),
            scored("P2", 3, 0, 0),
            scored("P3", 4, 0, 0),
            scored("P4", 2, 0, 0),
            scored("P5", 3, 0, 0),
        ];
        let top = rank(&rows, ScoreKind::Bullish, 3);
        assert_eq!(symbols(&top), vec!["P3", "P2", "P5"]);
    }

    #[test]
    fn test_length_is_min_of_n_and_eligible() {
        let rows: Vec<ScoredRow> = (0..4).map(|i| scored(&format!("S{}", i), 0, i, 0)).collect();
        assert_eq!(rank(&rows, ScoreKind::Bearish, 2).len(), 2);
        assert_eq!(rank(&rows, ScoreKind::Bearish, 10).len(), 4);
        assert!(rank(&rows, ScoreKind::Bearish, 0).is_empty());
    }

    #[test]
    fn test_trend_ranking_includes_zero_scores() {
        let rows = vec![scored("A", 0, 0, 0), scored("B", 2, 0, 0)];
        let top = rank(&rows, ScoreKind::Bullish, 10);
        assert_eq!(symbols(&top), vec!["B", "A"]);
    }

    #[test]
    fn test_trap_ranking_skips_zero_scores() {
        let rows = vec![
            scored("A", 0, 0, 0),
            scored("B", 0, 0, 2),
            scored("C", 0, 0, 5),
            scored("D", 0, 0, 2),
        ];
        let top = rank(&rows, ScoreKind::Trap, 10);
        assert_eq!(symbols(&top), vec!["C", "B", "D"]);
    }
}
