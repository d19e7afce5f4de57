use std::cmp::Ordering;

use common::Candidate;

/// Orders candidates and keeps the top `top_n`.
#[derive(Debug, Clone, Copy)]
pub struct Ranker {
    top_n: usize,
}

impl Ranker {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    pub fn rank(&self, candidates: &[Candidate]) -> Vec<Candidate> {
        rank(candidates, self.top_n)
    }
}

/// Volume descending, then pct change descending, then symbol ascending.
/// Total order, so the output never depends on input order.
pub fn compare(a: &Candidate, b: &Candidate) -> Ordering {
    b.current_volume
        .cmp(&a.current_volume)
        .then_with(|| b.pct_change.total_cmp(&a.pct_change))
        .then_with(|| a.symbol.cmp(&b.symbol))
}

/// Sorted, truncated copy of `candidates`. The input is left untouched.
pub fn rank(candidates: &[Candidate], top_n: usize) -> Vec<Candidate> {
    let mut ranked = candidates.to_vec();
    ranked.sort_by(compare);
    ranked.truncate(top_n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn cand(symbol: &str, volume: u64, pct: f64) -> Candidate {
        Candidate {
            symbol: symbol.into(),
            last_price: 100.0,
            pct_change: pct,
            volume_ratio: 2.0,
            current_volume: volume,
            timestamp: Utc::now(),
        }
    }

    fn symbols(c: &[Candidate]) -> Vec<&str> {
        c.iter().map(|c| c.symbol.as_str()).collect()
    }

    #[test]
    fn sorts_by_volume_descending() {
        let input = vec![cand("A", 10, 1.0), cand("B", 30, 1.0), cand("C", 20, 1.0)];
        assert_eq!(symbols(&rank(&input, 50)), vec!["B", "C", "A"]);
        // input untouched
        assert_eq!(symbols(&input), vec!["A", "B", "C"]);
    }

    #[test]
    fn ties_break_on_pct_then_symbol() {
        let input = vec![
            cand("ZED", 10, 3.0),
            cand("BETA", 10, 5.0),
            cand("ALPHA", 10, 3.0),
        ];
        assert_eq!(symbols(&rank(&input, 50)), vec!["BETA", "ALPHA", "ZED"]);
    }

    #[test]
    fn truncates_to_top_n() {
        let input: Vec<_> = (0..10).map(|i| cand(&format!("S{i}"), i, 1.0)).collect();
        let ranked = Ranker::new(3).rank(&input);
        assert_eq!(symbols(&ranked), vec!["S9", "S8", "S7"]);
    }

    #[test]
    fn empty_input_is_fine() {
        assert!(rank(&[], 5).is_empty());
    }
}
