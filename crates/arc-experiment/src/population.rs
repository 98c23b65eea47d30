//! Population bookkeeping for the evolutionary drivers.

use serde::Serialize;

use arc_kernel::Verdict;

/// One evaluated candidate of a generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationEntry {
    /// Position within its generation
    pub index: usize,
    pub response: String,
    pub code: String,
    /// `train_correctness + avg_pixel_correctness`, -2 on total failure
    pub score: f64,
    pub report: String,
}

impl PopulationEntry {
    pub fn new(index: usize, response: String, verdict: &Verdict) -> Self {
        Self {
            index,
            response,
            code: verdict.code.clone(),
            score: verdict.score(),
            report: verdict.report.clone(),
        }
    }
}

/// Keep the `k` best entries by descending score.
///
/// The sort is stable, so tied entries keep their generation order.
pub fn select_survivors(mut entries: Vec<PopulationEntry>, k: usize) -> Vec<PopulationEntry> {
    entries.sort_by(|a, b| b.score.total_cmp(&a.score));
    entries.truncate(k);
    entries
}

/// Summary of one evaluated generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationStats {
    pub evaluated: usize,
    pub best_score: f64,
    pub avg_score: f64,
}

impl GenerationStats {
    /// Returns `None` for an empty generation.
    pub fn of(entries: &[PopulationEntry]) -> Option<Self> {
        if entries.is_empty() {
            return None;
        }
        let best_score = entries
            .iter()
            .map(|e| e.score)
            .fold(f64::NEG_INFINITY, f64::max);
        let avg_score = entries.iter().map(|e| e.score).sum::<f64>() / entries.len() as f64;
        Some(Self {
            evaluated: entries.len(),
            best_score,
            avg_score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: usize, score: f64) -> PopulationEntry {
        PopulationEntry {
            index,
            response: format!("response {index}"),
            code: String::new(),
            score,
            report: String::new(),
        }
    }

    #[test]
    fn test_keeps_top_k_by_score() {
        let entries = vec![entry(0, -2.0), entry(1, 1.5), entry(2, 0.5), entry(3, 2.0)];
        let survivors = select_survivors(entries, 2);
        let indices: Vec<usize> = survivors.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![3, 1]);
    }

    #[test]
    fn test_ties_keep_generation_order() {
        let entries = vec![entry(0, 0.5), entry(1, 1.0), entry(2, 1.0), entry(3, 1.0)];
        let survivors = select_survivors(entries, 2);
        let indices: Vec<usize> = survivors.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn test_fewer_entries_than_k() {
        let survivors = select_survivors(vec![entry(0, 0.0)], 2);
        assert_eq!(survivors.len(), 1);
    }

    #[test]
    fn test_from_failed_verdict() {
        let verdict = Verdict::failure(None, String::new(), "Error".to_string());
        let e = PopulationEntry::new(4, "text".to_string(), &verdict);
        assert_eq!(e.score, -2.0);
        assert_eq!(e.report, "Error");
    }

    #[test]
    fn test_generation_stats() {
        let stats = GenerationStats::of(&[entry(0, -2.0), entry(1, 1.0), entry(2, 2.0)]).unwrap();
        assert_eq!(stats.evaluated, 3);
        assert_eq!(stats.best_score, 2.0);
        assert!((stats.avg_score - 1.0 / 3.0).abs() < 1e-9);
        assert!(GenerationStats::of(&[]).is_none());
    }
}
