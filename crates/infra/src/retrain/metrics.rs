use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static ACCURACY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Accuracy:\s+([\d.]+)").expect("hardcoded regex"));
static PRECISION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Precision:\s+([\d.]+)").expect("hardcoded regex"));
static RECALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Recall:\s+([\d.]+)").expect("hardcoded regex"));

/// Evaluation metrics reported by the training script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub accuracy: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1_score: Option<f64>,
}

/// Pull `Accuracy: <n>`, `Precision: <n>` and `Recall: <n>` out of the
/// script's stdout. The first occurrence of each label wins; F1 is derived
/// only when both precision and recall are present and non-zero.
pub fn parse_metrics(output: &str) -> TrainingMetrics {
    let accuracy = capture(&ACCURACY, output);
    let precision = capture(&PRECISION, output);
    let recall = capture(&RECALL, output);

    let f1_score = match (precision, recall) {
        (Some(p), Some(r)) if p + r > 0.0 => Some(2.0 * p * r / (p + r)),
        _ => None,
    };

    TrainingMetrics {
        accuracy,
        precision,
        recall,
        f1_score,
    }
}

fn capture(re: &Regex, output: &str) -> Option<f64> {
    re.captures(output)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_metrics_and_derives_f1() {
        let out =
            "Loading data...\nAccuracy:  0.93\nPrecision: 0.88\nRecall:    0.91\nSaved model\n";
        let m = parse_metrics(out);

        assert_eq!(m.accuracy, Some(0.93));
        assert_eq!(m.precision, Some(0.88));
        assert_eq!(m.recall, Some(0.91));
        let f1 = m.f1_score.unwrap();
        assert!((f1 - 0.8947).abs() < 1e-3, "f1 = {f1}");
    }

    #[test]
    fn f1_needs_both_precision_and_recall() {
        let m = parse_metrics("Accuracy: 0.7\nPrecision: 0.6\n");
        assert_eq!(m.accuracy, Some(0.7));
        assert_eq!(m.recall, None);
        assert_eq!(m.f1_score, None);
    }

    #[test]
    fn silent_script_yields_no_metrics() {
        assert_eq!(parse_metrics("done"), TrainingMetrics::default());
    }

    #[test]
    fn unparseable_number_is_absent() {
        assert_eq!(parse_metrics("Accuracy: 0.9.1").accuracy, None);
    }
}
