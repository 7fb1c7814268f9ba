//! Forge multiplier calculation.

use crate::ocr::extract::{Detection, DetectionSet};

/// Combined result for one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Product of every ore's multiplier raised to its count
    pub total_multiplier: f64,
    /// Total number of ores across all stacks
    pub ore_count: u32,
    /// Detections the outcome was computed from
    pub ores: DetectionSet,
}

/// Combines a detection set into a single multiplier.
///
/// Each stack contributes `multiplier^count`, so copies of the same ore
/// compound. An empty set yields a multiplier of 1.0.
pub fn calculate(ores: &DetectionSet) -> Outcome {
    Outcome {
        total_multiplier: total_multiplier(ores.values()),
        ore_count: ores.values().map(|d| d.count).sum(),
        ores: ores.clone(),
    }
}

/// Multiplies the per-stack factors.
///
/// Factors are sorted first so any iteration order gives the bit-identical
/// product; floating point multiplication is not associative.
pub fn total_multiplier<'a>(detections: impl IntoIterator<Item = &'a Detection>) -> f64 {
    let mut factors: Vec<f64> = detections
        .into_iter()
        .map(|d| d.multiplier.powi(d.count.min(i32::MAX as u32) as i32))
        .collect();
    factors.sort_by(f64::total_cmp);
    factors.into_iter().fold(1.0, |acc, f| acc * f)
}

impl Outcome {
    /// Multi-line text for display: the multiplier and one line per ore.
    pub fn summary(&self) -> String {
        let mut text = format!("Multiplier: {:.2}x", self.total_multiplier);
        if self.ores.is_empty() {
            text.push_str("\nNo ores detected");
            return text;
        }
        text.push_str(&format!("\nDetected {} ores:", self.ore_count));
        for ore in self.ores.values() {
            text.push_str(&format!(
                "\n- {} x{} ({:.2}x, {})",
                ore.name, ore.count, ore.multiplier, ore.rarity
            ));
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::extract::parse_ores;
    use crate::ores::{catalog, find};

    fn detection(name: &str, count: u32) -> Detection {
        let info = find(name).unwrap();
        Detection {
            name: name.to_string(),
            count,
            rarity: info.rarity,
            multiplier: info.multiplier,
        }
    }

    fn set_of(items: &[Detection]) -> DetectionSet {
        items.iter().map(|d| (d.name.clone(), d.clone())).collect()
    }

    #[test]
    fn test_empty_set() {
        let outcome = calculate(&DetectionSet::new());
        assert_eq!(outcome.total_multiplier, 1.0);
        assert_eq!(outcome.ore_count, 0);
    }

    #[test]
    fn test_single_entry_is_power() {
        for ore in catalog() {
            for n in 1..=5 {
                let outcome = calculate(&set_of(&[detection(ore.name, n)]));
                assert_eq!(outcome.total_multiplier, ore.multiplier.powi(n as i32));
                assert_eq!(outcome.ore_count, n);
            }
        }
    }

    #[test]
    fn test_order_independent() {
        let items = vec![
            detection("Iron Ore", 3),
            detection("Ruby Ore", 2),
            detection("Mythril Ore", 1),
            detection("Rivalite Ore", 4),
        ];
        let forward = total_multiplier(items.iter());
        let backward = total_multiplier(items.iter().rev());
        let shuffled = total_multiplier([&items[2], &items[0], &items[3], &items[1]]);
        assert_eq!(forward, backward);
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn test_from_parsed_text() {
        let ores = parse_ores("Iron Ore x3\nGold Ore x1", catalog());
        let outcome = calculate(&ores);
        assert_eq!(outcome.ore_count, 4);
        assert!((outcome.total_multiplier - 1.2f64.powi(3) * 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_summary() {
        let outcome = calculate(&set_of(&[detection("Gold Ore", 2)]));
        let text = outcome.summary();
        assert!(text.starts_with("Multiplier: 2.25x"));
        assert!(text.contains("- Gold Ore x2 (1.50x, uncommon)"));

        let empty = calculate(&DetectionSet::new()).summary();
        assert_eq!(empty, "Multiplier: 1.00x\nNo ores detected");
    }
}
