use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::ores::{OreInfo, Rarity};

/// Count tokens as the inventory renders them: "x3", "x 12". Only a
/// lowercase x counts; capitalized text like "MAX 50" is not a stack size.
const COUNT_PATTERN: &str = r"x\s*(\d+)";

const LEVEL_PATTERN: &str = r"(?i)level\s+(\d+)";

const MONEY_PATTERN: &str = r"\$\s*([\d,]+)";

/// Qualifier dropped from catalog names when matching, since the UI often
/// truncates "Ruby Ore" to "Ruby".
const ORE_SUFFIX: &str = " ore";

/// Number of lines (starting at the name line) searched for a count token.
const COUNT_WINDOW: usize = 3;

/// Counts at or above this are digit runs glued together by OCR, not real stacks.
const MAX_COUNT: u32 = 100;

/// A single recognized ore stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub name: String,
    pub count: u32,
    pub rarity: Rarity,
    pub multiplier: f64,
}

/// Detections keyed by catalog name, at most one per name.
pub type DetectionSet = BTreeMap<String, Detection>;

/// Values read from the stats screen for progress reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanStats {
    /// Legendary/mythical ore counts
    pub rare_ores: BTreeMap<String, u32>,
    pub level: Option<u32>,
    pub money: Option<u64>,
}

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("built-in pattern compiles"))
}

fn count_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, COUNT_PATTERN)
}

fn level_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, LEVEL_PATTERN)
}

fn money_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, MONEY_PATTERN)
}

/// Extracts ore detections from recognized text.
///
/// Each catalog entry is matched against the lines in order, by its full name
/// or its name without the " ore" suffix, ignoring case. The first matching
/// line wins; a count is then looked up in that line and the next two. Counts
/// outside 1..=99 are skipped, and a stack with no usable count defaults to 1.
///
/// Later lines mentioning an already-detected ore are ignored, so a stack
/// split over non-adjacent rows is under-counted.
pub fn parse_ores(text: &str, catalog: &[OreInfo]) -> DetectionSet {
    let lines: Vec<&str> = text.lines().collect();
    let lowered: Vec<String> = lines.iter().map(|l| l.trim().to_lowercase()).collect();

    let mut detected = DetectionSet::new();

    for ore in catalog {
        let full_name = ore.name.to_lowercase();
        let base_name = full_name
            .strip_suffix(ORE_SUFFIX)
            .filter(|b| !b.is_empty())
            .unwrap_or(full_name.as_str());

        let Some(idx) = lowered
            .iter()
            .position(|l| l.contains(full_name.as_str()) || l.contains(base_name))
        else {
            continue;
        };

        let window_end = (idx + COUNT_WINDOW).min(lines.len());
        let count = find_count(&lines[idx..window_end]).unwrap_or(1);

        detected.insert(
            ore.name.to_string(),
            Detection {
                name: ore.name.to_string(),
                count,
                rarity: ore.rarity,
                multiplier: ore.multiplier,
            },
        );
    }

    detected
}

/// Returns the first count token in the window within 1..=99.
fn find_count(window: &[&str]) -> Option<u32> {
    window.iter().find_map(|line| {
        count_regex()
            .captures_iter(line)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
            .find(|&c| c > 0 && c < MAX_COUNT)
    })
}

/// Extracts report stats from recognized text.
///
/// Rare ore counts come from the same detection logic as [`parse_ores`],
/// restricted to tracked rarities.
pub fn parse_stats(text: &str, catalog: &[OreInfo]) -> ScanStats {
    let rare_ores = parse_ores(text, catalog)
        .into_values()
        .filter(|d| d.rarity.is_tracked())
        .map(|d| (d.name, d.count))
        .collect();

    let level = level_regex()
        .captures(text)
        .and_then(|caps| caps.get(1)?.as_str().parse().ok());

    let money = money_regex().captures(text).and_then(|caps| {
        let digits: String = caps.get(1)?.as_str().chars().filter(|c| *c != ',').collect();
        digits.parse().ok()
    });

    ScanStats {
        rare_ores,
        level,
        money,
    }
}
