//! Category comparator.
//!
//! Head-to-head scoring of two entities over a set of statistics. Each
//! statistic is a win, loss or tie from the first entity's point of view.

use serde::Serialize;

use crate::models::{HeaderKey, Record, StatKey, Table};
use crate::normalize::{classify, normalize_text};

/// Category order used when a table carries the standard box-score columns.
pub const CANONICAL_STATS: [&str; 9] = ["FG%", "3P", "FT%", "PTS", "REB", "AST", "ST", "BLK", "TO"];

/// Canonical categories that must be present to use [`CANONICAL_STATS`] order.
const CANONICAL_MINIMUM: usize = 7;

impl StatKey {
    /// Polarity from the label: turnovers are lower-is-better.
    pub fn lookup(label: &str) -> Self {
        let norm = normalize_text(label);
        let lower_is_better = norm == "to" || norm.contains("turnover");
        StatKey::new(label, !lower_is_better)
    }

    /// A rank-valued column: lower is better.
    pub fn rank(label: &str) -> Self {
        StatKey::new(label, false)
    }
}

// =============================================================================
// Outcomes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
    Tie,
}

/// Outcome of one statistic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatOutcome {
    pub stat: String,
    pub outcome: Outcome,
}

/// Aggregate W/L/T over a set of statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryRecord {
    pub wins: usize,
    pub losses: usize,
    pub ties: usize,
    pub outcomes: Vec<StatOutcome>,
}

impl CategoryRecord {
    pub fn total(&self) -> usize {
        self.wins + self.losses + self.ties
    }

    /// The same record seen from the other side.
    pub fn flipped(&self) -> Self {
        Self {
            wins: self.losses,
            losses: self.wins,
            ties: self.ties,
            outcomes: self
                .outcomes
                .iter()
                .map(|o| StatOutcome {
                    stat: o.stat.clone(),
                    outcome: match o.outcome {
                        Outcome::Win => Outcome::Loss,
                        Outcome::Loss => Outcome::Win,
                        Outcome::Tie => Outcome::Tie,
                    },
                })
                .collect(),
        }
    }

    fn push(&mut self, stat: &str, outcome: Outcome) {
        match outcome {
            Outcome::Win => self.wins += 1,
            Outcome::Loss => self.losses += 1,
            Outcome::Tie => self.ties += 1,
        }
        self.outcomes.push(StatOutcome {
            stat: stat.to_string(),
            outcome,
        });
    }
}

/// Compare one statistic, from `a`'s side.
///
/// Two numbers compare by polarity. Anything else compares as normalized
/// text: an empty value loses to any non-empty one.
pub fn compare_stat(a: &str, b: &str, stat: &StatKey) -> Outcome {
    let x = classify(a);
    let y = classify(b);

    if let (Some(x), Some(y)) = (x.numeric, y.numeric) {
        if x == y {
            return Outcome::Tie;
        }
        let a_better = if stat.higher_is_better { x > y } else { x < y };
        return if a_better { Outcome::Win } else { Outcome::Loss };
    }

    match (x.text.is_empty(), y.text.is_empty()) {
        (true, true) => Outcome::Tie,
        (true, false) => Outcome::Loss,
        (false, true) => Outcome::Win,
        (false, false) => match x.text.cmp(&y.text) {
            std::cmp::Ordering::Equal => Outcome::Tie,
            std::cmp::Ordering::Greater => Outcome::Win,
            std::cmp::Ordering::Less => Outcome::Loss,
        },
    }
}

/// Score `a` against `b`. `wins + losses + ties == stats.len()`.
pub fn compare_entities(a: &Record, b: &Record, stats: &[StatKey]) -> CategoryRecord {
    let mut record = CategoryRecord::default();
    for stat in stats {
        record.push(&stat.key, compare_stat(a.value(&stat.key), b.value(&stat.key), stat));
    }
    record
}

// =============================================================================
// Matchups
// =============================================================================

/// Consecutive items form pairs; an odd trailing item is dropped.
pub fn chunk_pairs<T>(items: &[T]) -> Vec<(&T, &T)> {
    items.chunks_exact(2).map(|p| (&p[0], &p[1])).collect()
}

/// Statistic columns of a matchup table.
///
/// Metadata columns (entity, league, result, score, matchup number,
/// head-to-head, ranks) are skipped. When most canonical categories are
/// present they come back in canonical order, otherwise in table order.
pub fn detect_stat_keys(headers: &[HeaderKey], entity_key: &str) -> Vec<StatKey> {
    let detected: Vec<&HeaderKey> = headers
        .iter()
        .filter(|h| !h.is_blank() && h.as_str() != entity_key && !is_metadata(h.as_str()))
        .collect();

    let canonical: Vec<&str> = CANONICAL_STATS
        .iter()
        .copied()
        .filter(|c| detected.iter().any(|h| h.as_str() == *c))
        .collect();

    if canonical.len() >= CANONICAL_MINIMUM {
        canonical.into_iter().map(StatKey::lookup).collect()
    } else {
        detected.into_iter().map(|h| StatKey::lookup(h.as_str())).collect()
    }
}

fn is_metadata(key: &str) -> bool {
    let norm = normalize_text(key);
    key.starts_with("col_")
        || matches!(norm.as_str(), "league" | "result" | "score")
        || ["matchup no", "category h2h", "rank", "regular league"]
            .iter()
            .any(|needle| norm.contains(needle))
}

/// Entity column of a table: a header ending in " team", then `Team`, then
/// the first header.
pub fn pick_entity_key(headers: &[HeaderKey]) -> Option<HeaderKey> {
    headers
        .iter()
        .find(|h| normalize_text(h.as_str()).ends_with(" team"))
        .or_else(|| headers.iter().find(|h| normalize_text(h.as_str()) == "team"))
        .or_else(|| headers.first())
        .cloned()
}

/// Playoff round named by a merged header.
pub fn detect_round(labels: &[String]) -> &'static str {
    let joined = normalize_text(&labels.join(" "));
    if joined.contains("round 1") {
        "Round 1"
    } else if joined.contains("semifinals") {
        "SEMIFINALS"
    } else if joined.contains("finals") {
        "FINALS"
    } else if joined.contains("3rd place") || joined.contains("third place") {
        "3RD PLACE"
    } else {
        "PLAYOFFS"
    }
}

/// Records that take part in matchups: named, not a bye, and in `group`
/// when one is given as `(column, value)`.
pub fn entrants<'a>(table: &'a Table, entity_key: &str, group: Option<(&str, &str)>) -> Vec<&'a Record> {
    table
        .records
        .iter()
        .filter(|r| {
            let name = normalize_text(r.value(entity_key));
            !name.is_empty() && name != "bye"
        })
        .filter(|r| match group {
            Some((column, value)) => normalize_text(r.value(column)) == normalize_text(value),
            None => true,
        })
        .collect()
}

/// One scored pairing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Matchup {
    pub home: String,
    pub away: String,
    /// From the home side.
    pub record: CategoryRecord,
}

/// Pair consecutive records and score each pair.
pub fn score_matchups(records: &[&Record], entity_key: &str, stats: &[StatKey]) -> Vec<Matchup> {
    chunk_pairs(records)
        .into_iter()
        .map(|(a, b)| Matchup {
            home: a.value(entity_key).to_string(),
            away: b.value(entity_key).to_string(),
            record: compare_entities(a, b, stats),
        })
        .collect()
}

/// Scored matchups of a whole table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchupReport {
    pub entity_key: String,
    pub stats: Vec<StatKey>,
    pub matchups: Vec<Matchup>,
}

/// Pair the table's entrants and score them.
///
/// `stats` names the categories to use; when empty they are detected from
/// the headers.
pub fn matchup_report(table: &Table, stats: &[String]) -> MatchupReport {
    let Some(entity_key) = pick_entity_key(&table.headers) else {
        return MatchupReport {
            entity_key: String::new(),
            stats: Vec::new(),
            matchups: Vec::new(),
        };
    };
    let stats: Vec<StatKey> = if stats.is_empty() {
        detect_stat_keys(&table.headers, entity_key.as_str())
    } else {
        stats.iter().map(|s| StatKey::lookup(s.trim())).collect()
    };
    let playing = entrants(table, entity_key.as_str(), None);
    let matchups = score_matchups(&playing, entity_key.as_str(), &stats);
    MatchupReport {
        entity_key: entity_key.as_str().to_string(),
        stats,
        matchups,
    }
}
