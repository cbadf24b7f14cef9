//! Sort & rank engine.
//!
//! One comparator drives every ordering:
//!
//! 1. empty values sort last, whatever the direction
//! 2. numbers compare numerically; between two zeros a genuine zero comes
//!    before a dash-derived one, whatever the direction
//! 3. numbers sort before text, whatever the direction
//! 4. text compares case-insensitively with digit runs compared as numbers
//!
//! The direction flips only steps 2 (before the zero tie-break) and 4.
//! Sorting is stable.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::{Direction, Record, StatKey, Table, TypedValue, ValueKind};
use crate::normalize::{classify, to_number};

// =============================================================================
// Comparator
// =============================================================================

/// Compare two classified values.
pub fn compare_values(a: &TypedValue, b: &TypedValue, direction: Direction) -> Ordering {
    let directed = |ord: Ordering| match direction {
        Direction::Asc => ord,
        Direction::Desc => ord.reverse(),
    };

    match (a.kind, b.kind) {
        (ValueKind::Empty, ValueKind::Empty) => Ordering::Equal,
        (ValueKind::Empty, _) => Ordering::Greater,
        (_, ValueKind::Empty) => Ordering::Less,
        (ValueKind::Numeric, ValueKind::Numeric) => {
            let x = a.numeric.unwrap_or(0.0);
            let y = b.numeric.unwrap_or(0.0);
            if x == y {
                // Only zeros carry the tie-break; it ignores direction.
                if x == 0.0 {
                    a.dash_derived.cmp(&b.dash_derived)
                } else {
                    Ordering::Equal
                }
            } else {
                directed(x.total_cmp(&y))
            }
        }
        (ValueKind::Numeric, ValueKind::Text) => Ordering::Less,
        (ValueKind::Text, ValueKind::Numeric) => Ordering::Greater,
        (ValueKind::Text, ValueKind::Text) => directed(natural_cmp(&a.text, &b.text)),
    }
}

/// Compare two raw cells.
pub fn compare_cells(a: &str, b: &str, direction: Direction) -> Ordering {
    compare_values(&classify(a), &classify(b), direction)
}

/// Case-insensitive comparison with digit runs compared by value, so
/// `a2` sorts before `a10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a_low = a.to_lowercase();
    let b_low = b.to_lowercase();
    let mut xs = chunks(&a_low);
    let mut ys = chunks(&b_low);

    loop {
        match (xs.next(), ys.next()) {
            (None, None) => return a_low.cmp(&b_low).then_with(|| a.cmp(b)),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (is_digits(x), is_digits(y)) {
                    (true, true) => cmp_digit_runs(x, y),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Split into maximal runs of digits and non-digits.
fn chunks(s: &str) -> impl Iterator<Item = &str> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let digit = first.is_ascii_digit();
        let end = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

fn cmp_digit_runs(x: &str, y: &str) -> Ordering {
    let x = x.trim_start_matches('0');
    let y = y.trim_start_matches('0');
    x.len().cmp(&y.len()).then_with(|| x.cmp(y))
}

// =============================================================================
// Sorting
// =============================================================================

/// Records of `table` ordered by the `key` column. Stable.
pub fn sort_by<'a>(table: &'a Table, key: &str, direction: Direction) -> Vec<&'a Record> {
    let mut keyed: Vec<(TypedValue, &Record)> = table
        .records
        .iter()
        .map(|r| (classify(r.value(key)), r))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| compare_values(a, b, direction));
    keyed.into_iter().map(|(_, r)| r).collect()
}

/// Sort a table's records in place. Stable.
pub fn sort_table(table: &mut Table, key: &str, direction: Direction) {
    let mut keyed: Vec<(TypedValue, Record)> = std::mem::take(&mut table.records)
        .into_iter()
        .map(|r| (classify(r.value(key)), r))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| compare_values(a, b, direction));
    table.records = keyed.into_iter().map(|(_, r)| r).collect();
}

/// Ascending by numeric rank; rows without a numeric rank go last.
pub fn sort_by_numeric_rank<'a>(table: &'a Table, key: &str) -> Vec<&'a Record> {
    rank_order(table.records.iter(), key)
}

fn rank_order<'a>(records: impl Iterator<Item = &'a Record>, key: &str) -> Vec<&'a Record> {
    let mut ranked: Vec<(Option<f64>, &Record)> =
        records.map(|r| (to_number(r.value(key)), r)).collect();
    ranked.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    ranked.into_iter().map(|(_, r)| r).collect()
}

// =============================================================================
// Leaders and podiums
// =============================================================================

/// Best and worst entities for one statistic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leaders {
    pub stat: String,
    /// Best first.
    pub top: Vec<String>,
    /// In the same best-first order, ending with the worst.
    pub bottom: Vec<String>,
}

/// Top-N and bottom-N entities by `stat`, honoring its polarity.
///
/// Rows without an entity name or a numeric value are ignored.
pub fn category_leaders(table: &Table, entity_key: &str, stat: &StatKey, n: usize) -> Leaders {
    let mut values: Vec<(String, f64)> = table
        .records
        .iter()
        .filter(|r| r.has_value(entity_key))
        .filter_map(|r| {
            to_number(r.value(&stat.key)).map(|v| (r.value(entity_key).trim().to_string(), v))
        })
        .collect();

    values.sort_by(|(_, a), (_, b)| {
        if stat.higher_is_better {
            b.total_cmp(a)
        } else {
            a.total_cmp(b)
        }
    });

    let names: Vec<String> = values.into_iter().map(|(name, _)| name).collect();
    let bottom_from = names.len().saturating_sub(n);
    Leaders {
        stat: stat.key.clone(),
        top: names.iter().take(n).cloned().collect(),
        bottom: names[bottom_from..].to_vec(),
    }
}

/// Top records of one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Podium {
    pub group: String,
    /// Records in the group.
    pub total: usize,
    pub top: Vec<Record>,
}

/// Group records by `group_key` and keep the best `n` of each by `rank_key`.
///
/// Groups come in natural order of their names. Empty when no record has a
/// value under `rank_key`.
pub fn podiums(table: &Table, group_key: &str, rank_key: &str, n: usize) -> Vec<Podium> {
    if !table.records.iter().any(|r| r.has_value(rank_key)) {
        return Vec::new();
    }

    let mut groups: BTreeMap<NaturalKey, Vec<&Record>> = BTreeMap::new();
    for record in &table.records {
        let group = record.value(group_key).trim();
        if group.is_empty() {
            continue;
        }
        groups
            .entry(NaturalKey(group.to_string()))
            .or_default()
            .push(record);
    }

    groups
        .into_iter()
        .map(|(NaturalKey(group), members)| Podium {
            group,
            total: members.len(),
            top: rank_order(members.into_iter(), rank_key)
                .into_iter()
                .take(n)
                .cloned()
                .collect(),
        })
        .collect()
}

#[derive(Debug, PartialEq, Eq)]
struct NaturalKey(String);

impl Ord for NaturalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        natural_cmp(&self.0, &other.0)
    }
}

impl PartialOrd for NaturalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HeaderKey;

    fn table(key: &str, values: &[&str]) -> Table {
        let headers = vec![HeaderKey::new("Team"), HeaderKey::new(key)];
        let records = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                Record::new(vec![
                    ("Team".into(), format!("t{}", i)),
                    (key.into(), v.to_string()),
                ])
            })
            .collect();
        Table::new(headers, records)
    }

    fn order(records: &[&Record]) -> Vec<String> {
        records.iter().map(|r| r.value("Team").to_string()).collect()
    }

    #[test]
    fn test_empties_last_both_directions() {
        let t = table("PTS", &["", "5", "—", "10"]);
        assert_eq!(order(&sort_by(&t, "PTS", Direction::Asc)), vec!["t1", "t3", "t0", "t2"]);
        assert_eq!(order(&sort_by(&t, "PTS", Direction::Desc)), vec!["t3", "t1", "t0", "t2"]);
    }

    #[test]
    fn test_numbers_before_text() {
        let t = table("X", &["beta", "3", "alpha", "1"]);
        assert_eq!(order(&sort_by(&t, "X", Direction::Asc)), vec!["t3", "t1", "t2", "t0"]);
        assert_eq!(order(&sort_by(&t, "X", Direction::Desc)), vec!["t1", "t3", "t0", "t2"]);
    }

    #[test]
    fn test_genuine_zero_before_dash_zero() {
        let t = table("TO", &["—0", "0", "1"]);
        assert_eq!(order(&sort_by(&t, "TO", Direction::Asc)), vec!["t1", "t0", "t2"]);
        assert_eq!(order(&sort_by(&t, "TO", Direction::Desc)), vec!["t2", "t1", "t0"]);
    }

    #[test]
    fn test_stable_on_ties() {
        let t = table("W", &["3", "1", "3", "1"]);
        assert_eq!(order(&sort_by(&t, "W", Direction::Asc)), vec!["t1", "t3", "t0", "t2"]);
        assert_eq!(order(&sort_by(&t, "W", Direction::Desc)), vec!["t0", "t2", "t1", "t3"]);
    }

    #[test]
    fn test_percent_notations_compare_equal() {
        assert_eq!(compare_cells("54.3%", "0.543", Direction::Asc), Ordering::Equal);
        assert_eq!(compare_cells("1,234", "999", Direction::Asc), Ordering::Greater);
    }

    #[test]
    fn test_natural_text_order() {
        assert_eq!(natural_cmp("A2", "a10"), Ordering::Less);
        assert_eq!(natural_cmp("Γ1", "Γ2"), Ordering::Less);
        assert_eq!(natural_cmp("b", "A"), Ordering::Greater);
        assert_eq!(natural_cmp("x007", "x7").reverse(), natural_cmp("x7", "x007"));
    }

    #[test]
    fn test_sort_table_in_place() {
        let mut t = table("TO", &["12", "8"]);
        sort_table(&mut t, "TO", Direction::Asc);
        assert_eq!(t.records[0].value("Team"), "t1");
    }

    #[test]
    fn test_numeric_rank_order() {
        let t = table("Rank", &["3", "", "1", "x", "2"]);
        let sorted = sort_by_numeric_rank(&t, "Rank");
        assert_eq!(order(&sorted), vec!["t2", "t4", "t0", "t1", "t3"]);
    }

    #[test]
    fn test_category_leaders_polarity() {
        let t = table("TO", &["12", "8", "15", "", "10"]);
        let leaders = category_leaders(&t, "Team", &StatKey::new("TO", false), 2);
        assert_eq!(leaders.top, vec!["t1", "t4"]);
        assert_eq!(leaders.bottom, vec!["t0", "t2"]);

        let leaders = category_leaders(&t, "Team", &StatKey::new("TO", true), 1);
        assert_eq!(leaders.top, vec!["t2"]);
        assert_eq!(leaders.bottom, vec!["t1"]);
    }

    #[test]
    fn test_podiums_grouped_in_natural_order() {
        let rows = [
            ("a", "League 10", "1"),
            ("b", "League 2", "2"),
            ("c", "League 2", "1"),
            ("d", "League 10", "2"),
            ("e", "", "1"),
            ("f", "League 2", "3"),
        ];
        let records = rows
            .iter()
            .map(|(team, league, rank)| {
                Record::new(vec![
                    ("Team".into(), team.to_string()),
                    ("League".into(), league.to_string()),
                    ("League Ranking".into(), rank.to_string()),
                ])
            })
            .collect();
        let t = Table::new(vec![], records);

        let podiums = podiums(&t, "League", "League Ranking", 2);
        assert_eq!(podiums.len(), 2);
        assert_eq!(podiums[0].group, "League 2");
        assert_eq!(podiums[0].total, 3);
        let top: Vec<&str> = podiums[0].top.iter().map(|r| r.value("Team")).collect();
        assert_eq!(top, vec!["c", "b"]);
        assert_eq!(podiums[1].group, "League 10");
    }
}
