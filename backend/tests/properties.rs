use proptest::prelude::*;

use leaguegrid::headers::default_rules;
use leaguegrid::{
    canonicalize, classify, compare_entities, sort_by, Direction, HeaderKey, Record, StatKey,
    Table, ValueKind,
};

const CASES: u32 = 256;

fn header_cell() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Team".to_string()),
        Just("PTS".to_string()),
        Just("PTS_2".to_string()),
        Just(" pts ".to_string()),
        Just("TO".to_string()),
        Just("".to_string()),
        Just("—".to_string()),
        Just("General Standings General Ranking Regular Ranking".to_string()),
        "[A-Za-z%#]{1,4}",
    ]
}

fn stat_cell() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("—".to_string()),
        Just("0".to_string()),
        Just("—0".to_string()),
        (-50i32..50).prop_map(|n| n.to_string()),
        (0u32..1000).prop_map(|n| format!("{}.{}%", n / 10, n % 10)),
        "[a-c]{1,3}",
    ]
}

fn table_of(cells: &[String]) -> Table {
    let records = cells
        .iter()
        .enumerate()
        .map(|(i, v)| {
            Record::new(vec![
                (HeaderKey::new("Id"), i.to_string()),
                (HeaderKey::new("V"), v.clone()),
            ])
        })
        .collect();
    Table::new(vec![HeaderKey::new("Id"), HeaderKey::new("V")], records)
}

fn ids(records: &[&Record]) -> Vec<usize> {
    records
        .iter()
        .map(|r| r.value("Id").parse().unwrap())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(CASES))]

    #[test]
    fn prop_dedup_is_deterministic_and_unique(row in prop::collection::vec(header_cell(), 0..12)) {
        let first = canonicalize(&row, &default_rules());
        let second = canonicalize(&row, &default_rules());
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.len(), row.len());

        let mut seen = std::collections::HashSet::new();
        for key in first.iter().filter(|k| !k.is_blank()) {
            prop_assert!(seen.insert(key.as_str().to_string()), "duplicate key {}", key);
        }
    }

    #[test]
    fn prop_sort_is_stable_and_total(cells in prop::collection::vec(stat_cell(), 0..24), desc in any::<bool>()) {
        let direction = if desc { Direction::Desc } else { Direction::Asc };
        let table = table_of(&cells);

        let once = ids(&sort_by(&table, "V", direction));
        let twice = ids(&sort_by(&table, "V", direction));
        prop_assert_eq!(&once, &twice);

        // Empties last.
        let first_empty = once
            .iter()
            .position(|&i| classify(&cells[i]).kind == ValueKind::Empty)
            .unwrap_or(once.len());
        prop_assert!(once[first_empty..]
            .iter()
            .all(|&i| classify(&cells[i]).kind == ValueKind::Empty));

        // Equal keys keep input order.
        for pair in once.windows(2) {
            let (a, b) = (&cells[pair[0]], &cells[pair[1]]);
            if leaguegrid::rank::compare_cells(a, b, direction) == std::cmp::Ordering::Equal {
                prop_assert!(pair[0] < pair[1]);
            }
        }
    }

    #[test]
    fn prop_reversing_flips_distinct_numbers(values in prop::collection::vec(prop::option::of(-20i32..20), 0..20)) {
        let cells: Vec<String> = values
            .iter()
            .map(|v| v.map(|n| n.to_string()).unwrap_or_default())
            .collect();
        let table = table_of(&cells);
        let asc = ids(&sort_by(&table, "V", Direction::Asc));
        let desc = ids(&sort_by(&table, "V", Direction::Desc));
        let pos = |order: &[usize], id: usize| order.iter().position(|&i| i == id).unwrap();

        for a in 0..values.len() {
            for b in 0..values.len() {
                if let (Some(x), Some(y)) = (values[a], values[b]) {
                    if x != y {
                        prop_assert_eq!(pos(&asc, a) < pos(&asc, b), pos(&desc, a) > pos(&desc, b));
                    }
                }
            }
        }
        // Empties stay last in both directions.
        let filled = values.iter().filter(|v| v.is_some()).count();
        prop_assert!(asc[filled..].iter().all(|&i| values[i].is_none()));
        prop_assert!(desc[filled..].iter().all(|&i| values[i].is_none()));
    }

    #[test]
    fn prop_category_record_is_conserved(
        pairs in prop::collection::vec((stat_cell(), stat_cell(), any::<bool>()), 0..12)
    ) {
        let stats: Vec<StatKey> = (0..pairs.len())
            .map(|i| StatKey::new(format!("S{}", i), pairs[i].2))
            .collect();
        let a = Record::new(
            pairs.iter().enumerate().map(|(i, p)| (HeaderKey::new(format!("S{}", i)), p.0.clone())).collect(),
        );
        let b = Record::new(
            pairs.iter().enumerate().map(|(i, p)| (HeaderKey::new(format!("S{}", i)), p.1.clone())).collect(),
        );

        let ab = compare_entities(&a, &b, &stats);
        prop_assert_eq!(ab.total(), stats.len());
        prop_assert_eq!(ab.wins + ab.losses + ab.ties, stats.len());

        let ba = compare_entities(&b, &a, &stats);
        prop_assert_eq!(ba, ab.flipped());
    }
}
