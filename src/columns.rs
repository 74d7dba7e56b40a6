//! Header column auto-detection shared by all format adapters.
//!
//! Upstream CSV headers vary in language, casing and exact wording across
//! feeds and over time, so each adapter declares an ordered table of
//! (logical column, matcher patterns). Detection walks the table in order:
//! for each logical column, patterns are tried in priority order and the
//! first unclaimed header cell that matches wins. This keeps the matching
//! rules data-driven and unit-testable; new header variants are new table
//! entries, not new control flow.

use csv::StringRecord;
use std::collections::HashMap;

use crate::error::ParseError;

/// Attach the source line number to a CSV-level read failure.
pub fn read_record(
    result: Result<StringRecord, csv::Error>,
) -> Result<StringRecord, ParseError> {
    result.map_err(|e| ParseError::Csv {
        line: e.position().map(|p| p.line() as usize).unwrap_or(0),
        source: e,
    })
}

pub fn line_of(record: &StringRecord) -> usize {
    record.position().map(|p| p.line() as usize).unwrap_or(0)
}

#[derive(Debug, Clone, Copy)]
pub enum Pattern {
    /// Cell equals the token after trimming and lowercasing.
    Exact(&'static str),
    /// Cell contains the token after trimming and lowercasing.
    Contains(&'static str),
}

impl Pattern {
    fn matches(&self, cell: &str) -> bool {
        match self {
            Pattern::Exact(token) => cell == *token,
            Pattern::Contains(token) => cell.contains(token),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub patterns: &'static [Pattern],
}

/// Logical column name → header index, for one parsed header row.
#[derive(Debug, Default)]
pub struct ColumnMap {
    indices: HashMap<&'static str, usize>,
}

impl ColumnMap {
    pub fn get(&self, name: &str) -> Option<usize> {
        self.indices.get(name).copied()
    }

    /// Error with the full found-header context when any required logical
    /// column is absent; diagnosing a feed change must not need a re-run.
    pub fn require(
        &self,
        names: &[&'static str],
        header: &StringRecord,
    ) -> Result<(), ParseError> {
        let missing: Vec<&'static str> = names
            .iter()
            .filter(|n| !self.indices.contains_key(*n))
            .copied()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(ParseError::MissingColumns {
            missing,
            found: header.iter().map(|c| c.trim().to_string()).collect(),
        })
    }
}

fn normalize_cell(cell: &str) -> String {
    cell.trim().to_lowercase()
}

/// Detect columns per the ordered table semantics described in the module
/// docs. A header cell is claimed by at most one logical column.
pub fn detect_columns(header: &StringRecord, specs: &[ColumnSpec]) -> ColumnMap {
    let cells: Vec<String> = header.iter().map(normalize_cell).collect();
    let mut claimed = vec![false; cells.len()];
    let mut map = ColumnMap::default();

    for spec in specs {
        'spec: for pattern in spec.patterns {
            for (i, cell) in cells.iter().enumerate() {
                if claimed[i] || cell.is_empty() {
                    continue;
                }
                if pattern.matches(cell) {
                    claimed[i] = true;
                    map.indices.insert(spec.name, i);
                    break 'spec;
                }
            }
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(cells: &[&str]) -> StringRecord {
        StringRecord::from(cells.to_vec())
    }

    const SPECS: &[ColumnSpec] = &[
        ColumnSpec {
            name: "date",
            patterns: &[Pattern::Contains("date"), Pattern::Exact("日付")],
        },
        ColumnSpec {
            name: "price",
            patterns: &[
                Pattern::Exact("tokyo_price"),
                Pattern::Exact("東京価格"),
                Pattern::Contains("price"),
            ],
        },
    ];

    #[test]
    fn exact_pattern_outranks_generic_contains() {
        // "Kansai_Price" appears before "Tokyo_Price"; the exact matcher
        // must still pick the tokyo column over the positional one.
        let header = record(&["Date", "Kansai_Price", "Tokyo_Price"]);
        let map = detect_columns(&header, SPECS);
        assert_eq!(map.get("date"), Some(0));
        assert_eq!(map.get("price"), Some(2));
    }

    #[test]
    fn generic_fallback_applies_when_exact_absent() {
        let header = record(&["日付", "Spot Price"]);
        let map = detect_columns(&header, SPECS);
        assert_eq!(map.get("date"), Some(0));
        assert_eq!(map.get("price"), Some(1));
    }

    #[test]
    fn japanese_headers_match_exact_tokens() {
        let header = record(&["日付", "東京価格"]);
        let map = detect_columns(&header, SPECS);
        assert_eq!(map.get("price"), Some(1));
    }

    #[test]
    fn a_cell_is_claimed_at_most_once() {
        // A single "date" cell must not satisfy both logical columns even
        // if a later spec's Contains pattern would match it.
        let specs: &[ColumnSpec] = &[
            ColumnSpec {
                name: "date",
                patterns: &[Pattern::Contains("date")],
            },
            ColumnSpec {
                name: "update",
                patterns: &[Pattern::Contains("date")],
            },
        ];
        let header = record(&["DATE"]);
        let map = detect_columns(&header, specs);
        assert_eq!(map.get("date"), Some(0));
        assert_eq!(map.get("update"), None);
    }

    #[test]
    fn require_reports_missing_and_found() {
        let header = record(&["Date", "Volume"]);
        let map = detect_columns(&header, SPECS);
        let err = map.require(&["date", "price"], &header).unwrap_err();
        match err {
            ParseError::MissingColumns { missing, found } => {
                assert_eq!(missing, vec!["price"]);
                assert_eq!(found, vec!["Date".to_string(), "Volume".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
