//! Bulk loading from text. Each line is either
//!
//!   `# <key>`                      remove `key`
//!   `<key> <string>* <int>*`       insert, fields in schema order
//!
//! Tokens are separated by spaces or tabs; blank lines are skipped.

use std::io::BufRead;
use log::{debug, info};
use nom::{
    IResult, Parser,
    bytes::complete::is_not,
    character::complete::{char, i32 as int_token, space0, space1},
    combinator::all_consuming,
    multi::separated_list1,
    sequence::delimited,
};

use crate::error::{DbError, DbResult};
use crate::storage::layout::Schema;
use crate::storage::record::Record;
use crate::tree::{AvlTree, InsertOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadCommand {
    Insert { key: i32, record: Record },
    Remove(i32),
}

/// Counts of what a `load` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadSummary {
    pub inserted: usize,
    pub duplicates: usize,
    pub removed: usize,
    /// Removals of keys that were not in the tree.
    pub missing: usize,
}

fn removal(input: &str) -> IResult<&str, i32> {
    all_consuming(delimited((char('#'), space0), int_token, space0)).parse(input)
}

fn tokens(input: &str) -> IResult<&str, Vec<&str>> {
    all_consuming(delimited(space0, separated_list1(space1, is_not(" \t")), space0)).parse(input)
}

fn integer(token: &str) -> IResult<&str, i32> {
    all_consuming(int_token).parse(token)
}

/// Parse one line against `schema`. Returns `None` for a blank line.
pub fn parse_line(line: &str, schema: &Schema) -> DbResult<Option<LoadCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if line.starts_with('#') {
        let (_, key) = removal(line)
            .map_err(|_| DbError::ParseError(format!("expected '# <key>', got '{}'", line)))?;
        return Ok(Some(LoadCommand::Remove(key)));
    }

    let (_, fields) = tokens(line)
        .map_err(|_| DbError::ParseError(format!("cannot split '{}' into fields", line)))?;
    let n = schema.num_string_fields();
    let m = schema.num_int_fields();
    if fields.len() != 1 + n + m {
        return Err(DbError::ParseError(format!(
            "expected a key, {} string and {} int fields, got {} fields",
            n,
            m,
            fields.len()
        )));
    }

    let (_, key) = integer(fields[0])
        .map_err(|_| DbError::ParseError(format!("key '{}' is not an integer", fields[0])))?;
    let strings = fields[1..=n].iter().map(|s| s.to_string()).collect();
    let ints = fields[1 + n..]
        .iter()
        .map(|t| {
            integer(t)
                .map(|(_, v)| v)
                .map_err(|_| DbError::ParseError(format!("int field '{}' is not an integer", t)))
        })
        .collect::<DbResult<Vec<i32>>>()?;

    Ok(Some(LoadCommand::Insert { key, record: Record::new(strings, ints) }))
}

fn at_line(line_no: usize, e: DbError) -> DbError {
    match e {
        DbError::ParseError(msg) => DbError::ParseError(format!("line {}: {}", line_no, msg)),
        DbError::SchemaMismatch(msg) => {
            DbError::SchemaMismatch(format!("line {}: {}", line_no, msg))
        }
        other => other,
    }
}

/// Apply every line of `reader` to `tree`, in order. Stops at the first bad
/// line; lines before it stay applied.
pub fn load<R: BufRead>(tree: &mut AvlTree, reader: R) -> DbResult<LoadSummary> {
    let mut summary = LoadSummary::default();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        let command = parse_line(&line, tree.schema()).map_err(|e| at_line(line_no, e))?;
        match command {
            None => continue,
            Some(LoadCommand::Remove(key)) => {
                if tree.remove(key)? {
                    summary.removed += 1;
                } else {
                    debug!("line {}: key {} not present, nothing removed", line_no, key);
                    summary.missing += 1;
                }
            }
            Some(LoadCommand::Insert { key, record }) => {
                match tree.insert(key, record).map_err(|e| at_line(line_no, e))? {
                    InsertOutcome::Inserted => summary.inserted += 1,
                    InsertOutcome::Duplicate => {
                        debug!("line {}: key {} already present, skipped", line_no, key);
                        summary.duplicates += 1;
                    }
                }
            }
        }
    }
    info!(
        "Loaded {} inserts ({} duplicates), {} removals ({} missing)",
        summary.inserted, summary.duplicates, summary.removed, summary.missing
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(vec![5, 5], 2).unwrap()
    }

    #[test]
    fn parses_insert_lines() {
        let cmd = parse_line("12  alpha\tbeta 3 -4", &schema()).unwrap();
        assert_eq!(
            cmd,
            Some(LoadCommand::Insert {
                key: 12,
                record: Record::new(vec!["alpha".into(), "beta".into()], vec![3, -4]),
            })
        );
    }

    #[test]
    fn parses_removals_with_or_without_space() {
        assert_eq!(parse_line("# 7", &schema()).unwrap(), Some(LoadCommand::Remove(7)));
        assert_eq!(parse_line("#-7", &schema()).unwrap(), Some(LoadCommand::Remove(-7)));
        assert!(matches!(parse_line("#", &schema()), Err(DbError::ParseError(_))));
        assert!(matches!(parse_line("# seven", &schema()), Err(DbError::ParseError(_))));
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(parse_line("", &schema()).unwrap(), None);
        assert_eq!(parse_line("   \t ", &schema()).unwrap(), None);
    }

    #[test]
    fn rejects_wrong_field_counts_and_bad_numbers() {
        assert!(matches!(parse_line("1 a b 2", &schema()), Err(DbError::ParseError(_))));
        assert!(matches!(parse_line("1 a b 2 3 4", &schema()), Err(DbError::ParseError(_))));
        assert!(matches!(parse_line("x a b 2 3", &schema()), Err(DbError::ParseError(_))));
        assert!(matches!(parse_line("1 a b 2 3x", &schema()), Err(DbError::ParseError(_))));
        assert!(matches!(parse_line("1 a b 2 99999999999", &schema()), Err(DbError::ParseError(_))));
    }

    #[test]
    fn line_numbers_are_attached() {
        let e = at_line(4, DbError::SchemaMismatch("too long".into()));
        assert_eq!(e.to_string(), "schema mismatch: line 4: too long");
    }
}
