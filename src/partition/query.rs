//! Partition Query Builder
//!
//! Queries are kept structured so that a store can either render them to SQL
//! ([`Query::sql`]) or evaluate the predicate directly (see `MemoryStore`).
//!
//! SQL dialect is PostgreSQL. The bin expression takes the character at
//! 1-based position `char_length(key) - h`; out-of-range positions and
//! non-digits fall back to bin 0, matching [`super::extract_bin`].

use serde::Serialize;
use std::fmt;

use super::heuristic::{BinId, Heuristic};
use crate::error::ConfigurationError;

/// Validated table + key field pair a benchmark runs against
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableTarget {
    table: String,
    key_field: String,
}

impl TableTarget {
    /// Validate both identifiers. They are spliced into SQL text verbatim.
    pub fn new(table: &str, key_field: &str) -> Result<Self, ConfigurationError> {
        validate_identifier("table", table)?;
        validate_identifier("key_field", key_field)?;
        Ok(Self {
            table: table.to_string(),
            key_field: key_field.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// SQL expression yielding the bin id of `alias.key_field`
    pub fn bin_expr(&self, alias: &str, heuristic: Heuristic) -> String {
        let key = format!("{}.{}::TEXT", alias, self.key_field);
        format!(
            "COALESCE(NULLIF(regexp_replace(substring({key} FROM char_length({key}) - {h} FOR 1), '[^0-9]', '', 'g'), '')::INTEGER, 0)",
            key = key,
            h = heuristic.index()
        )
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`, optionally dotted (`schema.table`)
fn validate_identifier(kind: &'static str, value: &str) -> Result<(), ConfigurationError> {
    if value.is_empty() {
        return Err(ConfigurationError::EmptyIdentifier(kind));
    }
    let valid = value.split('.').all(|part| {
        let mut chars = part.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    });
    if !valid {
        return Err(ConfigurationError::InvalidIdentifier {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Row count per bin under one heuristic. Result columns: `bin`, `cnt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinCountQuery {
    pub target: TableTarget,
    pub heuristic: Heuristic,
}

impl BinCountQuery {
    pub fn new(target: TableTarget, heuristic: Heuristic) -> Self {
        Self { target, heuristic }
    }

    pub fn sql(&self) -> String {
        format!(
            "SELECT ({expr})::BIGINT AS bin, COUNT(*)::BIGINT AS cnt FROM (SELECT * FROM {table}) AS tmp GROUP BY bin",
            expr = self.target.bin_expr("tmp", self.heuristic),
            table = self.target.table()
        )
    }
}

/// All rows whose bin is `bin_id` or one of `extra_bin_ids`.
/// Result columns: `bin` followed by every column of the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionQuery {
    pub target: TableTarget,
    pub heuristic: Heuristic,
    pub bin_id: BinId,
    pub extra_bin_ids: Vec<BinId>,
}

impl PartitionQuery {
    /// Every bin this query reads, own bin first
    pub fn bins(&self) -> impl Iterator<Item = BinId> + '_ {
        std::iter::once(self.bin_id).chain(self.extra_bin_ids.iter().copied())
    }

    pub fn covers(&self, bin: BinId) -> bool {
        self.bins().any(|b| b == bin)
    }

    /// Does `key` fall inside this partition?
    pub fn matches(&self, key: &str) -> bool {
        self.covers(self.heuristic.bin_of(key))
    }

    pub fn sql(&self) -> String {
        let mut sql = format!(
            "SELECT * FROM (SELECT {expr} AS bin, tmp.* FROM (SELECT * FROM {table}) AS tmp) AS data WHERE data.bin = {bin}",
            expr = self.target.bin_expr("tmp", self.heuristic),
            table = self.target.table(),
            bin = self.bin_id
        );
        for extra in &self.extra_bin_ids {
            sql.push_str(&format!(" OR data.bin = {}", extra));
        }
        sql
    }
}

/// Build the query for one partition. Pass an empty slice for disjoint runs.
pub fn build_partition_query(
    target: &TableTarget,
    heuristic: Heuristic,
    bin_id: BinId,
    extra_bin_ids: &[BinId],
) -> PartitionQuery {
    let mut extras: Vec<BinId> = extra_bin_ids
        .iter()
        .copied()
        .filter(|&b| b != bin_id)
        .collect();
    extras.sort_unstable();
    extras.dedup();

    PartitionQuery {
        target: target.clone(),
        heuristic,
        bin_id,
        extra_bin_ids: extras,
    }
}

/// Query text handed to a store connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Query {
    BinCounts(BinCountQuery),
    Partition(PartitionQuery),
    Raw { sql: String },
}

impl Query {
    pub fn raw(sql: impl Into<String>) -> Self {
        Query::Raw { sql: sql.into() }
    }

    pub fn sql(&self) -> String {
        match self {
            Query::BinCounts(q) => q.sql(),
            Query::Partition(q) => q.sql(),
            Query::Raw { sql } => sql.clone(),
        }
    }
}

impl From<BinCountQuery> for Query {
    fn from(q: BinCountQuery) -> Self {
        Query::BinCounts(q)
    }
}

impl From<PartitionQuery> for Query {
    fn from(q: PartitionQuery) -> Self {
        Query::Partition(q)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql())
    }
}
