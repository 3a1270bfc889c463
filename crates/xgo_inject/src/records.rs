//! Replacement bodies kept for debugging consumers.

use std::collections::BTreeMap;

use serde::Serialize;
use xgo_common::Interner;

use crate::ir::Stmt;

/// One installed replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRecord {
    /// Import path of the package.
    pub package: String,
    /// Name of the rewritten function.
    pub func: String,
    /// The body that was installed.
    pub body: Vec<Stmt>,
}

#[derive(Serialize)]
struct RenderedRecord<'a> {
    package: &'a str,
    func: &'a str,
    body: Vec<String>,
}

/// Replacement bodies keyed by package and function.
#[derive(Debug, Clone, Default)]
pub struct RewriteRecords {
    records: BTreeMap<(String, String), RewriteRecord>,
}

impl RewriteRecords {
    /// Creates an empty record set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the body installed into `func` of `package`.
    pub fn record(&mut self, package: &str, func: &str, body: Vec<Stmt>) {
        self.records.insert(
            (package.to_string(), func.to_string()),
            RewriteRecord {
                package: package.to_string(),
                func: func.to_string(),
                body,
            },
        );
    }

    /// The replacement recorded for `func` of `package`.
    pub fn get(&self, package: &str, func: &str) -> Option<&RewriteRecord> {
        self.records.get(&(package.to_string(), func.to_string()))
    }

    /// Number of rewritten functions.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing was rewritten.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over records ordered by package then function.
    pub fn iter(&self) -> impl Iterator<Item = &RewriteRecord> {
        self.records.values()
    }

    /// Renders every record as JSON, bodies as Go source lines.
    pub fn to_json(&self, interner: &Interner) -> serde_json::Result<String> {
        let rendered: Vec<RenderedRecord<'_>> = self
            .iter()
            .map(|r| RenderedRecord {
                package: &r.package,
                func: &r.func,
                body: r.body.iter().map(|s| s.render(interner)).collect(),
            })
            .collect();
        serde_json::to_string_pretty(&rendered)
    }
}
