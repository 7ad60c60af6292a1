// Pipeline stages - batch transforms wiring the core components together
//
// Each stage is a pure function of (paths, rng): build the indexes it
// needs, resolve, allocate ids, append. Stages communicate only through the
// generated tables, so they can be run individually or chained by `all`.

use std::fmt;

pub mod geo;
pub mod layout;
pub mod routes;
pub mod stations;
pub mod trips;

/// Per-stage console summary: how much input was seen, how much of it
/// resolved, what was skipped, and what actually landed in each table.
#[derive(Debug, Default)]
pub struct StageSummary {
    pub stage: &'static str,
    pub loaded: usize,
    pub resolved: usize,
    pub skipped: usize,
    pub appended: Vec<(&'static str, usize)>,
}

impl StageSummary {
    pub fn new(stage: &'static str) -> Self {
        StageSummary {
            stage,
            ..Default::default()
        }
    }

    pub fn record_append(&mut self, table: &'static str, rows: usize) {
        self.appended.push((table, rows));
    }

    pub fn appended_total(&self) -> usize {
        self.appended.iter().map(|(_, n)| n).sum()
    }
}

impl fmt::Display for StageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: loaded {}, resolved {}, skipped {}",
            self.stage, self.loaded, self.resolved, self.skipped
        )?;
        if self.appended.is_empty() {
            write!(f, ", nothing to append")?;
        } else {
            for (table, rows) in &self.appended {
                write!(f, ", {table} +{rows}")?;
            }
        }
        Ok(())
    }
}
