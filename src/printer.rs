//! The engine that turns walked entries into output.
//!
//! The printer knows nothing about traversal. For each root it drives the
//! adapter's walk, asks the adapter whether an entry qualifies, reserves a
//! unit of the shared budget, reads the body and hands it to a formatter.

use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;

use crate::budget::FileBudget;
use crate::errors::PrinError;
use crate::output::{formatter_for, Formatter, HeaderFormatter, OutputTag};
use crate::source::{Entry, SourceAdapter};

/// How the walk of one root ended.
#[derive(Debug)]
pub enum RootOutcome {
    /// The walk ran to completion.
    Completed,
    /// The shared budget ran out. Nothing more prints in this run.
    BudgetExhausted,
    /// The root could not be walked. Other roots are unaffected.
    Failed(PrinError),
}

impl RootOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RootOutcome::BudgetExhausted)
    }
}

/// Counters across every root a printer has handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrintStats {
    pub printed: usize,
    pub skipped: usize,
    pub duplicates: usize,
    /// Entries emitted binary-flagged because their body could not be read.
    pub read_failures: usize,
}

pub struct Printer<'b> {
    tag: OutputTag,
    formatter: Box<dyn Formatter + Send + Sync>,
    budget: &'b FileBudget,
    seen: HashSet<(String, PathBuf)>,
    stats: PrintStats,
}

impl<'b> Printer<'b> {
    pub fn new(tag: OutputTag, budget: &'b FileBudget) -> Self {
        Self {
            tag,
            formatter: formatter_for(tag),
            budget,
            seen: HashSet::new(),
            stats: PrintStats::default(),
        }
    }

    /// Print paths only, whatever tag was chosen. Overriding a tag other
    /// than the default one is worth a warning.
    pub fn headers_only(mut self, enabled: bool) -> Self {
        if enabled {
            if self.tag != OutputTag::default() {
                tracing::warn!(tag = %self.tag, "headers-only mode overrides the requested tag");
            } else {
                tracing::debug!("headers-only mode, bodies suppressed");
            }
            self.formatter = Box::new(HeaderFormatter);
        }
        self
    }

    pub fn tag(&self) -> OutputTag {
        self.tag
    }

    pub fn stats(&self) -> PrintStats {
        self.stats
    }

    pub fn budget(&self) -> &FileBudget {
        self.budget
    }

    /// Walk one root and print what qualifies.
    ///
    /// `root` is `None` for the adapter's default root. Only write errors
    /// are returned as `Err`; a root that cannot be walked is reported as
    /// [`RootOutcome::Failed`].
    pub fn print_root(
        &mut self,
        adapter: &dyn SourceAdapter,
        pattern: &str,
        root: Option<&str>,
        out: &mut dyn Write,
    ) -> Result<RootOutcome, PrinError> {
        if self.budget.spent() {
            return Ok(RootOutcome::BudgetExhausted);
        }
        let roots: Vec<String> = root.map(str::to_string).into_iter().collect();
        let source_id = adapter.source_id();
        tracing::info!(source = adapter.name(), root = root.unwrap_or("."), "walking");

        for item in adapter.walk(pattern, &roots, self.budget) {
            let entry = match item {
                Ok(entry) => entry,
                Err(e) => return Ok(RootOutcome::Failed(e)),
            };
            let key = (source_id.clone(), entry.path.clone());
            if self.seen.contains(&key) {
                tracing::debug!(path = %entry.display, "already printed");
                self.stats.duplicates += 1;
                continue;
            }
            if !adapter.should_print(&entry) {
                self.stats.skipped += 1;
                continue;
            }
            if !self.budget.try_consume() {
                return Ok(RootOutcome::BudgetExhausted);
            }
            self.emit(adapter, &entry, out)?;
            self.seen.insert(key);
            self.stats.printed += 1;
            if self.budget.spent() {
                out.flush()?;
                return Ok(RootOutcome::BudgetExhausted);
            }
        }
        out.flush()?;
        if self.budget.spent() {
            return Ok(RootOutcome::BudgetExhausted);
        }
        Ok(RootOutcome::Completed)
    }

    fn emit(
        &mut self,
        adapter: &dyn SourceAdapter,
        entry: &Entry,
        out: &mut dyn Write,
    ) -> Result<(), PrinError> {
        let rendered = match adapter.read_body(entry) {
            Ok(body) if body.is_binary => self.formatter.binary(&entry.display),
            Ok(body) => self.formatter.text(&entry.display, &body.text()),
            Err(e) => {
                tracing::warn!(path = %entry.display, error = %e, "read failed, printing as binary");
                self.stats.read_failures += 1;
                self.formatter.binary(&entry.display)
            }
        };
        out.write_all(rendered.as_bytes())?;
        Ok(())
    }
}
