//! The lookup pipeline: refresh-if-due, membership, tally.
//!
//! Front ends (Telegram handlers, the CLI) hand this a list of candidate
//! strings and render the outcomes. Failure policy: a failed index refresh is
//! logged and the stale snapshot keeps serving; a failed ledger bump is logged
//! and that outcome carries a verdict without the tally. Neither failure
//! reaches the end user as an error.

use crate::code::CodeKey;
use crate::index::CodeIndex;
use crate::ledger::{BumpStats, CheckLedger};

/// Result of checking one code.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub code: CodeKey,
    pub known: bool,
    /// `None` when the ledger was unavailable for this bump.
    pub stats: Option<BumpStats>,
}

pub struct Checker {
    index: CodeIndex,
    ledger: CheckLedger,
}

impl Checker {
    pub fn new(index: CodeIndex, ledger: CheckLedger) -> Self {
        Self { index, ledger }
    }

    pub fn index(&self) -> &CodeIndex {
        &self.index
    }

    pub fn ledger(&self) -> &CheckLedger {
        &self.ledger
    }

    /// Check a batch of raw candidate strings. Blank candidates are dropped;
    /// everything else yields an outcome.
    pub fn check_all<I, S>(&self, raw_codes: I) -> Vec<CheckOutcome>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Err(err) = self.index.maybe_reload() {
            tracing::warn!(error = %err, "index refresh failed; serving stale snapshot");
        }

        raw_codes
            .into_iter()
            .filter_map(|raw| {
                let code = CodeKey::parse(raw.as_ref())?;
                Some(self.check_code(code))
            })
            .collect()
    }

    fn check_code(&self, code: CodeKey) -> CheckOutcome {
        let known = self.index.contains(&code);
        let stats = match self.ledger.bump(&code, known) {
            Ok(stats) => Some(stats),
            Err(err) => {
                tracing::error!(code = %code, error = %err, "ledger bump failed; replying without tally");
                None
            }
        };
        CheckOutcome { code, known, stats }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;
    use crate::index::{CodeSource, SourceError};

    struct StaticSource {
        rows: Mutex<Result<Vec<Vec<String>>, ()>>,
    }

    impl StaticSource {
        fn new(codes: &[&str]) -> Self {
            Self {
                rows: Mutex::new(Ok(vec![
                    codes.iter().map(|c| c.to_string()).collect(),
                ])),
            }
        }

        fn fail(&self) {
            *self.rows.lock().unwrap() = Err(());
        }
    }

    impl CodeSource for StaticSource {
        fn fetch(&self) -> Result<Vec<Vec<String>>, SourceError> {
            self.rows
                .lock()
                .unwrap()
                .clone()
                .map_err(|()| SourceError::Transport("down".to_string()))
        }
    }

    fn checker_with(codes: &[&str], ttl: Duration) -> (TempDir, Checker) {
        let temp = TempDir::new().unwrap();
        let index = CodeIndex::new(Box::new(StaticSource::new(codes)), ttl);
        index.load().unwrap();
        let ledger = CheckLedger::open(temp.path().join("checks.sqlite")).unwrap();
        (temp, Checker::new(index, ledger))
    }

    #[test]
    fn known_and_unknown_codes_get_tallied() {
        let (_temp, checker) = checker_with(&["ABC123", "XYZ999"], Duration::from_secs(300));

        let outcomes = checker.check_all(["abc123", "notacode"]);
        assert_eq!(outcomes.len(), 2);

        assert!(outcomes[0].known);
        assert_eq!(outcomes[0].stats.unwrap().count, 1);
        assert!(!outcomes[1].known);
        assert_eq!(outcomes[1].stats.unwrap().count, 1);

        let again = checker.check_all(["abc123"]);
        assert!(again[0].known);
        assert_eq!(again[0].stats.unwrap().count, 2);
    }

    #[test]
    fn case_and_whitespace_variants_share_one_row() {
        let (_temp, checker) = checker_with(&["ABC-1"], Duration::from_secs(300));

        checker.check_all(["abc-1"]);
        let outcomes = checker.check_all([" ABC-1 "]);
        assert_eq!(outcomes[0].stats.unwrap().count, 2);
    }

    #[test]
    fn blank_candidates_are_dropped() {
        let (_temp, checker) = checker_with(&["ABC"], Duration::from_secs(300));
        let outcomes = checker.check_all(["", "   ", "abc"]);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].code.as_str(), "ABC");
    }

    #[test]
    fn refresh_failure_serves_stale_snapshot() {
        let temp = TempDir::new().unwrap();
        let source = std::sync::Arc::new(StaticSource::new(&["STALE1"]));
        let index = CodeIndex::new(Box::new(std::sync::Arc::clone(&source)), Duration::ZERO);
        index.load().unwrap();
        let ledger = CheckLedger::open(temp.path().join("checks.sqlite")).unwrap();
        let checker = Checker::new(index, ledger);

        // Every check is refresh-due (ttl zero); break the source and verify
        // the stale snapshot still answers.
        source.fail();
        let outcomes = checker.check_all(["stale1"]);
        assert!(outcomes[0].known);
        assert_eq!(outcomes[0].stats.unwrap().count, 1);
    }
}
