//! End-to-end pipeline tests over a fake source and a temp ledger.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::time::Duration;

use codecheck::{CheckLedger, Checker, CodeIndex, CodeKey, CodeSource, SourceError};
use tempfile::TempDir;

struct FakeSheet {
    rows: Mutex<Vec<Vec<String>>>,
    fetches: AtomicUsize,
    delay: Duration,
}

impl FakeSheet {
    fn new(codes: &[&str]) -> Arc<Self> {
        Self::with_delay(codes, Duration::ZERO)
    }

    fn with_delay(codes: &[&str], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(vec![codes.iter().map(|c| c.to_string()).collect()]),
            fetches: AtomicUsize::new(0),
            delay,
        })
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl CodeSource for FakeSheet {
    fn fetch(&self) -> Result<Vec<Vec<String>>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(self.rows.lock().unwrap().clone())
    }
}

fn key(raw: &str) -> CodeKey {
    CodeKey::parse(raw).unwrap()
}

fn checker_with(codes: &[&str]) -> (TempDir, Checker) {
    let temp = TempDir::new().unwrap();
    let index = CodeIndex::new(Box::new(FakeSheet::new(codes)), Duration::from_secs(300));
    index.load().unwrap();
    let ledger = CheckLedger::open(temp.path().join("checks.sqlite")).unwrap();
    (temp, Checker::new(index, ledger))
}

#[test]
fn scenario_known_and_unknown_codes_accumulate() {
    let (_temp, checker) = checker_with(&["ABC123", "XYZ999"]);

    let outcomes = checker.check_all(["abc123"]);
    assert!(outcomes[0].known);
    assert_eq!(outcomes[0].stats.unwrap().count, 1);

    let outcomes = checker.check_all(["notacode"]);
    assert!(!outcomes[0].known);
    assert_eq!(outcomes[0].stats.unwrap().count, 1);

    let outcomes = checker.check_all(["abc123"]);
    assert!(outcomes[0].known);
    assert_eq!(outcomes[0].stats.unwrap().count, 2);

    let row = checker.ledger().entry(&key("abc123")).unwrap().unwrap();
    assert!(row.ever_known);
    let row = checker.ledger().entry(&key("notacode")).unwrap().unwrap();
    assert!(!row.ever_known);
}

#[test]
fn concurrent_bumps_lose_no_updates() {
    let temp = TempDir::new().unwrap();
    let ledger = CheckLedger::open(temp.path().join("checks.sqlite")).unwrap();

    for n in [2usize, 10, 100] {
        let code = key(&format!("LOAD-{n}"));
        let barrier = Barrier::new(n);

        std::thread::scope(|scope| {
            for i in 0..n {
                let ledger = &ledger;
                let code = &code;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    ledger.bump(code, i % 2 == 0).unwrap();
                });
            }
        });

        let row = ledger.entry(&code).unwrap().unwrap();
        assert_eq!(row.check_count, n as u64, "lost update at n={n}");
        assert!(row.ever_known);
    }
}

#[test]
fn concurrent_stale_checks_share_one_reload() {
    let source = FakeSheet::with_delay(&["A1"], Duration::from_millis(200));
    let index = CodeIndex::new(Box::new(Arc::clone(&source)), Duration::ZERO);

    let barrier = Barrier::new(2);
    let results = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let index = &index;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    index.maybe_reload().unwrap()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<bool>>()
    });

    assert_eq!(source.fetches(), 1, "redundant fetch despite in-flight reload");
    assert_eq!(results.iter().filter(|reloaded| **reloaded).count(), 1);
}

#[test]
fn ledger_outage_degrades_to_verdict_only() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("checks.sqlite");
    let index = CodeIndex::new(Box::new(FakeSheet::new(&["UP1"])), Duration::from_secs(300));
    index.load().unwrap();
    let ledger = CheckLedger::open(&db_path).unwrap();
    let checker = Checker::new(index, ledger);

    // Take the store away; verdicts must still flow, without the tally.
    std::fs::remove_file(&db_path).unwrap();

    let outcomes = checker.check_all(["up1", "down1"]);
    assert!(outcomes[0].known);
    assert!(outcomes[0].stats.is_none());
    assert!(!outcomes[1].known);
    assert!(outcomes[1].stats.is_none());
}

#[test]
fn tallies_survive_a_restart() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("checks.sqlite");

    {
        let index = CodeIndex::new(Box::new(FakeSheet::new(&["KEEP1"])), Duration::from_secs(300));
        index.load().unwrap();
        let checker = Checker::new(index, CheckLedger::open(&db_path).unwrap());
        checker.check_all(["keep1"]);
    }

    let index = CodeIndex::new(Box::new(FakeSheet::new(&["KEEP1"])), Duration::from_secs(300));
    index.load().unwrap();
    let checker = Checker::new(index, CheckLedger::open(&db_path).unwrap());
    let outcomes = checker.check_all(["keep1"]);
    assert_eq!(outcomes[0].stats.unwrap().count, 2);
}
