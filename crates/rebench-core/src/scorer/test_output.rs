//! Test-framework summary parsers.
//!
//! Each parser is a pure function of the captured output and returns `None`
//! when it does not recognize it. [`ParserChain`] tries them in order and
//! the first match wins.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::test_run::TestCounts;

pub trait OutputParser: Send + Sync {
    /// Framework label reported as `parsedFramework`.
    fn framework(&self) -> &'static str;

    fn parse(&self, output: &str) -> Option<TestCounts>;
}

static CARGO_RESULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"test result: \w+\. (\d+) passed; (\d+) failed; (\d+) ignored")
        .expect("valid regex")
});

static PYTEST_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^=*[ \t]*(\d+ (?:passed|failed|errors?|errored|skipped).*?) in [\d.]+s\b.*$")
        .expect("valid regex")
});

static PYTEST_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) (passed|failed|errors?|errored|skipped)").expect("valid regex")
});

static GO_RESULT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*--- (PASS|FAIL|SKIP): ").expect("valid regex"));

static JEST_TESTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Tests:\s+(.*\d+ total)\s*$").expect("valid regex"));

static VITEST_TESTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*Tests\s+(.*)\(\d+\)\s*$").expect("valid regex"));

static COUNT_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) (passed|failed|skipped|todo)").expect("valid regex"));

fn num(text: &str) -> u64 {
    text.parse().unwrap_or(0)
}

/// `test result: ok. N passed; N failed; N ignored; ...`, summed over all
/// crates and doc-test runs. Ignored tests count as skipped.
pub struct CargoTestParser;

impl OutputParser for CargoTestParser {
    fn framework(&self) -> &'static str {
        "cargo-test"
    }

    fn parse(&self, output: &str) -> Option<TestCounts> {
        let mut counts: Option<TestCounts> = None;
        for caps in CARGO_RESULT.captures_iter(output) {
            let c = counts.get_or_insert_with(TestCounts::default);
            c.passed += num(&caps[1]);
            c.failed += num(&caps[2]);
            c.skipped += num(&caps[3]);
        }
        counts
    }
}

/// `===== 5 passed, 2 failed, 1 error in 3.45s =====`. Errors count as
/// failures; the last summary line wins.
pub struct PytestParser;

impl OutputParser for PytestParser {
    fn framework(&self) -> &'static str {
        "pytest"
    }

    fn parse(&self, output: &str) -> Option<TestCounts> {
        let summary = PYTEST_SUMMARY.captures_iter(output).last()?;
        let mut counts = TestCounts::default();
        for caps in PYTEST_COUNT.captures_iter(&summary[1]) {
            let n = num(&caps[1]);
            match &caps[2] {
                "passed" => counts.passed += n,
                "skipped" => counts.skipped += n,
                _ => counts.failed += n,
            }
        }
        Some(counts)
    }
}

/// Counts `--- PASS:` / `--- FAIL:` / `--- SKIP:` lines from `go test -v`.
pub struct GoTestParser;

impl OutputParser for GoTestParser {
    fn framework(&self) -> &'static str {
        "go-test"
    }

    fn parse(&self, output: &str) -> Option<TestCounts> {
        let mut counts: Option<TestCounts> = None;
        for caps in GO_RESULT.captures_iter(output) {
            let c = counts.get_or_insert_with(TestCounts::default);
            match &caps[1] {
                "PASS" => c.passed += 1,
                "FAIL" => c.failed += 1,
                _ => c.skipped += 1,
            }
        }
        counts
    }
}

/// `Tests:       1 failed, 2 skipped, 10 passed, 13 total`.
pub struct JestParser;

impl OutputParser for JestParser {
    fn framework(&self) -> &'static str {
        "jest"
    }

    fn parse(&self, output: &str) -> Option<TestCounts> {
        let line = JEST_TESTS.captures_iter(output).last()?;
        Some(count_words(&line[1]))
    }
}

/// `      Tests  1 failed | 12 passed | 2 skipped (15)`.
pub struct VitestParser;

impl OutputParser for VitestParser {
    fn framework(&self) -> &'static str {
        "vitest"
    }

    fn parse(&self, output: &str) -> Option<TestCounts> {
        let line = VITEST_TESTS.captures_iter(output).last()?;
        let counts = count_words(&line[1]);
        (counts.total() > 0).then_some(counts)
    }
}

/// Shared by jest and vitest; `todo` is reported as skipped.
fn count_words(text: &str) -> TestCounts {
    let mut counts = TestCounts::default();
    for caps in COUNT_WORD.captures_iter(text) {
        let n = num(&caps[1]);
        match &caps[2] {
            "passed" => counts.passed += n,
            "failed" => counts.failed += n,
            _ => counts.skipped += n,
        }
    }
    counts
}

/// Ordered parser registry.
pub struct ParserChain {
    parsers: Vec<Box<dyn OutputParser>>,
}

impl Default for ParserChain {
    fn default() -> Self {
        Self::standard()
    }
}

impl ParserChain {
    pub fn empty() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// cargo test, pytest, go test, jest, vitest.
    pub fn standard() -> Self {
        Self::empty()
            .with(CargoTestParser)
            .with(PytestParser)
            .with(GoTestParser)
            .with(JestParser)
            .with(VitestParser)
    }

    /// Append a parser after the ones already registered.
    pub fn with(mut self, parser: impl OutputParser + 'static) -> Self {
        self.parsers.push(Box::new(parser));
        self
    }

    pub fn frameworks(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|p| p.framework()).collect()
    }

    pub fn parse(&self, output: &str) -> Option<(&'static str, TestCounts)> {
        self.parsers
            .iter()
            .find_map(|p| p.parse(output).map(|counts| (p.framework(), counts)))
    }
}
