//! Objective scorers over workspace state.
//!
//! - [`diff`]       : `DiffScorer`, file-level precision/recall/F1 against ground truth
//! - [`test_output`]: `OutputParser` implementations and the ordered `ParserChain`
//! - [`test`]       : `TestScorer`, runs a test command and parses its summary
//! - [`injection`]  : `InjectionScore`, usage of proactively injected context files

pub mod diff;
pub mod injection;
pub mod test_output;

pub use diff::DiffScorer;
pub use injection::{score_correctness, InjectionScore};
pub use test::TestScorer;
pub use test_output::{
    CargoTestParser, GoTestParser, JestParser, OutputParser, ParserChain, PytestParser,
    VitestParser,
};
