pub mod arith;
pub mod catalog;
pub mod error;
pub mod event;
pub mod gate;
pub mod lessons;
pub mod log;
pub mod machine;
pub mod rule;

pub use arith::{BusProblem, ConvergenceRow, FibonacciTable};
pub use catalog::{Catalog, Checkpoint, Module, Reward, Subproblem};
pub use error::{DtmError, DtmResult};
pub use event::{Correctness, EventKind, InteractionEvent};
pub use gate::{CompletionStatus, Roster, Scoreboard};
pub use log::{InteractionLog, LogStats, MemoryLog};
pub use machine::{Navigation, ProgressState, QuizMachine, SubmitOutcome};
pub use rule::AnswerRule;
