//! Agent loop: tool-call accumulation, event translation and the run driver.

pub mod accumulator;
pub mod instructions;
pub mod runner;
pub mod translator;
pub mod types;

pub use accumulator::{CompletedCall, ToolCallAccumulator};
pub use instructions::InstructionScope;
pub use runner::{RunDriver, RunRequest, UpdateSink};
pub use translator::{EventTranslator, RoundTripEnd, TranslatorContext};
pub use types::{RunId, RunOutcome, RunStatus};
