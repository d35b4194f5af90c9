//! Delta protocol: operations, payloads, routed envelopes and replay.

pub mod envelope;
pub mod operation;
pub mod payload;
pub mod replay;

pub use envelope::{
    AIContentUpdate, ChatMessageUpdate, FrameKey, RunUpdate, UpdateEnvelope, UpdateLevel,
};
pub use operation::{DeltaOperation, DeltaPayload, OperationKind};
pub use payload::{ContentDelta, ContentKind, MessageDelta, RunDelta};
pub use replay::{apply_operation, EnvelopeReplayer, FramingValidator, ReplayedMessage};
