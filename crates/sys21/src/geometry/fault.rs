use derive_more::Display;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Fixed-capacity buffers whose overflow halts rendering.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Buffer {
    #[display("transfer queue")]
    TransferQueue,
    #[display("slave accumulator")]
    SlaveAccumulator,
    #[display("polygon parameter buffer")]
    PolygonParameters,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Desync {
    #[error("accumulator opened with a zero word count")]
    ZeroDeclaredCount,
    #[error("direct-draw payload of {len} words (expected 13)")]
    DirectDrawLength { len: usize },
    #[error("quad chain at point RAM offset {offset:#x} has no end marker")]
    UnterminatedQuadChain { offset: usize },
    #[error("display list walk from {start:#06x} did not terminate")]
    RunawayDisplayList { start: u16 },
    #[error("malformed polygon record ({words} words)")]
    MalformedPolygon { words: usize },
    #[error("direct-draw buffer full, dropped {word:#06x}")]
    DirectDrawBufferFull { word: u16 },
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FaultReason {
    #[error("{0} overflow")]
    Overflow(Buffer),
    #[error("protocol desync: {0}")]
    Desync(#[from] Desync),
    #[error("point RAM index {index:#x} wrapped")]
    IndexWrap { index: usize },
}

/// The event the owning machine sees for anything that went wrong inside the
/// pipeline.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("pipeline fault: {reason}")]
pub struct PipelineFault {
    pub reason: FaultReason,
}

impl PipelineFault {
    /// Overflows stop rendering until the next kickstart; everything else is
    /// logged and rendering carries on.
    pub fn is_fatal(&self) -> bool {
        matches!(self.reason, FaultReason::Overflow(_))
    }
}

#[derive(Debug, Default)]
pub struct FaultLog {
    pending: Vec<PipelineFault>,
}

impl FaultLog {
    pub fn record(&mut self, reason: FaultReason) {
        match reason {
            FaultReason::Overflow(buffer) => error!("{buffer} overflow"),
            FaultReason::Desync(desync) => warn!("protocol desync: {desync}"),
            FaultReason::IndexWrap { index } => debug!("point RAM index {index:#x} wrapped"),
        }
        self.pending.push(PipelineFault { reason });
    }

    pub fn has_fatal(&self) -> bool {
        self.pending.iter().any(PipelineFault::is_fatal)
    }

    pub fn take(&mut self) -> Vec<PipelineFault> {
        std::mem::take(&mut self.pending)
    }
}
