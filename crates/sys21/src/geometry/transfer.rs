use crate::fifo::Fifo;

use super::fault::{Buffer, FaultReason};

pub const DSP_BUF_MAX: usize = 4096 * 12;

/// Word queue between the master and slave units.
///
/// The slave only learns about queued words through `credit`, which grows by
/// at most one word per [`TransferQueue::tick`]. Reads themselves are not
/// throttled.
pub struct TransferQueue {
    words: Fifo<u16>,
    advertised: usize,
}

impl TransferQueue {
    pub fn new() -> TransferQueue {
        TransferQueue {
            words: Fifo::with_capacity(DSP_BUF_MAX),
            advertised: 0,
        }
    }

    /// Queued and not yet read.
    pub fn available(&self) -> usize {
        self.words.len()
    }

    pub fn credit(&self) -> usize {
        self.advertised
    }

    /// Read cursor into the ring.
    pub fn start(&self) -> usize {
        self.words.front()
    }

    /// The queue never reaches `DSP_BUF_MAX` words; the push that would get
    /// it there is rejected.
    pub fn push(&mut self, word: u16) -> Result<(), FaultReason> {
        if self.words.len() + 1 >= DSP_BUF_MAX {
            return Err(FaultReason::Overflow(Buffer::TransferQueue));
        }
        self.words
            .push_back(word)
            .map_err(|_| FaultReason::Overflow(Buffer::TransferQueue))
    }

    /// Grants one more word of credit. Returns false when the consumer can
    /// already see everything that is queued.
    pub fn tick(&mut self) -> bool {
        if self.advertised < self.words.len() {
            self.advertised += 1;
            true
        } else {
            false
        }
    }

    pub fn pop(&mut self) -> Option<u16> {
        let word = self.words.pop_front()?;
        self.advertised = self.advertised.saturating_sub(1);
        Some(word)
    }

    pub fn pending(&self) -> impl ExactSizeIterator<Item = u16> + '_ {
        self.words.iter().copied()
    }

    pub fn reset(&mut self) {
        self.words.clear();
        self.advertised = 0;
    }
}

impl Default for TransferQueue {
    fn default() -> Self {
        TransferQueue::new()
    }
}
