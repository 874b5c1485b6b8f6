use std::collections::BinaryHeap;

/// Polls handed out per `Event::Poll` at most.
const POLL_BATCH: u64 = 32;

/// Time is counted in consumer polls.
pub struct Scheduler {
    pub poll: u64,
    pending: BinaryHeap<PendingEvent>,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Event {
    Poll(u64),
    VBlank,
    FrameEnd,
}

#[derive(Eq, PartialEq, Debug)]
struct PendingEvent {
    event: Event,
    period: Option<u64>,
    poll: u64,
}

impl Scheduler {
    pub fn new(polls_per_frame: u64, vblank_poll: u64) -> Self {
        let polls_per_frame = polls_per_frame.max(1);
        let mut pending = BinaryHeap::new();
        pending.push(PendingEvent {
            event: Event::VBlank,
            period: Some(polls_per_frame),
            poll: vblank_poll.min(polls_per_frame),
        });
        pending.push(PendingEvent {
            event: Event::FrameEnd,
            period: Some(polls_per_frame),
            poll: polls_per_frame,
        });
        Self { poll: 0, pending }
    }

    pub fn next_event(&mut self) -> Event {
        let Some(next) = self.pending.peek() else {
            return Event::Poll(POLL_BATCH);
        };
        if next.poll <= self.poll {
            let Some(event) = self.pending.pop() else {
                return Event::Poll(POLL_BATCH);
            };
            if let Some(period) = event.period {
                self.pending.push(PendingEvent {
                    event: event.event,
                    period: Some(period),
                    poll: event.poll + period,
                });
            }
            event.event
        } else {
            Event::Poll((next.poll - self.poll).min(POLL_BATCH))
        }
    }

    pub fn tick(&mut self, polls: u64) {
        self.poll += polls;
    }
}

impl Ord for PendingEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .poll
            .cmp(&self.poll)
            .then_with(|| other.order().cmp(&self.order()))
    }
}

impl PartialOrd for PendingEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PendingEvent {
    /// VBlank before FrameEnd when both fall on the same poll.
    fn order(&self) -> u8 {
        match self.event {
            Event::Poll(_) => 0,
            Event::VBlank => 1,
            Event::FrameEnd => 2,
        }
    }
}
