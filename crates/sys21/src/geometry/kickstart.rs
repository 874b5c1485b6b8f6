use super::master::MasterGeometryUnit;

/// Decides when the pipeline's volatile state has to be thrown away.
///
/// Two triggers: the boot countdown, which fires once after a board-specific
/// number of vblanks, and the stall watchdog, checked on every consumer poll.
#[derive(Debug, Clone)]
pub struct KickstartController {
    countdown: u32,
    kickstarts: u64,
}

impl KickstartController {
    pub fn new(countdown: u32) -> KickstartController {
        KickstartController {
            countdown,
            kickstarts: 0,
        }
    }

    /// `granted` is the result of this poll's credit tick. A master that
    /// reported finished but still holds a start address while the slave has
    /// nothing new to read is stuck.
    pub fn poll(&self, granted: bool, master: &MasterGeometryUnit) -> bool {
        !granted && master.is_finished() && !master.source_address().is_idle()
    }

    /// True on the vblank the countdown reaches zero.
    pub fn vblank(&mut self) -> bool {
        if self.countdown == 0 {
            return false;
        }
        self.countdown -= 1;
        self.countdown == 0
    }

    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    pub fn record_kickstart(&mut self) {
        self.kickstarts += 1;
    }

    pub fn kickstarts(&self) -> u64 {
        self.kickstarts
    }
}
