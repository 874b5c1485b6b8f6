use tracing::debug;

use crate::{
    geometry::{board::Board, fault::PipelineFault, GeometryPipeline, Rasterizer},
    scheduler::{Event, Scheduler},
};

/// What to do when the pipeline reports an overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultPolicy {
    #[default]
    KickstartImmediately,
    /// Stay halted for the rest of the frame.
    DeferToFrameBoundary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    pub board: Board,
    pub polls_per_frame: u64,
    /// Poll within the frame at which vblank is raised.
    pub vblank_poll: u64,
    pub fault_policy: FaultPolicy,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            board: Board::Starblade,
            polls_per_frame: 1024,
            vblank_poll: 960,
            fault_policy: FaultPolicy::default(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u64,
    pub polls: u64,
    pub faults: Vec<PipelineFault>,
    /// Kickstarts this frame caused by faults.
    pub fault_kickstarts: u32,
}

pub struct Machine<P> {
    config: MachineConfig,
    pipeline: P,
    scheduler: Scheduler,
    frame: u64,
    kickstart_pending: bool,
}

impl<P: GeometryPipeline> Machine<P> {
    pub fn new(config: MachineConfig, pipeline: P) -> Machine<P> {
        Machine {
            config,
            pipeline,
            scheduler: Scheduler::new(config.polls_per_frame, config.vblank_poll),
            frame: 0,
            kickstart_pending: false,
        }
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut P {
        &mut self.pipeline
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn run_frame(&mut self, rasterizer: &mut dyn Rasterizer) -> FrameReport {
        let mut report = FrameReport {
            frame: self.frame,
            ..FrameReport::default()
        };
        loop {
            match self.scheduler.next_event() {
                Event::Poll(polls) => {
                    for _ in 0..polls {
                        self.pipeline.poll(rasterizer);
                        self.drain_faults(rasterizer, &mut report);
                    }
                    self.scheduler.tick(polls);
                    report.polls += polls;
                }
                Event::VBlank => {
                    self.pipeline.vblank(rasterizer);
                    self.drain_faults(rasterizer, &mut report);
                }
                Event::FrameEnd => {
                    if std::mem::take(&mut self.kickstart_pending) {
                        self.pipeline.kickstart(rasterizer);
                        report.fault_kickstarts += 1;
                    }
                    debug!(
                        "frame {} done: {} polls, {} faults",
                        self.frame,
                        report.polls,
                        report.faults.len()
                    );
                    self.frame += 1;
                    return report;
                }
            }
        }
    }

    fn drain_faults(&mut self, rasterizer: &mut dyn Rasterizer, report: &mut FrameReport) {
        let faults = self.pipeline.take_faults();
        if faults.iter().any(PipelineFault::is_fatal) {
            match self.config.fault_policy {
                FaultPolicy::KickstartImmediately => {
                    self.pipeline.kickstart(rasterizer);
                    report.fault_kickstarts += 1;
                }
                FaultPolicy::DeferToFrameBoundary => self.kickstart_pending = true,
            }
        }
        report.faults.extend(faults);
    }
}
