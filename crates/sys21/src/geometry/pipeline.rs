//! The master/slave board: everything between the hosts' shared RAM and the
//! rasterizer, owned by one value.

use tracing::{info, trace};

use super::{
    board::{Board, BoardProfile, ConfigError, Topology},
    fault::{FaultLog, FaultReason, PipelineFault},
    kickstart::KickstartController,
    master::{MasterGeometryUnit, MasterPort, MasterPorts, TransferAddress},
    point_ram::PointRam,
    point_rom::PointRom,
    shared_ram::{SharedRam, ADDRESS_MASK},
    slave::{SlavePorts, SlaveProgram, SlaveRasterFeeder},
    transfer::TransferQueue,
    GeometryPipeline, Rasterizer,
};

/// Program memory of the master DSP.
pub const MASTER_CODE_WORDS: usize = 0x10000;

pub struct Pipeline {
    profile: BoardProfile,
    shared_ram: SharedRam,
    point_rom: PointRom,
    point_ram: PointRam,
    master_code: Box<[u16]>,
    queue: TransferQueue,
    master: MasterGeometryUnit,
    feeder: SlaveRasterFeeder,
    slave: Box<dyn SlaveProgram>,
    kickstart: KickstartController,
    faults: FaultLog,
    halted: bool,
    slave_active: bool,
}

impl Pipeline {
    pub fn new(
        board: Board,
        point_rom: PointRom,
        slave: Box<dyn SlaveProgram>,
    ) -> Result<Pipeline, ConfigError> {
        let profile = board.profile();
        if profile.topology != Topology::MasterSlave {
            return Err(ConfigError::WrongTopology {
                board,
                expected: Topology::MasterSlave,
            });
        }
        let mut shared_ram = SharedRam::new();
        shared_ram.set_point_rom_checksum(point_rom.checksum());
        info!(
            "{board}: {} point ROM words, checksum {:#010x}",
            point_rom.len(),
            point_rom.checksum()
        );
        Ok(Pipeline {
            profile,
            shared_ram,
            point_rom,
            point_ram: PointRam::new(),
            master_code: vec![0; MASTER_CODE_WORDS].into_boxed_slice(),
            queue: TransferQueue::new(),
            master: MasterGeometryUnit::new(),
            feeder: SlaveRasterFeeder::new(),
            slave,
            kickstart: KickstartController::new(profile.kickstart_countdown),
            faults: FaultLog::default(),
            halted: false,
            slave_active: false,
        })
    }

    pub fn profile(&self) -> &BoardProfile {
        &self.profile
    }

    pub fn shared_ram(&self) -> &SharedRam {
        &self.shared_ram
    }

    /// Bulk access for scene loading. Writes through here never resume a
    /// parked transfer; use [`Pipeline::write_shared`] for that.
    pub fn shared_ram_mut(&mut self) -> &mut SharedRam {
        &mut self.shared_ram
    }

    pub fn point_rom(&self) -> &PointRom {
        &self.point_rom
    }

    pub fn point_ram(&self) -> &PointRam {
        &self.point_ram
    }

    pub fn queue(&self) -> &TransferQueue {
        &self.queue
    }

    pub fn master(&self) -> &MasterGeometryUnit {
        &self.master
    }

    pub fn feeder(&self) -> &SlaveRasterFeeder {
        &self.feeder
    }

    pub fn master_code(&self) -> &[u16] {
        &self.master_code
    }

    /// Set once the slave has read a word since the last kickstart.
    pub fn slave_active(&self) -> bool {
        self.slave_active
    }

    pub fn kickstarts(&self) -> u64 {
        self.kickstart.kickstarts()
    }

    /// Host upload of the master program. Publishes the size and the upload
    /// flag in the control block.
    pub fn load_master_code(&mut self, code: &[u16]) {
        let len = code.len().min(MASTER_CODE_WORDS);
        self.master_code[..len].copy_from_slice(&code[..len]);
        self.shared_ram.publish_code(len as u32);
        self.apply_watchdog_patches();
        info!("uploaded {len} words of master code");
    }

    fn apply_watchdog_patches(&mut self) {
        for patch in self.profile.watchdog_patches {
            self.master_code[patch.address as usize] = patch.value;
        }
    }

    pub fn read_shared(&self, address: u16) -> u16 {
        self.shared_ram.read(address)
    }

    /// Host write to shared RAM. Rewriting the link word after a parked
    /// sentinel restarts the transfer.
    pub fn write_shared(&mut self, address: u16, value: u16) {
        self.shared_ram.write(address, value);
        let source = self.master.source_address();
        if !self.profile.resume_on_pointer_write || source.is_idle() {
            return;
        }
        let link = source.cursor().address().wrapping_add(1) & ADDRESS_MASK;
        if address & ADDRESS_MASK == link {
            trace!("link word rewritten, resuming transfer at {:#06x}", source.0);
            self.run_master(source);
        }
    }

    /// Host write to the transfer start port.
    pub fn start_transfer(&mut self, start: u16) {
        self.run_master(TransferAddress(start));
    }

    fn run_master(&mut self, start: TransferAddress) {
        if let Err(reason) = self.master.run(
            start,
            &self.shared_ram,
            &self.point_rom,
            &mut self.queue,
            &mut self.faults,
        ) {
            self.fault(reason);
        }
    }

    fn fault(&mut self, reason: FaultReason) {
        self.faults.record(reason);
        if (PipelineFault { reason }).is_fatal() {
            self.halted = true;
        }
    }

    pub fn master_port_read(&mut self, port: u16) -> u16 {
        self.master.read_port(port, &self.point_rom)
    }

    pub fn master_port_write(&mut self, port: u16, data: u16, rasterizer: &mut dyn Rasterizer) {
        if port == MasterPort::TransferStart as u16 {
            return self.start_transfer(data);
        }
        let mut ports = MasterPorts {
            master: &mut self.master,
            shared_ram: &self.shared_ram,
            point_rom: &self.point_rom,
            point_ram: &self.point_ram,
            queue: &mut self.queue,
            rasterizer,
            faults: &mut self.faults,
        };
        if let Err(reason) = ports.write(port, data) {
            self.fault(reason);
        }
    }

    /// Custom-key chip read by the master program at `pc`.
    pub fn cuskey_read(&self, pc: u16) -> u16 {
        self.profile.cuskey(pc).unwrap_or_else(|| {
            trace!("no custom-key reply at pc {pc:#06x}");
            0
        })
    }

    pub fn point_ram_control_write(&mut self, value: u16) {
        self.point_ram.write_control(value);
    }

    pub fn point_ram_data_read(&self) -> u8 {
        self.point_ram.read_data()
    }

    pub fn point_ram_data_write(&mut self, value: u16) {
        self.point_ram.write_data(value);
    }

    pub fn depth_cue_write(&mut self, offset: usize, value: u16) {
        self.point_ram.write_depth_cue(offset, value);
    }
}

impl GeometryPipeline for Pipeline {
    fn poll(&mut self, rasterizer: &mut dyn Rasterizer) {
        let granted = self.queue.tick();
        if self.kickstart.poll(granted, &self.master) {
            info!("transfer stalled");
            self.kickstart(rasterizer);
            return;
        }
        if self.halted {
            return;
        }
        let mut ports = SlavePorts::new(
            &mut self.queue,
            &mut self.feeder,
            &mut self.point_ram,
            rasterizer,
            &mut self.faults,
            &mut self.slave_active,
        );
        if let Err(reason) = self.slave.poll(&mut ports) {
            self.fault(reason);
        }
    }

    fn vblank(&mut self, rasterizer: &mut dyn Rasterizer) {
        if self.kickstart.vblank() {
            info!("boot countdown expired");
            self.kickstart(rasterizer);
        }
    }

    fn kickstart(&mut self, rasterizer: &mut dyn Rasterizer) {
        info!("kickstart #{}", self.kickstart.kickstarts() + 1);
        rasterizer.clear();
        self.master.reset();
        self.queue.reset();
        self.feeder.reset();
        self.slave.reset();
        self.slave_active = false;
        self.halted = false;
        self.apply_watchdog_patches();
        self.kickstart.record_kickstart();
    }

    fn is_halted(&self) -> bool {
        self.halted
    }

    fn take_faults(&mut self) -> Vec<PipelineFault> {
        self.faults.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{
        fault::Buffer,
        master::END_OF_LIST,
        reference_slave::ReferenceSlave,
        QuadLog,
    };

    fn pipeline(board: Board) -> Pipeline {
        Pipeline::new(
            board,
            PointRom::from_words([1, 0x00ff_ffff]),
            Box::new(ReferenceSlave::new()),
        )
        .unwrap()
    }

    #[test]
    fn rejects_flat_board() {
        assert!(matches!(
            Pipeline::new(
                Board::WinningRun,
                PointRom::from_words([]),
                Box::new(ReferenceSlave::new())
            ),
            Err(ConfigError::WrongTopology { .. })
        ));
    }

    #[test]
    fn publishes_checksum_and_code() {
        let mut pipeline = pipeline(Board::AirCombat);
        assert_eq!(pipeline.shared_ram().point_rom_checksum(), 0x0100_0000);
        pipeline.load_master_code(&[0x1234; 0x100]);
        assert!(pipeline.shared_ram().code_uploaded());
        assert_eq!(pipeline.shared_ram().code_size(), 0x100);
        assert_eq!(pipeline.master_code()[0x8e], 0x808f);
        assert_eq!(pipeline.master_code()[0x8d], 0x1234);
    }

    #[test]
    fn kickstart_clears_volatile_state() {
        let mut pipeline = pipeline(Board::Solvalou);
        let mut log = QuadLog::default();
        pipeline.shared_ram_mut().load(0x10, &[2, 1, 2, END_OF_LIST]);
        pipeline.start_transfer(0x10);
        pipeline.master_port_write(MasterPort::Status as u16, 1, &mut log);
        pipeline.poll(&mut log);
        pipeline.master_code[0x8b] = 0;

        pipeline.kickstart(&mut log);
        assert_eq!(log.clears, 1);
        assert_eq!(pipeline.queue().available(), 0);
        assert_eq!(pipeline.queue().credit(), 0);
        assert!(pipeline.feeder().is_empty());
        assert!(!pipeline.master().is_finished());
        assert!(pipeline.master().source_address().is_idle());
        assert!(!pipeline.slave_active());
        assert!(!pipeline.is_halted());
        assert_eq!(pipeline.master_code()[0x8b], 0x808c);
        assert_eq!(pipeline.kickstarts(), 1);
    }

    #[test]
    fn stall_watchdog_kickstarts() {
        let mut pipeline = pipeline(Board::Starblade);
        let mut log = QuadLog::default();
        pipeline.shared_ram_mut().load(0x20, &[END_OF_LIST, 0x8020]);
        pipeline.start_transfer(0x8020);
        pipeline.master_port_write(MasterPort::Status as u16, 1, &mut log);
        assert_eq!(pipeline.master().source_address(), TransferAddress(0x8020));

        pipeline.poll(&mut log);
        assert_eq!(pipeline.kickstarts(), 1);
        assert_eq!(log.clears, 1);
        assert!(pipeline.master().source_address().is_idle());
    }

    #[test]
    fn boot_countdown_kickstarts() {
        let mut pipeline = pipeline(Board::AirCombat);
        let mut log = QuadLog::default();
        for _ in 0..19 {
            pipeline.vblank(&mut log);
        }
        assert_eq!(pipeline.kickstarts(), 0);
        pipeline.vblank(&mut log);
        assert_eq!(pipeline.kickstarts(), 1);
    }

    #[test]
    fn link_rewrite_resumes_parked_transfer() {
        let mut pipeline = pipeline(Board::Solvalou);
        pipeline.shared_ram_mut().load(0x20, &[END_OF_LIST, 0x8020]);
        pipeline.shared_ram_mut().load(0x30, &[3, 7, 8, 9, END_OF_LIST]);
        pipeline.start_transfer(0x8020);
        assert_eq!(pipeline.queue().available(), 0);

        pipeline.write_shared(0x21, 0x0030);
        assert_eq!(pipeline.queue().pending().collect::<Vec<_>>(), vec![4, 7, 8, 9]);
        assert!(pipeline.master().source_address().is_idle());
    }

    #[test]
    fn linked_park_resumes_from_its_own_link_word() {
        let mut pipeline = pipeline(Board::Solvalou);
        pipeline.shared_ram_mut().load(0x10, &[END_OF_LIST, 0x8020]);
        pipeline.shared_ram_mut().load(0x20, &[END_OF_LIST, 0x8020]);
        pipeline.shared_ram_mut().load(0x30, &[2, 5, 6, END_OF_LIST]);
        pipeline.start_transfer(0x8010);
        assert_eq!(pipeline.master().source_address(), TransferAddress(0x8020));

        pipeline.write_shared(0x11, 0x0030);
        assert_eq!(pipeline.queue().available(), 0);

        pipeline.write_shared(0x21, 0x0030);
        assert_eq!(pipeline.queue().pending().collect::<Vec<_>>(), vec![3, 5, 6]);
        assert!(pipeline.master().source_address().is_idle());
    }

    #[test]
    fn overflow_halts_until_kickstart() {
        let mut pipeline = pipeline(Board::Starblade);
        let mut log = QuadLog::default();
        pipeline.shared_ram_mut().write(0x10, 0xfffe);
        pipeline.start_transfer(0x10);
        assert!(pipeline.is_halted());
        let faults = pipeline.take_faults();
        assert_eq!(
            faults[0].reason,
            FaultReason::Overflow(Buffer::TransferQueue)
        );

        pipeline.poll(&mut log);
        assert!(!pipeline.slave_active());
        pipeline.kickstart(&mut log);
        assert!(!pipeline.is_halted());
    }

    #[test]
    fn cuskey_replies_by_pc() {
        let pipeline = pipeline(Board::CyberSled);
        assert_eq!(pipeline.cuskey_read(0x8061), 0xfe95);
        assert_eq!(pipeline.cuskey_read(0x1234), 0);
    }

    #[test]
    fn point_ram_ports() {
        let mut pipeline = pipeline(Board::Starblade);
        pipeline.point_ram_control_write(0);
        pipeline.point_ram_data_write(0x81);
        pipeline.point_ram_data_write(0x22);
        assert_eq!(pipeline.point_ram().byte(0), 0x81);
        assert_eq!(pipeline.point_ram().byte(1), 0x22);
        pipeline.point_ram_control_write(0);
        assert_eq!(pipeline.point_ram_data_read(), 0x81);
    }
}
