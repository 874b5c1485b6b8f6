//! Per-title board differences, chosen once when the machine is built.

use std::str::FromStr;

use derive_more::Display;
use enum_map::{enum_map, Enum, EnumMap};
use thiserror::Error;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Enum)]
pub enum Board {
    #[display("starblade")]
    Starblade,
    #[display("solvalou")]
    Solvalou,
    #[display("aircombat")]
    AirCombat,
    #[display("cybersled")]
    CyberSled,
    #[display("winrun")]
    WinningRun,
}

impl Board {
    pub const ALL: [Board; 5] = [
        Board::Starblade,
        Board::Solvalou,
        Board::AirCombat,
        Board::CyberSled,
        Board::WinningRun,
    ];

    pub fn profile(self) -> BoardProfile {
        profiles()[self]
    }
}

impl FromStr for Board {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Board::ALL
            .into_iter()
            .find(|board| board.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownBoard(s.to_owned()))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown board {0:?} (expected one of starblade, solvalou, aircombat, cybersled, winrun)")]
    UnknownBoard(String),
    #[error("{board} does not use the {expected} pipeline")]
    WrongTopology { board: Board, expected: Topology },
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Master unit feeding a slave through the transfer queue.
    #[display("master/slave")]
    MasterSlave,
    /// Single DSP filled directly by the host.
    #[display("flat")]
    Flat,
}

/// Word poked into the master program store on every kickstart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogPatch {
    pub address: u16,
    pub value: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardProfile {
    pub topology: Topology,
    /// Vblanks before the first kickstart. Zero never fires.
    pub kickstart_countdown: u32,
    /// Custom-key chip replies, keyed by the DSP program counter.
    pub cuskey: &'static [(u16, u16)],
    pub watchdog_patches: &'static [WatchdogPatch],
    /// Producer writes to the word after the parked sentinel re-run the
    /// transfer.
    pub resume_on_pointer_write: bool,
}

impl BoardProfile {
    pub fn cuskey(&self, pc: u16) -> Option<u16> {
        self.cuskey
            .iter()
            .find(|&&(key, _)| key == pc)
            .map(|&(_, value)| value)
    }
}

pub fn profiles() -> EnumMap<Board, BoardProfile> {
    enum_map! {
        Board::Starblade => BoardProfile {
            topology: Topology::MasterSlave,
            kickstart_countdown: 20,
            cuskey: &[],
            watchdog_patches: &[],
            resume_on_pointer_write: true,
        },
        Board::Solvalou => BoardProfile {
            topology: Topology::MasterSlave,
            kickstart_countdown: 20,
            cuskey: &[(0x805e, 0x0000), (0x805f, 0xfeba), (0x8067, 0xffff), (0x806e, 0x0145)],
            watchdog_patches: &[WatchdogPatch { address: 0x008b, value: 0x808c }],
            resume_on_pointer_write: true,
        },
        Board::AirCombat => BoardProfile {
            topology: Topology::MasterSlave,
            kickstart_countdown: 20,
            cuskey: &[(0x8062, 0xfeb9), (0x806a, 0xffff), (0x8071, 0x0000)],
            watchdog_patches: &[WatchdogPatch { address: 0x008e, value: 0x808f }],
            resume_on_pointer_write: true,
        },
        Board::CyberSled => BoardProfile {
            topology: Topology::MasterSlave,
            kickstart_countdown: 200,
            cuskey: &[(0x8061, 0xfe95), (0x8069, 0xffff), (0x8070, 0x0000)],
            watchdog_patches: &[],
            resume_on_pointer_write: true,
        },
        Board::WinningRun => BoardProfile {
            topology: Topology::Flat,
            kickstart_countdown: 0,
            cuskey: &[(0x0064, 0xfebb), (0x006c, 0xffff), (0x0073, 0x0144), (0x0075, 0x0000)],
            watchdog_patches: &[],
            resume_on_pointer_write: false,
        },
    }
}
