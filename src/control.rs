//! Visual-centering control: actuation commands, target selection and the
//! dead-zone controller with its settling timer.

mod centering;
mod command;
mod settle;

pub use centering::{
    CenteringController, ControlConfig, Decision, TieBreak, compute_command, select_target,
};
pub use command::{ActuationCommand, CommandKind, ParseCommandError};
pub use settle::SettleTimer;
