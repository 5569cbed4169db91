//! # Request-Plane Command Codes
//!
//! ## WHY
//!
//! The request plane is modeled on an ioctl-style device: a single handle
//! accepts a small, stable set of command codes rather than a growable verb
//! set. Keeping the codes as a closed `enum` (instead of bare integers)
//! makes invalid commands a type error at every call site except the one
//! place a raw code genuinely arrives from outside the process.
//!
//! ## HOW IT MAPS TO THE FIVE OPERATIONS
//!
//! `PUT`, `GET`, and `INVALIDATE` are the data-plane operations; `CONTROL`
//! flips the process-wide mode bits (`DUMMY`/`SILENT`/`SLEEPY`/`GENERATE`);
//! `GENERATE_SIZE` sets the fabricated-response length `GENERATE` mode uses.
//!
//! ## DESIGN NOTES
//!
//! Command numbering is caller-observable: it is logged once at plane
//! construction time so operators can correlate trace output with whatever
//! is driving the handle.

use std::fmt;

/// Magic byte identifying this command family, kept for parity with the
/// teacher's ioctl magic-number convention even though this plane is a
/// pure in-process API rather than a real device file.
pub const TMEM_MAGIC: u8 = b'T';

pub const CMD_PUT: u8 = 0;
pub const CMD_GET: u8 = 1;
pub const CMD_INVALIDATE: u8 = 2;
pub const CMD_CONTROL: u8 = 3;
pub const CMD_GENERATE_SIZE: u8 = 4;

/// The five request-plane commands, as a closed enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoctlCommand {
    Put = CMD_PUT,
    Get = CMD_GET,
    Invalidate = CMD_INVALIDATE,
    Control = CMD_CONTROL,
    GenerateSize = CMD_GENERATE_SIZE,
}

impl IoctlCommand {
    /// Returns the raw command byte.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parses a raw command byte, rejecting anything outside the known set.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            CMD_PUT => Some(IoctlCommand::Put),
            CMD_GET => Some(IoctlCommand::Get),
            CMD_INVALIDATE => Some(IoctlCommand::Invalidate),
            CMD_CONTROL => Some(IoctlCommand::Control),
            CMD_GENERATE_SIZE => Some(IoctlCommand::GenerateSize),
            _ => None,
        }
    }

    /// A short, human-readable name for logs and error messages.
    pub fn name(self) -> &'static str {
        match self {
            IoctlCommand::Put => "PUT",
            IoctlCommand::Get => "GET",
            IoctlCommand::Invalidate => "INVALIDATE",
            IoctlCommand::Control => "CONTROL",
            IoctlCommand::GenerateSize => "GENERATE_SIZE",
        }
    }

    /// True for commands that only read state (`GET`).
    pub fn is_readonly(self) -> bool {
        matches!(self, IoctlCommand::Get)
    }

    /// True for commands that mutate stored data (`PUT`, `INVALIDATE`).
    pub fn is_write(self) -> bool {
        matches!(self, IoctlCommand::Put | IoctlCommand::Invalidate)
    }

    /// True for commands that only affect plane-wide configuration.
    pub fn is_config(self) -> bool {
        matches!(self, IoctlCommand::Control | IoctlCommand::GenerateSize)
    }

    /// All known commands, in stable declaration order; used to log the
    /// command table once at plane construction.
    pub fn all() -> [IoctlCommand; 5] {
        [
            IoctlCommand::Put,
            IoctlCommand::Get,
            IoctlCommand::Invalidate,
            IoctlCommand::Control,
            IoctlCommand::GenerateSize,
        ]
    }
}

impl fmt::Display for IoctlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_conversion() {
        for cmd in IoctlCommand::all() {
            assert_eq!(IoctlCommand::from_u8(cmd.as_u8()), Some(cmd));
        }
    }

    #[test]
    fn test_invalid_command() {
        assert_eq!(IoctlCommand::from_u8(255), None);
    }

    #[test]
    fn test_command_classification() {
        assert!(IoctlCommand::Get.is_readonly());
        assert!(!IoctlCommand::Put.is_readonly());
        assert!(IoctlCommand::Put.is_write());
        assert!(IoctlCommand::Invalidate.is_write());
        assert!(!IoctlCommand::Get.is_write());
        assert!(IoctlCommand::Control.is_config());
        assert!(IoctlCommand::GenerateSize.is_config());
        assert!(!IoctlCommand::Put.is_config());
    }

    #[test]
    fn test_command_names() {
        assert_eq!(IoctlCommand::Put.name(), "PUT");
        assert_eq!(IoctlCommand::GenerateSize.name(), "GENERATE_SIZE");
    }

    #[test]
    fn test_command_display() {
        assert_eq!(format!("{}", IoctlCommand::Get), "GET(1)");
    }

    #[test]
    fn test_magic_number() {
        assert_eq!(TMEM_MAGIC, b'T');
    }

    #[test]
    fn test_command_uniqueness() {
        let all = IoctlCommand::all();
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.as_u8(), b.as_u8());
            }
        }
    }
}
