// tmem-common - Shared types, wire layout, and error taxonomy for tmem.
//
// Every other crate in the workspace depends on this one for the command
// codes, fixed-layout request records, mode bits, and error enum so they
// never diverge across backend and plane implementations.

pub mod config;
pub mod error;
pub mod ioctl;
pub mod mode;
pub mod wire;

pub use config::{
    TmemConfig, KEY_MAX, PAGE_BYTES, POINTER_POOL_BYTES, POOL_BYTES, SLEEP_SLACK_USECS,
    SLEEP_USECS, TMEM_MAX,
};
pub use error::{TmemError, TmemResult};
pub use ioctl::{IoctlCommand, CMD_CONTROL, CMD_GENERATE_SIZE, CMD_GET, CMD_INVALIDATE, CMD_PUT, TMEM_MAGIC};
pub use mode::{GenerateSize, ModeBits, ModeRegister, DUMMY, GENERATE, SILENT, SLEEPY};
pub use wire::{GetRequest, InvalRequest, PutRequest};
