// Core module: EXL message models and validation (NO I/O dependencies)
pub mod notification;
pub mod protocol;
pub mod types;
pub mod validate;

pub use notification::*;
pub use protocol::*;
pub use types::*;
pub use validate::*;
