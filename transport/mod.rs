// Transport module: connections to the EXL server
pub mod tcp;
pub mod tls;
pub mod traits;

pub use tcp::*;
pub use tls::*;
pub use traits::*;
