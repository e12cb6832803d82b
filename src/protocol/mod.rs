//! RESP2 wire protocol
//!
//! Just enough of RESP to talk to a Sentinel as a client: encode commands,
//! decode replies and pub/sub pushes.

mod parser;
mod types;

pub use parser::Parser;
pub use types::RespValue;
