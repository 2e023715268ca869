pub mod connection;
pub mod frame;
pub mod opcode;
pub mod server;

pub use connection::{Connection, ConnectionState};
pub use opcode::Opcode;
pub use server::{pool_for, ConnectionPool, SingleThreadedFarmer, ThreadPerConnection};
