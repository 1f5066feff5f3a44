mod error;
mod request;
mod rpc;
mod rpc_queue;

pub use error::RpcQueueError;
pub use request::RpcRequest;
pub use rpc::{Rpc, RpcBase};
pub use rpc_queue::RpcQueue;
