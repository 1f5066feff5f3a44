mod context;
mod pipeline;
mod scheduler;
mod wire;

pub use context::{
    EndianType, MarshalContext, MarshalFlags, MarshalReceipt, PrepareDataResult, UnmarshalContext,
    UnmarshalReport,
};
pub use scheduler::{MarshalScheduler, MarshalTask};
