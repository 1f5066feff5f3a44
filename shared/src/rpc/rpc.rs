use std::marker::PhantomData;

use log::error;

use replica_chunk_serde::{Serde, SerdeErr, StreamWriter};

use crate::{
    chunk::{ChunkError, ChunkMutator, RpcCall},
    Reliability, RpcDirection, RpcRequestId,
};

use super::request::RpcRequest;

/// Type-erased view of an [`Rpc`] declaration
pub trait RpcBase: Send + Sync {
    fn name(&self) -> &'static str;

    fn reliability(&self) -> Reliability;

    fn direction(&self) -> RpcDirection;

    fn bind(&mut self, index: u8, mutator: ChunkMutator);

    fn unbind(&mut self);
}

/// A remote procedure declared on a chunk, taking arguments of type `A`
pub struct Rpc<A: Serde> {
    name: &'static str,
    reliability: Reliability,
    direction: RpcDirection,
    binding: Option<(u8, ChunkMutator)>,
    phantom_a: PhantomData<fn(A)>,
}

impl<A: Serde> Rpc<A> {
    /// Primary to proxies, reliable
    pub fn downstream(name: &'static str) -> Self {
        Self::new(name, RpcDirection::Downstream)
    }

    /// Proxy to primary, reliable
    pub fn upstream(name: &'static str) -> Self {
        Self::new(name, RpcDirection::Upstream)
    }

    fn new(name: &'static str, direction: RpcDirection) -> Self {
        Self {
            name,
            reliability: Reliability::Reliable,
            direction,
            binding: None,
            phantom_a: PhantomData,
        }
    }

    pub fn unreliable(mut self) -> Self {
        self.reliability = Reliability::Unreliable;
        self
    }

    pub fn index(&self) -> Option<u8> {
        self.binding.as_ref().map(|(index, _)| *index)
    }

    /// Queues a call for every peer this side relays to
    pub fn invoke(&self, args: A) -> Result<RpcRequestId, ChunkError> {
        let Some((index, mutator)) = self.binding.as_ref() else {
            return Err(ChunkError::NotInitialized {
                class_name: self.name,
            });
        };
        let mut writer = StreamWriter::new();
        args.ser(&mut writer);
        let request = RpcRequest::new(
            *index,
            self.reliability,
            self.direction,
            writer.to_bytes(),
            0,
        );
        mutator.enqueue_rpc(request)
    }

    /// Like [`Rpc::invoke`], but logs failures
    pub fn call(&self, args: A) {
        if let Err(err) = self.invoke(args) {
            error!("RPC `{}` was not queued: {}", self.name, err);
        }
    }

    /// Whether `call` is an invocation of this RPC
    pub fn matches(&self, call: &RpcCall) -> bool {
        self.index() == Some(call.rpc_index)
    }

    /// Decodes the arguments of `call` if it invokes this RPC
    pub fn decode(&self, call: &RpcCall) -> Option<Result<A, SerdeErr>> {
        if !self.matches(call) {
            return None;
        }
        Some(call.args::<A>())
    }
}

impl<A: Serde> RpcBase for Rpc<A> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn reliability(&self) -> Reliability {
        self.reliability
    }

    fn direction(&self) -> RpcDirection {
        self.direction
    }

    fn bind(&mut self, index: u8, mutator: ChunkMutator) {
        self.binding = Some((index, mutator));
    }

    fn unbind(&mut self) {
        self.binding = None;
    }
}
