use log::error;

use replica_chunk_serde::{BitReader, BitWrite, Serde, SerdeErr, StreamWriter};

use crate::{Reliability, Revision};

use super::{
    error::ChunkError,
    handler::{ChangeOrigin, DataSetChange},
    mutator::ChunkMutator,
    throttle::{BasicThrottle, DataSetThrottle},
};

/// Type-erased view of a [`DataSet`], used by the chunk to marshal fields
pub trait DataSetBase: Send + Sync {
    fn name(&self) -> &'static str;

    fn reliability(&self) -> Reliability;

    fn revision(&self) -> Revision;

    /// Current value differs from the default captured at construction
    fn is_non_default(&self) -> bool;

    fn write_value(&self, writer: &mut dyn BitWrite);

    /// Parses a remote value without applying it
    fn read_staged(&mut self, reader: &mut BitReader) -> Result<(), SerdeErr>;

    fn has_staged(&self) -> bool;

    /// Moves the staged value in without re-dirtying. Returns whether the
    /// value changed.
    fn apply_staged(&mut self, revision: Revision) -> bool;

    fn discard_staged(&mut self);

    fn encoded_value(&self) -> Vec<u8>;

    fn bind(&mut self, index: u8, mutator: ChunkMutator);

    fn unbind(&mut self);
}

struct Binding {
    index: u8,
    mutator: ChunkMutator,
}

/// One replicated field of a chunk. Only the primary may set it; proxies
/// receive values through unmarshalling.
pub struct DataSet<T: Serde> {
    name: &'static str,
    value: T,
    default: T,
    staged: Option<T>,
    revision: Revision,
    reliability: Reliability,
    throttle: Box<dyn DataSetThrottle<T>>,
    binding: Option<Binding>,
}

impl<T: Serde + Send + Sync + 'static> DataSet<T> {
    /// A reliable field starting at `default`
    pub fn new(name: &'static str, default: T) -> Self {
        Self {
            name,
            value: default.clone(),
            default,
            staged: None,
            revision: 0,
            reliability: Reliability::Reliable,
            throttle: Box::new(BasicThrottle),
            binding: None,
        }
    }

    pub fn unreliable(mut self) -> Self {
        self.reliability = Reliability::Unreliable;
        self
    }

    /// Replaces the equality check deciding whether a write is a change
    pub fn with_throttle(mut self, throttle: impl DataSetThrottle<T> + 'static) -> Self {
        self.throttle = Box::new(throttle);
        self
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    pub fn index(&self) -> Option<u8> {
        self.binding.as_ref().map(|binding| binding.index)
    }

    /// Stores `value` and flags the field dirty. Returns `Ok(false)` without
    /// touching anything when the throttle finds the value unchanged.
    pub fn try_set(&mut self, value: T) -> Result<bool, ChunkError> {
        if self.throttle.within_threshold(&self.value, &value) {
            return Ok(false);
        }
        let Some(binding) = self.binding.as_ref() else {
            return Err(ChunkError::NotInitialized {
                class_name: self.name,
            });
        };
        let (index, mutator) = (binding.index, binding.mutator.clone());

        self.revision = mutator.mutate_data_set(index)?;
        self.value = value;

        let change = self.change(index, ChangeOrigin::Local, &mutator);
        mutator.with_handler(|handler| handler.on_data_set_changed(&change));
        Ok(true)
    }

    /// Like [`DataSet::try_set`], but logs failures
    pub fn set(&mut self, value: T) {
        if let Err(err) = self.try_set(value) {
            error!("DataSet `{}` was not set: {}", self.name, err);
        }
    }

    /// Edits a copy of the value in place, then sets it
    pub fn modify(&mut self, f: impl FnOnce(&mut T)) -> Result<bool, ChunkError> {
        let mut value = self.value.clone();
        f(&mut value);
        self.try_set(value)
    }

    pub(crate) fn change(
        &self,
        index: u8,
        origin: ChangeOrigin,
        mutator: &ChunkMutator,
    ) -> DataSetChange {
        let (class_id, class_name) = mutator.class();
        DataSetChange {
            class_id,
            class_name,
            index,
            name: self.name,
            revision: self.revision,
            origin,
            encoded: self.encoded_value(),
        }
    }
}

impl<T: Serde + Send + Sync + 'static> DataSetBase for DataSet<T> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn reliability(&self) -> Reliability {
        self.reliability
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn is_non_default(&self) -> bool {
        self.value != self.default
    }

    fn write_value(&self, writer: &mut dyn BitWrite) {
        self.value.ser(writer);
    }

    fn read_staged(&mut self, reader: &mut BitReader) -> Result<(), SerdeErr> {
        self.staged = Some(T::de(reader)?);
        Ok(())
    }

    fn has_staged(&self) -> bool {
        self.staged.is_some()
    }

    fn apply_staged(&mut self, revision: Revision) -> bool {
        let Some(staged) = self.staged.take() else {
            return false;
        };
        if staged == self.value {
            return false;
        }
        self.value = staged;
        self.revision = revision;
        true
    }

    fn discard_staged(&mut self) {
        self.staged = None;
    }

    fn encoded_value(&self) -> Vec<u8> {
        let mut writer = StreamWriter::new();
        self.value.ser(&mut writer);
        writer.to_bytes()
    }

    fn bind(&mut self, index: u8, mutator: ChunkMutator) {
        self.binding = Some(Binding { index, mutator });
    }

    fn unbind(&mut self) {
        self.binding = None;
    }
}
