//! SampleStore trait - persistence output interface

use crate::{ContractError, SensorSample};

/// Append-only sample store
///
/// All store implementations must implement this trait.
#[trait_variant::make(SampleStore: Send)]
pub trait LocalSampleStore {
    /// Store name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Append an ordered batch of samples
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn append(&mut self, samples: &[SensorSample]) -> Result<(), ContractError>;

    /// Flush buffered writes (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close store
    async fn close(&mut self) -> Result<(), ContractError>;
}
