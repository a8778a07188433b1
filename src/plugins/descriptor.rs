use crate::core::errors::DescriptorLookupError;
use crate::core::models::DescriptorMetadata;
use async_trait::async_trait;

/// Directory lookup for a service's published descriptor. `Ok(None)` means
/// the directory has nothing for this address.
#[async_trait]
pub trait DescriptorLookup: Send + Sync {
    fn name(&self) -> &'static str;
    async fn lookup(&self, address: &str) -> Result<Option<DescriptorMetadata>, DescriptorLookupError>;
}

/// Used when no directory client is configured; every lookup is absent.
pub struct NoDescriptorLookup;

#[async_trait]
impl DescriptorLookup for NoDescriptorLookup {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn lookup(&self, _address: &str) -> Result<Option<DescriptorMetadata>, DescriptorLookupError> {
        Ok(None)
    }
}
