use crate::domain::provider::{DeleteResult, StorageProvider, TransferArguments};
use crate::transfer::TransferError;

/// Call straight through to the provider's delete.
pub async fn execute(
  provider: &dyn StorageProvider,
  arguments: &TransferArguments,
) -> Result<DeleteResult, TransferError> {
  let result = provider.delete(arguments).await?;
  tracing::info!(
    provider = %arguments.provider,
    path = %arguments.path,
    status = result.status,
    "Deleted"
  );
  Ok(result)
}
