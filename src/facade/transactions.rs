use super::Dynamo;
use crate::core::Result;
use crate::transaction::TransactionId;
use tracing::{debug, error};

impl Dynamo {
    /// Open the transaction a definition save or delete runs in.
    pub(super) async fn begin_unit(&self) -> Result<TransactionId> {
        let txn = self.storage.begin().await?;
        debug!("Unit of work started in {}", txn);
        Ok(txn)
    }

    /// Commit on success, roll back on any error.
    ///
    /// The original error is returned even when the rollback itself fails.
    pub(super) async fn finish<T>(&self, txn: TransactionId, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.storage.commit(txn).await?;
                Ok(value)
            }
            Err(err) => {
                debug!("Unit of work in {} failed: {}", txn, err);
                if let Err(rollback_err) = self.storage.rollback(txn).await {
                    error!("Rollback of {} failed: {}", txn, rollback_err);
                }
                Err(err)
            }
        }
    }
}
