use std::fmt::Debug;

use async_trait::async_trait;
use tracing::debug;

use crate::error::ModelError;

/// A validator interprets its own vocabulary of steps against one entity.
#[async_trait]
pub trait Validate<T: Send> {
    type Step: Copy + Debug + Send + Sync;

    async fn apply(&self, step: Self::Step, entity: &mut T) -> Result<(), ModelError>;
}

/// Runs `steps` strictly in order and stops at the first failure. The entity
/// may have been mutated by the steps that ran before it.
pub async fn run_chain<T, V>(validator: &V, entity: &mut T, steps: &[V::Step]) -> Result<(), ModelError>
where
    T: Send,
    V: Validate<T> + Sync,
{
    for &step in steps {
        if let Err(err) = validator.apply(step, entity).await {
            debug!(?step, error = %err, "validation step failed");
            return Err(err);
        }
    }
    Ok(())
}
