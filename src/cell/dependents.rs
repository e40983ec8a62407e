use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::warn;

use crate::registry::ReloadEvent;

use super::{Reload, ReloadContext};

/// Append-only list of cells to reload after their source republishes.
#[derive(Default)]
pub(crate) struct Dependents {
    inner: RwLock<Vec<Weak<dyn Reload>>>,
}

impl Dependents {
    pub(crate) fn push(&self, dependent: Weak<dyn Reload>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(dependent);
    }

    pub(crate) fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|dependent| dependent.strong_count() > 0)
            .count()
    }

    /// Reloads every live dependent in registration order.
    ///
    /// Every outcome is reported on the context's event channel. A failing
    /// dependent is skipped; it does not stop its siblings and does not touch
    /// the source's published value.
    pub(crate) fn cascade(&self, ctx: &ReloadContext, source: &str) {
        let live: Vec<Arc<dyn Reload>> = {
            let mut dependents = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            dependents.retain(|dependent| dependent.strong_count() > 0);
            dependents.iter().filter_map(Weak::upgrade).collect()
        };

        for dependent in live {
            match dependent.reload(ctx) {
                Ok(()) => ctx.reloaded(dependent.as_ref()),
                Err(error) => {
                    let target = dependent.label();
                    warn!(source, dependent = %target, %error, "Dependent reload failed");
                    ctx.emit(ReloadEvent::Failed { target, error });
                }
            }
        }
    }
}
