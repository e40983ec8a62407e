use std::{
    any::Any,
    convert::Infallible,
    fmt::{self, Debug, Display},
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Weak},
};

use arc_swap::ArcSwap;

use crate::{ConfigError, Result};

use super::{Dependents, Reload, ReloadContext, Source};

type Transform<T, U> = dyn Fn(&T) -> std::result::Result<U, String> + Send + Sync;

/// A value computed from another cell and recomputed whenever it republishes.
///
/// The source is fixed at construction. The source holds the derived cell
/// weakly, so the cascade stops once the last handle to it is dropped.
pub struct DerivedCell<T, U> {
    source: Arc<dyn Source<T>>,
    transform: Box<Transform<T, U>>,
    current: ArcSwap<U>,
    dependents: Dependents,
}

impl<T, U> DerivedCell<T, U>
where
    T: Send + Sync + 'static,
    U: Debug + Send + Sync + 'static,
{
    /// Attaches a transform to `source` and computes the initial value from the
    /// source's current snapshot.
    ///
    /// A panic inside `transform` is reported as `ConfigError::TransformError`.
    /// The source only holds the new cell weakly: once the returned handle is
    /// dropped the cell stops following its source.
    ///
    /// # Errors
    /// Returns `ConfigError::Unpopulated` if the source has never loaded and
    /// `ConfigError::TransformError` if the initial computation panics.
    #[must_use = "the derived cell detaches from its source when the handle is dropped"]
    pub fn attach<S, F>(source: &Arc<S>, transform: F) -> Result<Arc<Self>>
    where
        S: Source<T> + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        Self::try_attach(source, move |value: &T| Ok::<_, Infallible>(transform(value)))
    }

    /// Attaches a fallible transform to `source`.
    ///
    /// # Errors
    /// Returns `ConfigError::Unpopulated` if the source has never loaded and
    /// `ConfigError::TransformError` if the initial computation fails.
    #[must_use = "the derived cell detaches from its source when the handle is dropped"]
    pub fn try_attach<S, F, E>(source: &Arc<S>, transform: F) -> Result<Arc<Self>>
    where
        S: Source<T> + 'static,
        F: Fn(&T) -> std::result::Result<U, E> + Send + Sync + 'static,
        E: Display,
    {
        let source: Arc<dyn Source<T>> = source.clone();
        let transform: Box<Transform<T, U>> =
            Box::new(move |value: &T| transform(value).map_err(|e| e.to_string()));

        let initial = compute(source.as_ref(), transform.as_ref())?;

        let cell = Arc::new(Self {
            source: Arc::clone(&source),
            transform,
            current: ArcSwap::from_pointee(initial),
            dependents: Dependents::default(),
        });

        let weak = Arc::downgrade(&cell);
        let dependent: Weak<dyn Reload> = weak;
        source.add_dependent(dependent);

        Ok(cell)
    }

    /// Returns the current value. Never blocks and is always populated.
    pub fn get(&self) -> Arc<U> {
        self.current.load_full()
    }

    /// Number of live dependents attached to this cell.
    pub fn dependent_count(&self) -> usize {
        self.dependents.len()
    }
}

fn compute<T, U>(source: &dyn Source<T>, transform: &Transform<T, U>) -> Result<U> {
    let input = source.snapshot().ok_or_else(|| ConfigError::Unpopulated {
        target: source.label(),
    })?;

    let target = || format!("derived from {}", source.label());

    match panic::catch_unwind(AssertUnwindSafe(|| transform(input.as_ref()))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(details)) => Err(ConfigError::TransformError {
            target: target(),
            details,
        }),
        Err(payload) => Err(ConfigError::TransformError {
            target: target(),
            details: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("transform panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("transform panicked: {message}")
    } else {
        "transform panicked".to_string()
    }
}

impl<T, U> Reload for DerivedCell<T, U>
where
    T: Send + Sync + 'static,
    U: Debug + Send + Sync + 'static,
{
    fn reload(&self, ctx: &ReloadContext) -> Result<()> {
        let value = compute(self.source.as_ref(), self.transform.as_ref())?;
        self.current.store(Arc::new(value));

        self.dependents.cascade(ctx, &self.label());
        Ok(())
    }

    fn label(&self) -> String {
        format!("derived from {}", self.source.label())
    }

    fn describe(&self) -> String {
        format!(
            "DerivedCell {{ source: {}, value: {:?} }}",
            self.source.label(),
            self.get()
        )
    }
}

impl<T, U> Source<U> for DerivedCell<T, U>
where
    T: Send + Sync + 'static,
    U: Debug + Send + Sync + 'static,
{
    fn snapshot(&self) -> Option<Arc<U>> {
        Some(self.get())
    }

    fn add_dependent(&self, dependent: Weak<dyn Reload>) {
        self.dependents.push(dependent);
    }
}

impl<T, U: Debug> Debug for DerivedCell<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedCell")
            .field("source", &self.source.label())
            .field("value", &self.current.load_full())
            .finish()
    }
}
