//! Object factory capability supplied by the embedding application

use crate::errors::FactoryError;

use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Creates, destroys and optionally validates pooled objects.
///
/// `create` is called concurrently from the scaler's background tasks, so
/// implementations must be safe to run in parallel and must not leak
/// resources when they fail. `destroy` receives only objects previously
/// produced by `create` on the same pool.
///
/// # Examples
///
/// ```
/// use adaptive_objectpool::{FactoryError, ObjectFactory};
/// use async_trait::async_trait;
///
/// struct Buffers;
///
/// #[async_trait]
/// impl ObjectFactory<Vec<u8>> for Buffers {
///     async fn create(&self) -> Result<Vec<u8>, FactoryError> {
///         Ok(Vec::with_capacity(4096))
///     }
///
///     async fn destroy(&self, _buf: Vec<u8>) -> Result<(), FactoryError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ObjectFactory<T: Send + 'static>: Send + Sync {
    /// Build a new object.
    async fn create(&self) -> Result<T, FactoryError>;

    /// Tear an object down for good.
    async fn destroy(&self, obj: T) -> Result<(), FactoryError>;

    /// Check whether an object may go back into circulation.
    ///
    /// The pool itself never calls this on `give_back`; it is used by
    /// [`PooledObject`](crate::PooledObject) and exposed through
    /// [`Pool::validate`](crate::Pool::validate) for wrapping layers.
    fn validate(&self, _obj: &T) -> Result<(), FactoryError> {
        Ok(())
    }
}

/// Wrap any error into the opaque [`FactoryError`].
pub fn factory_error<E>(err: E) -> FactoryError
where
    E: StdError + Send + Sync + 'static,
{
    Arc::new(err)
}

type CreateFn<T> = Box<dyn Fn() -> Result<T, FactoryError> + Send + Sync>;
type DestroyFn<T> = Box<dyn Fn(T) -> Result<(), FactoryError> + Send + Sync>;
type ValidateFn<T> = Box<dyn Fn(&T) -> Result<(), FactoryError> + Send + Sync>;

/// Factory built from plain closures
///
/// The closures run on the async runtime's worker threads, so they should be
/// quick. Slow or blocking constructors belong in a hand-written
/// [`ObjectFactory`] that offloads them.
///
/// # Examples
///
/// ```
/// use adaptive_objectpool::FnFactory;
///
/// let factory = FnFactory::new(|| Ok(String::from("conn")))
///     .with_destroy(|conn| {
///         drop(conn);
///         Ok(())
///     })
///     .with_validation(|_conn| Ok(()));
/// # let _ = factory;
/// ```
pub struct FnFactory<T> {
    create: CreateFn<T>,
    destroy: DestroyFn<T>,
    validate: Option<ValidateFn<T>>,
}

impl<T: Send + 'static> FnFactory<T> {
    /// Create a factory whose `destroy` simply drops the object
    pub fn new<F>(create: F) -> Self
    where
        F: Fn() -> Result<T, FactoryError> + Send + Sync + 'static,
    {
        Self {
            create: Box::new(create),
            destroy: Box::new(|obj| {
                drop(obj);
                Ok(())
            }),
            validate: None,
        }
    }

    /// Set the destruction closure
    pub fn with_destroy<F>(mut self, destroy: F) -> Self
    where
        F: Fn(T) -> Result<(), FactoryError> + Send + Sync + 'static,
    {
        self.destroy = Box::new(destroy);
        self
    }

    /// Set the validation closure
    pub fn with_validation<F>(mut self, validate: F) -> Self
    where
        F: Fn(&T) -> Result<(), FactoryError> + Send + Sync + 'static,
    {
        self.validate = Some(Box::new(validate));
        self
    }
}

impl<T> fmt::Debug for FnFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFactory")
            .field("has_validation", &self.validate.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T: Send + 'static> ObjectFactory<T> for FnFactory<T> {
    async fn create(&self) -> Result<T, FactoryError> {
        (self.create)()
    }

    async fn destroy(&self, obj: T) -> Result<(), FactoryError> {
        (self.destroy)(obj)
    }

    fn validate(&self, obj: &T) -> Result<(), FactoryError> {
        match self.validate {
            Some(ref validate) => validate(obj),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_fn_factory_create_and_destroy() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&destroyed);
        let factory = FnFactory::new(|| Ok(7u32)).with_destroy(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let obj = factory.create().await.unwrap();
        assert_eq!(obj, 7);
        factory.destroy(obj).await.unwrap();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fn_factory_validation() {
        let factory = FnFactory::new(|| Ok(0i32)).with_validation(|v| {
            if *v >= 0 {
                Ok(())
            } else {
                Err(factory_error(std::io::Error::other("negative")))
            }
        });

        assert!(factory.validate(&1).is_ok());
        assert!(factory.validate(&-1).is_err());
    }

    #[test]
    fn test_fn_factory_accepts_everything_by_default() {
        let factory = FnFactory::new(|| Ok(0i32));
        assert!(factory.validate(&-5).is_ok());
    }
}
