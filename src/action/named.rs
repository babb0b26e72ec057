//! Named actions
//!
//! A [`NamedAction`] is an [`Action`] with a `(type, id)` identity. The type
//! is a shared category (e.g. `"fetch-user"`), the id is unique within that
//! type. Identical logical work must produce an identical pair.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Action, ActionFn, ActionRef};
use crate::context::Context;
use crate::Result;

/// An action carrying a `(type, id)` identity
pub trait NamedAction: Action {
    /// General category of this action; shared between actions with the
    /// same behavior
    fn action_type(&self) -> &str;

    /// Unique name of this action within its type
    fn id(&self) -> &str;
}

/// Function-backed named action
#[derive(Debug)]
pub struct Named<F> {
    inner: ActionFn<F>,
    action_type: String,
    id: String,
}

impl<F> Named<F> {
    /// Create a named action from a closure
    pub fn new(action_type: impl Into<String>, id: impl Into<String>, f: F) -> Self {
        Self {
            inner: ActionFn::new(f),
            action_type: action_type.into(),
            id: id.into(),
        }
    }
}

#[async_trait]
impl<F, Fut> Action for Named<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn execute(&self, ctx: Context) -> Result<()> {
        self.inner.execute(ctx).await
    }

    fn as_named(&self) -> Option<&dyn NamedAction> {
        Some(self)
    }
}

impl<F, Fut> NamedAction for Named<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn action_type(&self) -> &str {
        &self.action_type
    }

    fn id(&self) -> &str {
        &self.id
    }
}

/// Create a shared named action from a closure
///
/// # Example
/// ```
/// use actionflow::named;
///
/// let act = named("fetch-user", "42", |_ctx| async { Ok(()) });
/// let id = act.as_named().unwrap();
/// assert_eq!(id.action_type(), "fetch-user");
/// assert_eq!(id.id(), "42");
/// ```
pub fn named<F, Fut>(action_type: impl Into<String>, id: impl Into<String>, f: F) -> ActionRef
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(Named::new(action_type, id, f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_named_identity() {
        let act = named("add", "+1", |_ctx| async { Ok(()) });

        let identity = act.as_named().expect("named action");
        assert_eq!(identity.action_type(), "add");
        assert_eq!(identity.id(), "+1");
        assert!(act.execute(Context::new()).await.is_ok());
    }
}
