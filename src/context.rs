//! The execution context activity code runs under. A [Context] is an immutable chain of nodes:
//! deriving a new context (to attach a value or a new cancellation scope) never changes the one
//! it was derived from, so contexts can be shared freely between tasks.

use std::{
    any::{Any, type_name},
    fmt::{Debug, Formatter},
    sync::Arc,
};
use tokio_util::sync::CancellationToken;

/// Carries typed values and cancellation across API boundaries. Cloning is cheap.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextNode>,
}

struct ContextNode {
    parent: Option<Context>,
    cancellation: CancellationToken,
    value: Option<StoredValue>,
}

struct StoredValue {
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl Context {
    /// An empty root context which is never cancelled unless a child scope is created with
    /// [Context::with_cancel].
    pub fn background() -> Self {
        Self {
            inner: Arc::new(ContextNode {
                parent: None,
                cancellation: CancellationToken::new(),
                value: None,
            }),
        }
    }

    /// Returns a new context carrying `value`. Lookups of `T` on the returned context (or anything
    /// derived from it) see this value, shadowing any `T` attached further up the chain.
    pub fn with_value<T: Any + Send + Sync>(&self, value: T) -> Self {
        Self {
            inner: Arc::new(ContextNode {
                parent: Some(self.clone()),
                cancellation: self.inner.cancellation.clone(),
                value: Some(StoredValue {
                    type_name: type_name::<T>(),
                    value: Arc::new(value),
                }),
            }),
        }
    }

    /// Looks up the closest value of type `T` attached to this context or its ancestors
    pub fn value<T: Any + Send + Sync>(&self) -> Option<&T> {
        let mut node = Some(self);
        while let Some(ctx) = node {
            if let Some(found) = ctx
                .inner
                .value
                .as_ref()
                .and_then(|stored| (*stored.value).downcast_ref::<T>())
            {
                return Some(found);
            }
            node = ctx.inner.parent.as_ref();
        }
        None
    }

    /// Returns a child context with its own cancellation scope, and the handle which cancels it.
    /// Cancelling the parent cancels the child, but not the other way around.
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let token = self.inner.cancellation.child_token();
        let ctx = Self {
            inner: Arc::new(ContextNode {
                parent: Some(self.clone()),
                cancellation: token.clone(),
                value: None,
            }),
        };
        (ctx, CancelHandle { token })
    }

    /// Returns true if this context has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancellation.is_cancelled()
    }

    /// Resolves once this context is cancelled. Resolves immediately if it already has been.
    pub async fn cancelled(&self) {
        self.inner.cancellation.cancelled().await
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Debug for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut values = vec![];
        let mut node = Some(self);
        while let Some(ctx) = node {
            if let Some(stored) = &ctx.inner.value {
                values.push(stored.type_name);
            }
            node = ctx.inner.parent.as_ref();
        }
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .field("values", &values)
            .finish()
    }
}

/// Cancels the scope created by [Context::with_cancel]. Cancelling more than once is harmless.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Cancel the associated context and everything derived from it
    pub fn cancel(&self) {
        self.token.cancel()
    }

    /// Returns true if [CancelHandle::cancel] has been called, or the parent scope was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
