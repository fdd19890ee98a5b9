use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::error;

use crate::dispatcher::{DispatchResult, Handler, HandlerFuture, RequestContext};
use crate::error::{ConfigError, DispatchError};

/// A cross-cutting link of the request chain.
///
/// A middleware receives the request context and the [`Next`] cursor. It may
/// delegate with `next.run(ctx)` and return the result as is, transform the
/// result on the way back, or never delegate and answer on its own.
///
/// ```rust
/// use dispatchkit::dispatcher::{DispatchResult, RequestContext};
/// use dispatchkit::middleware::{Middleware, Next};
/// use futures::future::BoxFuture;
///
/// struct PoweredBy;
///
/// impl Middleware for PoweredBy {
///     fn handle(&self, ctx: RequestContext, next: Next) -> BoxFuture<'_, DispatchResult> {
///         Box::pin(async move {
///             let resp = next.run(ctx).await?;
///             Ok(resp.with_header("x-powered-by", "dispatchkit"))
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, ctx: RequestContext, next: Next) -> BoxFuture<'_, DispatchResult>;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Cursor into one chain execution.
///
/// Holds the immutable link sequence and the index of the next unexecuted
/// link. `run` consumes the cursor, so each link delegates at most once and a
/// cursor is never reused by another request.
pub struct Next {
    links: Arc<[Arc<dyn Middleware>]>,
    terminal: Arc<dyn Handler>,
    index: usize,
}

impl Next {
    /// Invoke the next link, or the terminal handler once the links are exhausted.
    ///
    /// Panics raised while building or polling the link's future are caught
    /// here and resolve as [`DispatchError::Panicked`].
    pub fn run(self, ctx: RequestContext) -> HandlerFuture {
        let Next {
            links,
            terminal,
            index,
        } = self;

        Box::pin(async move {
            match links.get(index).cloned() {
                Some(link) => {
                    let next = Next {
                        links,
                        terminal,
                        index: index + 1,
                    };
                    let started =
                        std::panic::catch_unwind(AssertUnwindSafe(|| link.handle(ctx, next)));
                    match started {
                        Ok(fut) => settle(AssertUnwindSafe(fut).catch_unwind().await, link.name()),
                        Err(payload) => settle(Err(payload), link.name()),
                    }
                }
                None => {
                    let started =
                        std::panic::catch_unwind(AssertUnwindSafe(|| terminal.call(ctx)));
                    match started {
                        Ok(fut) => settle(AssertUnwindSafe(fut).catch_unwind().await, "terminal"),
                        Err(payload) => settle(Err(payload), "terminal"),
                    }
                }
            }
        })
    }

    /// Number of middleware links not yet executed (the terminal handler excluded).
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.links.len().saturating_sub(self.index)
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("index", &self.index)
            .field("links", &self.links.len())
            .finish_non_exhaustive()
    }
}

fn settle(outcome: Result<DispatchResult, Box<dyn Any + Send>>, link: &str) -> DispatchResult {
    match outcome {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(link = %link, panic = %message, "Panic captured in request chain");
            Err(DispatchError::Panicked(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Immutable ordered sequence of middleware ending in a terminal handler.
///
/// Built once at startup and shared; every [`execute`](Self::execute) call
/// starts a fresh cursor at index zero.
#[derive(Clone)]
pub struct MiddlewareChain {
    links: Arc<[Arc<dyn Middleware>]>,
    terminal: Arc<dyn Handler>,
}

impl MiddlewareChain {
    #[must_use]
    pub fn builder() -> MiddlewareChainBuilder {
        MiddlewareChainBuilder::default()
    }

    /// Number of middleware links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Names of the links in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.links.iter().map(|l| l.name()).collect()
    }

    /// Run one request through the chain.
    pub fn execute(&self, ctx: RequestContext) -> HandlerFuture {
        Next {
            links: Arc::clone(&self.links),
            terminal: Arc::clone(&self.terminal),
            index: 0,
        }
        .run(ctx)
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("links", &self.names())
            .finish_non_exhaustive()
    }
}

/// Collects middleware in execution order plus the mandatory terminal handler.
#[derive(Default)]
pub struct MiddlewareChainBuilder {
    links: Vec<Arc<dyn Middleware>>,
    terminal: Option<Arc<dyn Handler>>,
}

impl MiddlewareChainBuilder {
    /// Append a middleware. Links run in the order they are added.
    #[must_use]
    pub fn add_middleware(mut self, mw: Arc<dyn Middleware>) -> Self {
        self.links.push(mw);
        self
    }

    /// Append several middleware, keeping their order.
    #[must_use]
    pub fn add_all<I>(mut self, mws: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Middleware>>,
    {
        self.links.extend(mws);
        self
    }

    #[must_use]
    pub fn terminal(mut self, handler: Arc<dyn Handler>) -> Self {
        self.terminal = Some(handler);
        self
    }

    /// Freeze the chain.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingTerminalHandler`] when no terminal handler was set.
    pub fn build(self) -> Result<MiddlewareChain, ConfigError> {
        let terminal = self.terminal.ok_or(ConfigError::MissingTerminalHandler)?;
        Ok(MiddlewareChain {
            links: self.links.into(),
            terminal,
        })
    }
}

impl fmt::Debug for MiddlewareChainBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChainBuilder")
            .field("links", &self.links.len())
            .field("has_terminal", &self.terminal.is_some())
            .finish()
    }
}
