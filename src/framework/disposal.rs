//! # Resource Disposal Chain
//!
//! Entities often own things that live outside the actor: spawned tasks,
//! timers, sockets, subscriptions. Attach them to the entity and they are
//! released, in attachment order, when the entity terminates.
//!
//! Release is best effort: a failing resource never prevents the following
//! ones from being released, and all failures are reported together once
//! every resource has been attempted.

use crate::framework::error::{DisposalError, HandlerError, ReleaseFailure};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// An externally owned resource that must be released with its entity.
pub trait Resource: Send + 'static {
    /// Name used in logs and disposal errors.
    fn name(&self) -> String {
        crate::framework::message::short_type_name(std::any::type_name::<Self>()).to_string()
    }

    fn release(&mut self) -> Result<(), HandlerError>;
}

impl<T: Send + 'static> Resource for tokio::task::JoinHandle<T> {
    fn release(&mut self) -> Result<(), HandlerError> {
        self.abort();
        Ok(())
    }
}

impl Resource for CancellationToken {
    fn release(&mut self) -> Result<(), HandlerError> {
        self.cancel();
        Ok(())
    }
}

/// Adapts a one-shot closure into a [`Resource`].
pub struct FnResource<F> {
    name: String,
    release: Option<F>,
}

impl<F> FnResource<F>
where
    F: FnOnce() -> Result<(), HandlerError> + Send + 'static,
{
    pub fn new(name: impl Into<String>, release: F) -> Self {
        Self {
            name: name.into(),
            release: Some(release),
        }
    }
}

impl<F> Resource for FnResource<F>
where
    F: FnOnce() -> Result<(), HandlerError> + Send + 'static,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn release(&mut self) -> Result<(), HandlerError> {
        match self.release.take() {
            Some(release) => release(),
            None => Ok(()),
        }
    }
}

/// The error returned when attaching to a chain that was already disposed.
///
/// Carries the rejected resource back so the caller can release it itself.
pub struct Rejected(pub Box<dyn Resource>);

/// Append-only list of resources owned by one entity.
#[derive(Default)]
pub struct DisposalChain {
    resources: Vec<Box<dyn Resource>>,
    disposed: bool,
}

impl DisposalChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, resource: Box<dyn Resource>) -> Result<(), Rejected> {
        if self.disposed {
            return Err(Rejected(resource));
        }
        debug!(resource = %resource.name(), "Resource attached");
        self.resources.push(resource);
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Releases every attached resource in attachment order.
    ///
    /// The chain is marked disposed even when some releases fail. Calling this
    /// again is a no-op.
    pub fn dispose_all(&mut self) -> Result<(), DisposalError> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;

        let attempted = self.resources.len();
        let mut failures = Vec::new();
        for (index, mut resource) in self.resources.drain(..).enumerate() {
            let name = resource.name();
            if let Err(source) = resource.release() {
                error!(resource = %name, index, error = %source, "Failed to release resource");
                failures.push(ReleaseFailure {
                    index,
                    resource: name,
                    source,
                });
            }
        }

        if failures.is_empty() {
            debug!(attempted, "Resources released");
            Ok(())
        } else {
            Err(DisposalError {
                attempted,
                failures,
            })
        }
    }
}
