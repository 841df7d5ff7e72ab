//! FlowRunner – convenience wrapper that loads a session, applies **one** event through the
//! reducer, and stores the result back, all under the storage's per-session lock.
//!
//! ## Pending operations
//! Some transitions kick off slow work (an outbound call, for example) whose outcome arrives
//! later as another event. [`FlowRunner::dispatch_and_spawn`] applies the triggering event,
//! spawns the operation on the Tokio runtime and registers its abort handle on the session
//! together with the session's current epoch.
//!
//! When the operation finishes, its event is applied through [`FlowRunner::complete`] only if
//! the session is still at the epoch the operation was issued under. Resetting a session (any
//! event for which [`Reducer::discards_pending`] is true, or deleting it) bumps the epoch and
//! aborts the task, so a late result can never overwrite a fresh state.
//!
//! ```rust,ignore
//! let session = runner.start().await?;
//! runner.dispatch(&session.id, Event::Submit(form)).await?;
//! runner
//!     .dispatch_and_spawn(&session.id, Event::Confirm, |state| async move {
//!         Event::Done(do_work(state).await)
//!     })
//!     .await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    error::{FlowError, Result},
    reducer::Reducer,
    storage::{Session, SessionStorage},
};

/// High-level helper that orchestrates the _load → reduce → save_ pattern.
pub struct FlowRunner<R: Reducer> {
    reducer: Arc<R>,
    storage: Arc<dyn SessionStorage<R::State>>,
}

impl<R: Reducer> Clone for FlowRunner<R> {
    fn clone(&self) -> Self {
        Self {
            reducer: self.reducer.clone(),
            storage: self.storage.clone(),
        }
    }
}

impl<R: Reducer> FlowRunner<R> {
    pub fn new(reducer: Arc<R>, storage: Arc<dyn SessionStorage<R::State>>) -> Self {
        Self { reducer, storage }
    }

    pub fn reducer(&self) -> &R {
        &self.reducer
    }

    /// Create and store a session in the reducer's initial state
    pub async fn start(&self) -> Result<Session<R::State>> {
        let session = Session::new(self.reducer.initial());
        self.storage.save(session.clone()).await?;
        info!(session_id = %session.id, "Session started");
        Ok(session)
    }

    pub async fn session(&self, id: &str) -> Result<Session<R::State>> {
        self.storage
            .get(id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(id.to_string()))
    }

    /// Apply exactly one event to the session and persist the new state
    pub async fn dispatch(&self, id: &str, event: R::Event) -> Result<Session<R::State>> {
        let reducer = &*self.reducer;
        self.storage
            .update(
                id,
                Box::new(move |session: &mut Session<R::State>| {
                    apply_event(reducer, session, event)
                }),
            )
            .await
    }

    /// Apply `event`, then run `operation` in the background against the resulting state.
    ///
    /// Returns the session as it was right after `event` was applied. The event produced by
    /// `operation` is fed back through [`FlowRunner::complete`].
    pub async fn dispatch_and_spawn<F, Fut>(
        &self,
        id: &str,
        event: R::Event,
        operation: F,
    ) -> Result<Session<R::State>>
    where
        F: FnOnce(R::State) -> Fut + Send + 'static,
        Fut: Future<Output = R::Event> + Send + 'static,
    {
        let session = self.dispatch(id, event).await?;
        let issued = session.epoch;
        let session_id = session.id.clone();
        let state = session.state.clone();
        let runner = self.clone();

        let handle = tokio::spawn(async move {
            let outcome = operation(state).await;
            match runner.complete(&session_id, issued, outcome).await {
                Ok(session) => debug!(
                    session_id = %session_id,
                    state = runner.reducer.label(&session.state),
                    "Pending operation applied"
                ),
                Err(e @ FlowError::StaleOperation { .. }) | Err(e @ FlowError::SessionNotFound(_)) => {
                    debug!(session_id = %session_id, error = %e, "Dropping pending operation result")
                }
                Err(e) => warn!(
                    session_id = %session_id,
                    error = %e,
                    "Pending operation result rejected"
                ),
            }
        });

        let abort = handle.abort_handle();
        let registered = self
            .storage
            .update(
                id,
                Box::new(move |session: &mut Session<R::State>| {
                    if session.epoch == issued {
                        session.pending = Some(abort);
                    } else {
                        abort.abort();
                    }
                    Ok(())
                }),
            )
            .await;

        if let Err(e) = registered {
            handle.abort();
            return Err(e);
        }

        Ok(session)
    }

    /// Apply the outcome of a pending operation issued at epoch `issued`.
    ///
    /// Fails with [`FlowError::StaleOperation`] when the session has been reset since.
    pub async fn complete(
        &self,
        id: &str,
        issued: u64,
        event: R::Event,
    ) -> Result<Session<R::State>> {
        let reducer = &*self.reducer;
        self.storage
            .update(
                id,
                Box::new(move |session: &mut Session<R::State>| {
                    if session.epoch != issued {
                        return Err(FlowError::StaleOperation {
                            session_id: session.id.clone(),
                            issued,
                            current: session.epoch,
                        });
                    }
                    session.pending = None;
                    apply_event(reducer, session, event)
                }),
            )
            .await
    }

    /// Drop the session entirely, aborting anything still pending for it
    pub async fn discard(&self, id: &str) -> Result<()> {
        // Surface unknown ids instead of silently succeeding
        self.session(id).await?;
        self.storage.delete(id).await?;
        info!(session_id = %id, "Session discarded");
        Ok(())
    }
}

fn apply_event<R: Reducer>(
    reducer: &R,
    session: &mut Session<R::State>,
    event: R::Event,
) -> Result<()> {
    let discards = reducer.discards_pending(&event);
    let from = reducer.label(&session.state);
    let next = reducer.reduce(&session.state, event)?;

    if discards {
        session.invalidate();
    }

    debug!(
        session_id = %session.id,
        from,
        to = reducer.label(&next),
        epoch = session.epoch,
        "State transition"
    );
    session.state = next;
    Ok(())
}
