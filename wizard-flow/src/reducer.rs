use crate::error::Result;

/// Pure transition function of a wizard.
///
/// `reduce` never mutates its input: it either returns the next state or an
/// error, in which case the stored state is left untouched.
pub trait Reducer: Send + Sync + 'static {
    type State: Clone + Send + Sync + 'static;
    type Event: Send + 'static;

    /// State a fresh session starts in
    fn initial(&self) -> Self::State;

    /// Compute the next state for `event`
    fn reduce(&self, state: &Self::State, event: Self::Event) -> Result<Self::State>;

    /// Events that discard the session's progress. Applying one bumps the
    /// session epoch and aborts any pending operation.
    fn discards_pending(&self, _event: &Self::Event) -> bool {
        false
    }

    /// Short state label used in logs and errors
    fn label(&self, state: &Self::State) -> &'static str;
}
