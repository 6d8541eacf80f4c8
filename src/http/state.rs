use crate::auth::{Accounts, JwtAuthority};
use crate::broker::Dispatcher;
use crate::persistence::TelemetryStore;
use crate::simulator::Simulator;

/// Shared state handed to every handler via `State<AppState>`.
///
/// Cheap to clone: each field is a handle onto shared data.
#[derive(Debug, Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub store: TelemetryStore,
    pub authority: JwtAuthority,
    pub accounts: Accounts,
    pub simulator: Simulator,
}
