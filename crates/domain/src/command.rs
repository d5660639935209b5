//! Command abstraction.

use common::AggregateId;

use crate::aggregate::AggregateRoot;

/// Trait for commands that can be executed against an aggregate.
///
/// Commands represent an intention to perform an action. They may be rejected
/// if the input is invalid, or ignored if the aggregate's current state
/// doesn't allow the action.
pub trait Command: Send + Sync {
    /// The type of aggregate this command targets.
    type Aggregate: AggregateRoot;

    /// Returns the ID of the aggregate this command targets.
    fn aggregate_id(&self) -> AggregateId;

    /// Returns the command name used in logs and metrics labels.
    fn command_name(&self) -> &'static str;
}
