//! Value types and primitives shared by the runtime.
//!
//! - `StateChange`: the `(from, to, payload)` record delivered to observers
//! - `Veto`: cancellation predicates consulted at transition time
//! - `Channel`: ordered broadcast with explicit unsubscribe and close

mod change;
pub(crate) mod channel;
pub(crate) mod guard;

pub use change::StateChange;
pub use channel::{Channel, Subscription, SubscriptionId};
pub use guard::Veto;
