/*!
    host side runtime for the slot engine, built on tokio

    - [SlotRegistry] is the arena of populated slots indexed by slot number
    - [Runtime] ticks every slot periodically, forwards fault events to a channel and runs deferred jobs on
      a low priority worker
    - [confirm] publishes a parameter block and waits until the engine reports it transferred
*/

mod registry;
mod runtime;
mod confirm;

pub use registry::{SlotRegistry, BoxedSlot, DynSlot};
pub use runtime::{Runtime, HostSystem, EVENT_QUEUE};
pub use confirm::{confirm, confirm_update, wait_transferred};
