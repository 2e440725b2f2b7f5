//! Child controller naming, facade and request bookkeeping.

mod facade;
mod loopback;
mod pending;
mod types;

pub use facade::{ChildControl, PendingRequest};
pub use loopback::LoopbackChildControl;
pub use pending::PendingTable;
pub use types::{ChildName, ChildType};
