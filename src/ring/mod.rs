//! Lock-free publish and consume over a topic's slot ring
//!
//! Publishers reserve a sequence from the topic's `w_head` with a fetch-add,
//! write the slot, then commit by release-storing the sequence into the slot
//! header. Subscribers poll `w_head`, acquire-load the slot's sequence, copy
//! the payload out and re-check the sequence to reject torn reads. Nothing
//! on either path takes a lock or enters the kernel.

pub mod mwmr;
pub mod subscriber;
pub mod swmr;

pub use mwmr::MwmrPublisher;
pub use subscriber::{Recv, Subscriber};
pub use swmr::SwmrPublisher;
