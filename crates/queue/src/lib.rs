//! Bounded download queue with chunked delivery.
//!
//! Request handlers admit downloads into a shared [`DownloadQueue`]; a single
//! [`DeliveryLoop`] task drains it at a fixed cadence, sending every active
//! download one part per cycle through a [`Deliverer`].
//!
//! # Flow
//!
//! 1. **Admit**: one entry per requester, bounded by the queue capacity
//! 2. **Fetch**: on its first cycle an entry fetches its source
//! 3. **Deliver**: each cycle sends the next part of every entry
//! 4. **Evict**: finished and failed entries leave the queue

pub mod deliver;
pub mod delivery;
pub mod error;
pub mod queue;
pub mod request;

pub use deliver::{DeliverFuture, Deliverer};
pub use delivery::{CycleReport, DeliveryLoop};
pub use error::{AdmitError, DeliveryError};
pub use queue::{DownloadQueue, MAX_QUEUE_SIZE};
pub use request::{
    FAILED_REPLY, QUEUED_REPLY, RequestHandler, admission_reply, too_big_reply,
};
