//! Delivery collaborator trait.
//!
//! The host implements `Deliverer` on top of its messaging transport. Keeping
//! it a trait decouples the delivery loop from any chat protocol and lets
//! tests record what would have been sent.

use std::future::Future;
use std::pin::Pin;

use chunkcast_transfer::Chunk;

use crate::error::DeliveryError;

/// Future returned by [`Deliverer`] methods.
pub type DeliverFuture<'a> = Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + 'a>>;

/// Sends parts and text replies to requesters.
pub trait Deliverer: Send + Sync {
    /// Sends one part to `destination`.
    ///
    /// Takes ownership of the chunk: the part file is removed when the chunk
    /// is dropped, so implementations must send or persist it first.
    fn deliver<'a>(&'a self, destination: &'a str, chunk: Chunk, caption: &'a str)
    -> DeliverFuture<'a>;

    /// Sends a text-only message to `destination`.
    fn notify<'a>(&'a self, destination: &'a str, text: &'a str) -> DeliverFuture<'a>;
}
