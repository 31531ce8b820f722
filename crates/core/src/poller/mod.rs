//! Turns the job feed into a lazy, restartable stream of unprocessed
//! candidates for one pipeline kind.

mod marker;
mod stream;

pub use marker::Marker;
pub use stream::{PollError, Poller};
