pub mod poller;

pub use poller::{PollTick, Poller};
