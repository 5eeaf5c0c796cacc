pub mod poller;
pub mod render;
pub mod replay;

pub use poller::{replay_once, watch, PollOutcome, Poller};
pub use render::render_summary;
pub use replay::{read_cycle, DirectorySource};
