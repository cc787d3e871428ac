pub mod finder;
pub mod window;

pub use finder::{Snapshot, WindowFinder};
pub use window::CandidateWindow;
