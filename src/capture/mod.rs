pub mod classifier;
pub mod controller;
pub mod pipeline;
pub mod recorder;
pub mod session;

pub use classifier::{step, CaptureState, Effect};
pub use controller::CaptureController;
pub use pipeline::{SessionPipeline, SessionReport};
pub use recorder::{record, RecordSummary};
pub use session::{capture, CaptureEnd, CapturedSession, Session};
