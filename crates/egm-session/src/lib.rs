pub mod engine;
pub mod mock;
pub mod session;
pub mod transport;

pub use engine::{CommandEngine, Reply};
pub use mock::{MockLink, MockLinkHandle};
pub use session::{LifecyclePhase, SessionTiming, TransportSession};
pub use transport::{SerialLink, Transport};
