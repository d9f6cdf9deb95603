pub use error::WavecastError;
pub use recorder::{StreamRecorder, StreamState};
pub use store::{ContainerStore, FileStore};
pub use wav::{WavSpec, WAV_HEADER_LEN};

mod error;
pub mod range;
pub mod recorder;
pub mod server;
pub mod store;
pub mod wav;
