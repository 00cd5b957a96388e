//! Connection-side machinery: the stream registry, per-stream state and
//! shared data, the request body pump, the socket driver, and the
//! `Connection` that ties them together.

pub mod body;
pub mod connection;
pub mod io;
pub mod store;
pub mod stream;

pub use body::{BlockingBody, BodyLogger, BodySource, DataPoll, NullLogger, PollableBody};
pub use connection::{Connection, ConnectionConfig};
pub use io::Io;
pub use store::{Key, Store};
pub use stream::{Shared, Stream, StreamState};
