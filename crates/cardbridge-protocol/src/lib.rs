pub mod codec;
pub mod message;

pub use codec::{CodecError, DEFAULT_MAX_FRAME_SIZE, RelayCodec};
pub use message::{ConnectionType, Envelope, EnvelopeMeta, Message, Payload, PayloadType, RelayInfo};
