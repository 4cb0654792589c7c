pub mod message;

pub use message::{
    CommandPayload, ConfigPayload, Envelope, ErrorPayload, RelayMessage, StatusPayload,
};
