pub mod session;
pub mod audio;
pub mod events;
pub mod media;

pub use session::Session;
pub use events::{ClientEvent, ServerEvent};
pub use media::{MediaPayload, MediaStreamEvent};
