pub mod request;
pub mod stream;
pub mod types;

pub use request::ResponsesRequestBody;
pub use stream::StreamEventKind;
pub use types::*;
