//! Delivery of messages to the email API.
//!
//! - `Dispatcher`: picks the single or batch endpoint and classifies responses
//! - `Transport`: the HTTP seam, with `ReqwestTransport` for production and
//!   `MockTransport` for tests

mod dispatcher;
mod transport;

pub use dispatcher::{DispatchResult, Dispatcher, Envelope, SendReceipt};
pub use transport::{
    HttpResponse, MockTransport, OutboundRequest, ReqwestTransport, Transport,
    SERVER_TOKEN_HEADER,
};
