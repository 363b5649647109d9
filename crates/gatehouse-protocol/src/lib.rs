//! Wire types shared by the Gatehouse daemon and client.
//!
//! The crate holds the request and response envelopes, the client-visible
//! error taxonomy, the declarative command shapes, and the type validator.
//! Validation is pure so the client can mirror it before sending; the daemon
//! always re-runs it and is the only authority.

mod declaration;
mod errors;
mod request;
mod response;
mod types;
pub mod validate;
mod value;

pub use declaration::{CommandDef, ModuleDef, ParameterDef};
pub use errors::ProtocolError;
pub use request::Request;
pub use response::{ErrorDescriptor, FieldError, Response};
pub use types::{ParamType, UnsupportedType};
pub use validate::{PayloadLength, Rejection, validate_all};
pub use value::{Arguments, Coerced, FileHandle, Money, TypedValue};
