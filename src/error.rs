use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// Wire-level AVP decode failure: truncated header, length shorter than
    /// the header itself, or length exceeding the remaining buffer.
    MalformedAvp(String),
    /// Wire-level message decode failure (bad header, truncated AVP list).
    MalformedMessage(String),
    /// Message header version field was not 1.
    UnsupportedVersion(u8),
    /// No application is registered for the message's application-id.
    UnknownApplication(u32),
    /// `route_request` found no READY peer matching the message.
    NoRoute,
    /// `send_request` deadline elapsed before an answer arrived.
    RequestTimeout,
    /// Caller cancelled a pending `send_request` before it completed.
    RequestCancelled,
    /// The connection carrying a pending request closed before answering.
    PeerDisconnected,
    /// Underlying transport I/O failed.
    TransportError(String),
    /// CER/CEA application-id or vendor-id negotiation produced no overlap.
    CapabilityMismatch(String),
    /// A request marked for mandatory-AVP checking was missing one.
    MissingMandatoryAvp(u32),
    DecodeError(String),
    EncodeError(String),
    UnknownAvpCode(u32),
    ClientError(String),
    ServerError(String),
    IoError(std::io::Error),
    TryFromSliceError(std::array::TryFromSliceError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MalformedAvp(msg) => write!(f, "malformed AVP: {}", msg),
            Error::MalformedMessage(msg) => write!(f, "malformed message: {}", msg),
            Error::UnsupportedVersion(v) => write!(f, "unsupported Diameter version: {}", v),
            Error::UnknownApplication(id) => write!(f, "no application registered for id {}", id),
            Error::NoRoute => write!(f, "no route to a ready peer"),
            Error::RequestTimeout => write!(f, "request timed out"),
            Error::RequestCancelled => write!(f, "request was cancelled"),
            Error::PeerDisconnected => write!(f, "peer connection closed"),
            Error::TransportError(msg) => write!(f, "transport error: {}", msg),
            Error::CapabilityMismatch(msg) => write!(f, "capability mismatch: {}", msg),
            Error::MissingMandatoryAvp(code) => write!(f, "missing mandatory AVP {}", code),
            Error::DecodeError(msg) => write!(f, "{}", msg),
            Error::EncodeError(msg) => write!(f, "{}", msg),
            Error::UnknownAvpCode(code) => write!(f, "Unknown AVP code: {}", code),
            Error::ClientError(msg) => write!(f, "{}", msg),
            Error::ServerError(msg) => write!(f, "{}", msg),
            Error::IoError(e) => write!(f, "{}", e),
            Error::TryFromSliceError(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<std::array::TryFromSliceError> for Error {
    fn from(err: std::array::TryFromSliceError) -> Error {
        Error::TryFromSliceError(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
