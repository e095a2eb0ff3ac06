//! Concrete transport providers.

pub mod reqwest;

pub use self::reqwest::ReqwestTransport;
