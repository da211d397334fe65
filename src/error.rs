use std::num::ParseIntError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Fmp4Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("out of bits: requested {requested}, available {available}")]
    OutOfBits { requested: usize, available: usize },

    #[error("too many bits requested: {0}")]
    TooManyBits(u32),

    #[error("invalid exp-golomb code: {0} leading zero bits")]
    InvalidGolomb(u32),

    #[error("unrecognized aspect_ratio_idc: {0}")]
    UnrecognizedAspectRatioIndex(u8),

    #[error("fragment not ready: {0}")]
    FragmentNotReady(String),

    #[error("fragment payload is empty")]
    EmptyPayload,

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("parse int error: {0}")]
    ParseInt(#[from] ParseIntError),
}

pub type Result<T> = std::result::Result<T, Fmp4Error>;
