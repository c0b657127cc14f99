use thiserror::Error;

use crate::common::error::DomainError;

use super::entity::{Attr, Direction};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnTrackError {
    #[error("{direction} tuple mixes address families: {src_family} source with {dst_family} destination")]
    AddressFamilyMismatch {
        direction: Direction,
        src_family: &'static str,
        dst_family: &'static str,
    },

    #[error("{direction} tuple has no layer 4 protocol; set it before {attr}")]
    MissingL4Protocol { direction: Direction, attr: Attr },

    #[error("attribute {attr} does not apply to layer 4 protocol {protonum}")]
    NotApplicable { attr: Attr, protonum: u8 },

    #[error("{state} state recorded for a connection with layer 4 protocol {protonum}")]
    StateProtocolMismatch { state: &'static str, protonum: u8 },

    #[error("{direction} tuple declares layer 3 protocol {l3protonum} but carries {family} addresses")]
    L3ProtocolMismatch {
        direction: Direction,
        l3protonum: u8,
        family: &'static str,
    },

    #[error("unknown {protocol} state value {value}")]
    UnknownState { protocol: &'static str, value: u8 },
}

impl From<ConnTrackError> for DomainError {
    fn from(e: ConnTrackError) -> Self {
        DomainError::InvalidRecord(e.to_string())
    }
}
