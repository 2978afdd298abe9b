use bebob_protocol::error::ProtocolError;
use bebob_types::SubunitType;

#[derive(thiserror::Error, Debug)]
pub enum DiscoveryError {
    #[error("Subunit {subunit_type} reports id {id}; only singleton subunits are supported")]
    UnsupportedSubunitId { subunit_type: SubunitType, id: u8 },

    #[error("The topology has no synchronization destination plug")]
    NoSyncDestination,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
