use crate::error::ProtocolError;

/// AV/C opcodes used by the discovery core.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Opcode {
    PlugInfo,
    SignalSource,
    StreamFormatSupport,
    UnitInfo,
    SubunitInfo,
}

impl Opcode {
    pub fn code(&self) -> u8 {
        match self {
            Opcode::PlugInfo => 0x02,
            Opcode::SignalSource => 0x1a,
            Opcode::StreamFormatSupport => 0x2f,
            Opcode::UnitInfo => 0x30,
            Opcode::SubunitInfo => 0x31,
        }
    }
}

/// Subunit-address byte targeting the unit itself.
pub const UNIT_TARGET: u8 = 0xff;

/// The single transaction primitive every command surface is built on.
///
/// Implementations wrap a real FCP endpoint and perform one AV/C status
/// transaction at a time: `target` is the subunit-address byte of the frame
/// ([`UNIT_TARGET`] for the unit), and the returned bytes are the response
/// operands, everything after the three-byte response header. An AV/C
/// REJECTED response surfaces as [`ProtocolError::Rejected`]; link-level
/// failures surface as [`ProtocolError::Transport`].
pub trait FcpTransaction {
    fn status_request(
        &mut self,
        target: u8,
        opcode: Opcode,
        operands: &[u8],
    ) -> Result<Vec<u8>, ProtocolError>;
}
