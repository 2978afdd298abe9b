use crate::address::{PlugAddress, PlugAddressMode};
use crate::error::ProtocolError;
use crate::transaction::{FcpTransaction, Opcode, UNIT_TARGET};
use bebob_types::{PlugDirection, SubunitType, UnitPlugType};
use log::debug;

// Unit plug numbering of the SIGNAL SOURCE command: external input plugs
// live in a window above the isochronous ones.
const EXTERNAL_PLUG_BASE: u8 = 0x80;

/// The two-byte signal address the CCM commands speak.
///
/// Only unit plugs (isochronous and external) and subunit plugs can appear
/// in a signal connection; function block plugs cannot.
fn signal_address(addr: &PlugAddress) -> Result<[u8; 2], ProtocolError> {
    match addr.mode {
        PlugAddressMode::Unit {
            plug_type: UnitPlugType::Isoc,
            plug,
        } => Ok([0xff, plug]),
        PlugAddressMode::Unit {
            plug_type: UnitPlugType::External,
            plug,
        } => {
            // The external window is only seven bits wide.
            if plug >= EXTERNAL_PLUG_BASE {
                return Err(ProtocolError::InvalidAddress(
                    "external plug number too large for a signal address",
                ));
            }
            Ok([0xff, EXTERNAL_PLUG_BASE + plug])
        }
        PlugAddressMode::Unit {
            plug_type: UnitPlugType::Async,
            ..
        } => Err(ProtocolError::InvalidAddress(
            "async plugs have no signal address",
        )),
        PlugAddressMode::Subunit { plug, .. } => Ok([addr.target(), plug]),
        PlugAddressMode::FunctionBlock { .. } => Err(ProtocolError::InvalidAddress(
            "function block plugs have no signal address",
        )),
    }
}

/// Decodes the source half of a SIGNAL SOURCE response. A unit source is
/// reported as an input plug and a subunit source as an output plug, the
/// sides that feed signal connections.
fn parse_signal_address(raw: [u8; 2]) -> Result<PlugAddress, ProtocolError> {
    if raw[0] == 0xff {
        if raw[1] >= EXTERNAL_PLUG_BASE {
            Ok(PlugAddress::unit(
                PlugDirection::Input,
                UnitPlugType::External,
                raw[1] - EXTERNAL_PLUG_BASE,
            ))
        } else {
            Ok(PlugAddress::unit(
                PlugDirection::Input,
                UnitPlugType::Isoc,
                raw[1],
            ))
        }
    } else {
        let subunit_type = SubunitType::from_repr(raw[0] >> 3).ok_or_else(|| {
            ProtocolError::MalformedResponse(format!(
                "subunit type {:#04x} out of range",
                raw[0] >> 3
            ))
        })?;
        PlugAddress::subunit(PlugDirection::Output, subunit_type, raw[0] & 0x07, raw[1])
    }
}

pub trait CcmCommands: FcpTransaction {
    /// Reads the signal source currently feeding `destination`. A rejected
    /// request or an all-sentinel source field both read as "none selected".
    fn get_signal_source(
        &mut self,
        destination: &PlugAddress,
    ) -> Result<Option<PlugAddress>, ProtocolError> {
        let dst = signal_address(destination)?;
        let operands = [0xff, 0xff, 0xff, dst[0], dst[1]];
        let response = match self.status_request(UNIT_TARGET, Opcode::SignalSource, &operands) {
            Ok(response) => response,
            Err(ProtocolError::Rejected) => return Ok(None),
            Err(err) => return Err(err),
        };
        let raw = response.get(1..3).ok_or_else(|| {
            ProtocolError::MalformedResponse("signal source response too short".to_string())
        })?;
        if raw == [0xff, 0xff] {
            return Ok(None);
        }
        parse_signal_address([raw[0], raw[1]]).map(Some)
    }

    /// Asks the device whether `source` can legally feed `destination`.
    /// A rejected status request means "no"; it is not an error.
    fn ask_signal_source(
        &mut self,
        source: &PlugAddress,
        destination: &PlugAddress,
    ) -> Result<bool, ProtocolError> {
        let src = signal_address(source)?;
        let dst = signal_address(destination)?;
        let operands = [0xff, src[0], src[1], dst[0], dst[1]];
        match self.status_request(UNIT_TARGET, Opcode::SignalSource, &operands) {
            Ok(_) => Ok(true),
            Err(ProtocolError::Rejected) => {
                debug!("Signal source {source:?} cannot feed {destination:?}");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}

impl<T: FcpTransaction + ?Sized> CcmCommands for T {}
