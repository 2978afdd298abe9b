use crate::error::ProtocolError;
use bebob_types::{AddressMode, PlugDirection, SubunitType, UnitPlugType};

/// Plug addresses are always carried as six bytes on the wire.
pub const ADDRESS_LEN: usize = 6;

/// Sentinel byte value meaning "no address" / "field unused".
pub const NO_ADDRESS: u8 = 0xff;

/// Address of one plug somewhere in the unit.
///
/// The three addressing modes share a single six-byte layout; which of the
/// payload bytes mean what depends entirely on the mode byte, so the
/// mode-specific fields live in a sum type rather than a flat array.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PlugAddress {
    pub direction: PlugDirection,
    pub mode: PlugAddressMode,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlugAddressMode {
    Unit {
        plug_type: UnitPlugType,
        plug: u8,
    },
    Subunit {
        subunit_type: SubunitType,
        subunit_id: u8,
        plug: u8,
    },
    FunctionBlock {
        subunit_type: SubunitType,
        subunit_id: u8,
        fb_type: u8,
        fb_id: u8,
        plug: u8,
    },
}

/// The AV/C target byte addressing one subunit directly.
pub fn subunit_target(subunit_type: SubunitType, subunit_id: u8) -> u8 {
    pack_subunit(subunit_type, subunit_id)
}

fn pack_subunit(subunit_type: SubunitType, subunit_id: u8) -> u8 {
    ((subunit_type as u8) << 3) | subunit_id
}

fn unpack_subunit(byte: u8) -> Result<(SubunitType, u8), ProtocolError> {
    let subunit_type = SubunitType::from_repr(byte >> 3)
        .ok_or(ProtocolError::InvalidAddress("subunit type out of range"))?;
    Ok((subunit_type, byte & 0x07))
}

impl PlugAddress {
    pub fn unit(direction: PlugDirection, plug_type: UnitPlugType, plug: u8) -> Self {
        Self {
            direction,
            mode: PlugAddressMode::Unit { plug_type, plug },
        }
    }

    pub fn subunit(
        direction: PlugDirection,
        subunit_type: SubunitType,
        subunit_id: u8,
        plug: u8,
    ) -> Result<Self, ProtocolError> {
        if subunit_id > 0x07 {
            return Err(ProtocolError::InvalidAddress("subunit id above seven"));
        }
        Ok(Self {
            direction,
            mode: PlugAddressMode::Subunit {
                subunit_type,
                subunit_id,
                plug,
            },
        })
    }

    pub fn function_block(
        direction: PlugDirection,
        subunit_type: SubunitType,
        subunit_id: u8,
        fb_type: u8,
        fb_id: u8,
        plug: u8,
    ) -> Result<Self, ProtocolError> {
        if subunit_id > 0x07 {
            return Err(ProtocolError::InvalidAddress("subunit id above seven"));
        }
        Ok(Self {
            direction,
            mode: PlugAddressMode::FunctionBlock {
                subunit_type,
                subunit_id,
                fb_type,
                fb_id,
                plug,
            },
        })
    }

    /// The subunit-address byte AV/C commands about this plug must target.
    /// Unit plugs target the unit itself.
    pub fn target(&self) -> u8 {
        match self.mode {
            PlugAddressMode::Unit { .. } => NO_ADDRESS,
            PlugAddressMode::Subunit {
                subunit_type,
                subunit_id,
                ..
            }
            | PlugAddressMode::FunctionBlock {
                subunit_type,
                subunit_id,
                ..
            } => pack_subunit(subunit_type, subunit_id),
        }
    }

    /// Whether this is an isochronous unit plug, the only address kind the
    /// cluster queries are defined for.
    pub fn is_isoc_unit(&self) -> bool {
        matches!(
            self.mode,
            PlugAddressMode::Unit {
                plug_type: UnitPlugType::Isoc,
                ..
            }
        )
    }

    pub fn encode(&self) -> [u8; ADDRESS_LEN] {
        let mut raw = [NO_ADDRESS; ADDRESS_LEN];
        raw[0] = self.direction as u8;
        match self.mode {
            PlugAddressMode::Unit { plug_type, plug } => {
                raw[1] = AddressMode::Unit as u8;
                raw[2] = plug_type as u8;
                raw[3] = plug;
            }
            PlugAddressMode::Subunit {
                subunit_type,
                subunit_id,
                plug,
            } => {
                raw[1] = AddressMode::Subunit as u8;
                raw[2] = plug;
                raw[5] = pack_subunit(subunit_type, subunit_id);
            }
            PlugAddressMode::FunctionBlock {
                subunit_type,
                subunit_id,
                fb_type,
                fb_id,
                plug,
            } => {
                raw[1] = AddressMode::FunctionBlock as u8;
                raw[2] = fb_type;
                raw[3] = fb_id;
                raw[4] = plug;
                raw[5] = pack_subunit(subunit_type, subunit_id);
            }
        }
        raw
    }

    /// Decodes the leading six bytes of `raw`. A sentinel in the first byte
    /// means "no address" and decodes to `None`, never to an error.
    pub fn decode(raw: &[u8]) -> Result<Option<Self>, ProtocolError> {
        if raw.len() < ADDRESS_LEN {
            return Err(ProtocolError::InvalidAddress(
                "plug address shorter than six bytes",
            ));
        }
        if raw[0] == NO_ADDRESS {
            return Ok(None);
        }
        let direction = PlugDirection::from_repr(raw[0])
            .ok_or(ProtocolError::InvalidAddress("direction out of range"))?;
        let mode = AddressMode::from_repr(raw[1])
            .ok_or(ProtocolError::InvalidAddress("address mode out of range"))?;
        let mode = match mode {
            AddressMode::Unit => {
                let plug_type = UnitPlugType::from_repr(raw[2])
                    .ok_or(ProtocolError::InvalidAddress("unit plug type out of range"))?;
                PlugAddressMode::Unit {
                    plug_type,
                    plug: raw[3],
                }
            }
            AddressMode::Subunit => {
                let (subunit_type, subunit_id) = unpack_subunit(raw[5])?;
                PlugAddressMode::Subunit {
                    subunit_type,
                    subunit_id,
                    plug: raw[2],
                }
            }
            AddressMode::FunctionBlock => {
                let (subunit_type, subunit_id) = unpack_subunit(raw[5])?;
                PlugAddressMode::FunctionBlock {
                    subunit_type,
                    subunit_id,
                    fb_type: raw[2],
                    fb_id: raw[3],
                    plug: raw[4],
                }
            }
        };
        Ok(Some(Self { direction, mode }))
    }
}
