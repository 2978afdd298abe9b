use crate::address::{PlugAddress, ADDRESS_LEN, NO_ADDRESS};
use crate::error::ProtocolError;
use crate::transaction::{FcpTransaction, Opcode, UNIT_TARGET};
use bebob_types::{ChannelPosition, PlugType, PortType, UnitPlugType};
use byteorder::ReadBytesExt;
use enum_map::EnumMap;
use log::warn;
use std::io::{Cursor, Read};

// BridgeCo extended plug info subfunction.
const BCO_PLUG_INFO: u8 = 0xc0;

// Info type byte of the extended plug info command.
const INFO_PLUG_TYPE: u8 = 0x00;
const INFO_PLUG_NAME: u8 = 0x01;
const INFO_CHANNEL_COUNT: u8 = 0x02;
const INFO_CLUSTER_LAYOUT: u8 = 0x03;
const INFO_CHANNEL_NAME: u8 = 0x04;
const INFO_INPUT: u8 = 0x05;
const INFO_OUTPUTS: u8 = 0x06;
const INFO_CLUSTER_INFO: u8 = 0x07;

// Response operands echo the subfunction, the five address bytes and the
// info type before any data.
const RESPONSE_DATA: u64 = 7;

/// One channel of a cluster: which channel of the plug sits where.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClusterEntry {
    pub channel: u8,
    pub position: ChannelPosition,
}

/// Name and port class of one cluster, as returned by the cluster info query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterInfo {
    pub name: String,
    pub port_type: PortType,
}

/// Input and output plug counts for one plug class.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PlugCounts {
    pub inputs: u8,
    pub outputs: u8,
}

fn plug_info_operands(addr: &PlugAddress, info_type: u8, extra: [u8; 2]) -> [u8; 9] {
    let raw = addr.encode();
    [
        BCO_PLUG_INFO,
        raw[0],
        raw[1],
        raw[2],
        raw[3],
        raw[4],
        info_type,
        extra[0],
        extra[1],
    ]
}

fn data_cursor(response: &[u8]) -> Cursor<&[u8]> {
    let mut cursor = Cursor::new(response);
    cursor.set_position(RESPONSE_DATA);
    cursor
}

fn read_text(cursor: &mut Cursor<&[u8]>) -> Result<String, ProtocolError> {
    let length = cursor.read_u8()? as usize;
    if length == 0 {
        return Ok(String::new());
    }
    let mut buf = vec![0; length];
    cursor.read_exact(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).to_string())
}

/// The per-plug attribute queries of the BridgeCo extended plug info command.
///
/// Every method issues one status request against the plug's address and
/// decodes the reply shape specific to that info type.
pub trait PlugInfoCommands: FcpTransaction {
    fn get_plug_type(&mut self, addr: &PlugAddress) -> Result<PlugType, ProtocolError> {
        let response = self.status_request(
            addr.target(),
            Opcode::PlugInfo,
            &plug_info_operands(addr, INFO_PLUG_TYPE, [0xff, 0xff]),
        )?;
        let value = data_cursor(&response).read_u8()?;
        PlugType::from_repr(value).ok_or_else(|| {
            ProtocolError::MalformedResponse(format!("plug type {value:#04x} out of range"))
        })
    }

    fn get_plug_name(&mut self, addr: &PlugAddress) -> Result<String, ProtocolError> {
        let response = self.status_request(
            addr.target(),
            Opcode::PlugInfo,
            &plug_info_operands(addr, INFO_PLUG_NAME, [0xff, 0xff]),
        )?;
        read_text(&mut data_cursor(&response))
    }

    fn get_channel_count(&mut self, addr: &PlugAddress) -> Result<u8, ProtocolError> {
        let response = self.status_request(
            addr.target(),
            Opcode::PlugInfo,
            &plug_info_operands(addr, INFO_CHANNEL_COUNT, [0xff, 0xff]),
        )?;
        Ok(data_cursor(&response).read_u8()?)
    }

    /// Name of the channel at the 1-based `position`.
    fn get_channel_name(
        &mut self,
        addr: &PlugAddress,
        position: u8,
    ) -> Result<String, ProtocolError> {
        let response = self.status_request(
            addr.target(),
            Opcode::PlugInfo,
            &plug_info_operands(addr, INFO_CHANNEL_NAME, [position, 0xff]),
        )?;
        let mut cursor = data_cursor(&response);
        let _position = cursor.read_u8()?;
        read_text(&mut cursor)
    }

    /// Channel layout of every cluster of an isochronous unit plug.
    /// Other plug kinds do not implement the query.
    fn get_cluster_layout(
        &mut self,
        addr: &PlugAddress,
    ) -> Result<Vec<Vec<ClusterEntry>>, ProtocolError> {
        if !addr.is_isoc_unit() {
            return Err(ProtocolError::UnsupportedOperation);
        }
        let response = self.status_request(
            addr.target(),
            Opcode::PlugInfo,
            &plug_info_operands(addr, INFO_CLUSTER_LAYOUT, [0xff, 0xff]),
        )?;
        let mut cursor = data_cursor(&response);
        let cluster_count = cursor.read_u8()? as usize;
        let mut clusters = Vec::with_capacity(cluster_count);
        for _ in 0..cluster_count {
            let entry_count = cursor.read_u8()? as usize;
            let mut entries = Vec::with_capacity(entry_count);
            for _ in 0..entry_count {
                let channel = cursor.read_u8()?;
                let raw_position = cursor.read_u8()?;
                let position = ChannelPosition::from_repr(raw_position).ok_or_else(|| {
                    ProtocolError::MalformedResponse(format!(
                        "channel position {raw_position:#04x} out of range"
                    ))
                })?;
                entries.push(ClusterEntry { channel, position });
            }
            clusters.push(entries);
        }
        Ok(clusters)
    }

    /// Name and port type of the cluster at the 1-based `cluster_id`.
    /// Like the layout query, only isochronous unit plugs support this.
    fn get_cluster_info(
        &mut self,
        addr: &PlugAddress,
        cluster_id: u8,
    ) -> Result<ClusterInfo, ProtocolError> {
        if !addr.is_isoc_unit() {
            return Err(ProtocolError::UnsupportedOperation);
        }
        let response = self.status_request(
            addr.target(),
            Opcode::PlugInfo,
            &plug_info_operands(addr, INFO_CLUSTER_INFO, [cluster_id, 0xff]),
        )?;
        let mut cursor = data_cursor(&response);
        let _cluster_id = cursor.read_u8()?;
        let raw_port = cursor.read_u8()?;
        let port_type = PortType::from_repr(raw_port).ok_or_else(|| {
            ProtocolError::MalformedResponse(format!("port type {raw_port:#04x} out of range"))
        })?;
        let name = read_text(&mut cursor)?;
        Ok(ClusterInfo { name, port_type })
    }

    /// The single upstream plug feeding this one. An absent connection is
    /// reported with the sentinel address and decodes to `None`.
    fn get_plug_input(
        &mut self,
        addr: &PlugAddress,
    ) -> Result<Option<PlugAddress>, ProtocolError> {
        let response = self.status_request(
            addr.target(),
            Opcode::PlugInfo,
            &plug_info_operands(addr, INFO_INPUT, [0xff, 0xff]),
        )?;
        let data = response.get(RESPONSE_DATA as usize..).ok_or_else(|| {
            ProtocolError::MalformedResponse("input response has no data".to_string())
        })?;
        PlugAddress::decode(data)
    }

    /// The downstream plugs fed by this one. A sentinel count means the
    /// device has nothing to report.
    fn get_plug_outputs(&mut self, addr: &PlugAddress) -> Result<Vec<PlugAddress>, ProtocolError> {
        let response = self.status_request(
            addr.target(),
            Opcode::PlugInfo,
            &plug_info_operands(addr, INFO_OUTPUTS, [0xff, 0xff]),
        )?;
        let mut cursor = data_cursor(&response);
        let count = cursor.read_u8()?;
        if count == NO_ADDRESS {
            return Ok(Vec::new());
        }
        let mut outputs = Vec::with_capacity(count as usize);
        for i in 0..count as usize {
            let start = RESPONSE_DATA as usize + 1 + i * ADDRESS_LEN;
            let entry = response.get(start..start + ADDRESS_LEN).ok_or_else(|| {
                ProtocolError::MalformedResponse("truncated output plug list".to_string())
            })?;
            if let Some(output) = PlugAddress::decode(entry)? {
                outputs.push(output);
            }
        }
        Ok(outputs)
    }

    /// Unit plug counts per plug class via the plain plug info subfunctions.
    /// Devices without async plugs reject the async variant, which counts
    /// as zero plugs.
    fn get_unit_plug_counts(
        &mut self,
    ) -> Result<EnumMap<UnitPlugType, PlugCounts>, ProtocolError> {
        let mut counts: EnumMap<UnitPlugType, PlugCounts> = EnumMap::default();

        let response =
            self.status_request(UNIT_TARGET, Opcode::PlugInfo, &[0x00, 0xff, 0xff, 0xff, 0xff])?;
        let mut cursor = Cursor::new(response.as_slice());
        cursor.set_position(1);
        counts[UnitPlugType::Isoc].inputs = cursor.read_u8()?;
        counts[UnitPlugType::Isoc].outputs = cursor.read_u8()?;
        counts[UnitPlugType::External].inputs = cursor.read_u8()?;
        counts[UnitPlugType::External].outputs = cursor.read_u8()?;

        match self.status_request(UNIT_TARGET, Opcode::PlugInfo, &[0x01, 0xff, 0xff, 0xff, 0xff])
        {
            Ok(response) => {
                let mut cursor = Cursor::new(response.as_slice());
                cursor.set_position(1);
                counts[UnitPlugType::Async].inputs = cursor.read_u8()?;
                counts[UnitPlugType::Async].outputs = cursor.read_u8()?;
            }
            Err(ProtocolError::Rejected) => {
                warn!("Device rejected async plug count query, assuming none");
            }
            Err(err) => return Err(err),
        }

        Ok(counts)
    }

    /// Input and output plug counts of one subunit.
    fn get_subunit_plug_counts(&mut self, target: u8) -> Result<PlugCounts, ProtocolError> {
        let response =
            self.status_request(target, Opcode::PlugInfo, &[0x00, 0xff, 0xff, 0xff, 0xff])?;
        let mut cursor = Cursor::new(response.as_slice());
        cursor.set_position(1);
        Ok(PlugCounts {
            inputs: cursor.read_u8()?,
            outputs: cursor.read_u8()?,
        })
    }
}

impl<T: FcpTransaction + ?Sized> PlugInfoCommands for T {}
