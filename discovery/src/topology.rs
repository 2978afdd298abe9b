use crate::error::DiscoveryError;
use bebob_protocol::address::{subunit_target, PlugAddress};
use bebob_protocol::error::ProtocolError;
use bebob_protocol::general::GeneralCommands;
use bebob_protocol::plug_info::{ClusterEntry, PlugInfoCommands};
use bebob_protocol::stream_format::{StreamFormat, StreamFormatCommands};
use bebob_protocol::subunit_info::{FunctionBlockDescriptor, SubunitInfoCommands};
use bebob_protocol::transaction::FcpTransaction;
use bebob_types::{
    FunctionBlockPurpose, PlugDirection, PlugType, PortType, SubunitType, UnitInfo, UnitPlugType,
};
use enum_map::EnumMap;
use log::{debug, info};
use strum::IntoEnumIterator;

/// A named group of channels inside a plug.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cluster {
    pub name: String,
    pub port_type: PortType,
    pub entries: Vec<ClusterEntry>,
}

/// How a plug is wired to the rest of the device, as far as it would say.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlugConnection {
    /// The single upstream plug feeding this one; `None` when unconnected.
    Input(Option<PlugAddress>),
    /// The downstream plugs fed from this one.
    Outputs(Vec<PlugAddress>),
    /// The device rejected the connection query for this plug.
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plug {
    pub addr: PlugAddress,
    pub plug_type: PlugType,
    pub name: String,
    pub channels: Vec<String>,
    pub clusters: Vec<Cluster>,
    pub connection: PlugConnection,
    /// Supported stream formats in device preference order.
    /// Only populated on non-async unit plugs.
    pub formats: Vec<StreamFormat>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlugSet {
    pub inputs: Vec<Plug>,
    pub outputs: Vec<Plug>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionBlock {
    pub fb_type: u8,
    pub fb_id: u8,
    pub purpose: FunctionBlockPurpose,
    pub plugs: PlugSet,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subunit {
    pub subunit_type: SubunitType,
    pub id: u8,
    pub plugs: PlugSet,
    pub function_blocks: Vec<FunctionBlock>,
}

/// Everything one discovery run learned about a device. Immutable once
/// built; a fresh run is the only refresh path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceTopology {
    pub unit_info: UnitInfo,
    pub unit_plugs: EnumMap<UnitPlugType, PlugSet>,
    pub subunits: Vec<Subunit>,
}

impl DeviceTopology {
    pub fn subunit(&self, subunit_type: SubunitType) -> Option<&Subunit> {
        self.subunits
            .iter()
            .find(|subunit| subunit.subunit_type == subunit_type)
    }
}

/// Which connection query a subunit family answers for a given plug
/// direction. Music subunits are known to answer with inverted direction,
/// so the mapping is explicit per family instead of trying both queries
/// and discarding whichever fails.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConnectionConvention {
    Standard,
    Inverted,
}

impl ConnectionConvention {
    pub fn default_for(subunit_type: SubunitType) -> Self {
        match subunit_type {
            SubunitType::Music => ConnectionConvention::Inverted,
            _ => ConnectionConvention::Standard,
        }
    }

    // An output plug is fed from inside the device, so under the standard
    // convention it answers the input-source query, and an input plug the
    // output-destinations query. Inverted families swap the two.
    fn queries_input(&self, direction: PlugDirection) -> bool {
        match self {
            ConnectionConvention::Standard => direction == PlugDirection::Output,
            ConnectionConvention::Inverted => direction == PlugDirection::Input,
        }
    }
}

/// Drives a full discovery run against one device and assembles the
/// immutable topology snapshot.
pub struct TopologyBuilder<'a, T: FcpTransaction> {
    device: &'a mut T,
    conventions: EnumMap<SubunitType, ConnectionConvention>,
}

impl<'a, T: FcpTransaction> TopologyBuilder<'a, T> {
    pub fn new(device: &'a mut T) -> Self {
        Self {
            device,
            conventions: EnumMap::from_fn(ConnectionConvention::default_for),
        }
    }

    /// Overrides the connection query convention for one subunit family.
    pub fn with_convention(
        mut self,
        subunit_type: SubunitType,
        convention: ConnectionConvention,
    ) -> Self {
        self.conventions[subunit_type] = convention;
        self
    }

    pub fn build(mut self) -> Result<DeviceTopology, DiscoveryError> {
        let unit_info = self.device.get_unit_info()?;
        info!(
            "Discovering topology of {} unit (company {})",
            unit_info.unit_type, unit_info.company_id
        );

        let mut unit_plugs = self.build_unit_plugs()?;
        let subunits = self.build_subunits()?;
        self.attach_stream_formats(&mut unit_plugs)?;

        info!(
            "Topology discovery complete: {} subunits",
            subunits.len()
        );
        Ok(DeviceTopology {
            unit_info,
            unit_plugs,
            subunits,
        })
    }

    fn build_unit_plugs(
        &mut self,
    ) -> Result<EnumMap<UnitPlugType, PlugSet>, DiscoveryError> {
        let counts = self.device.get_unit_plug_counts()?;
        let mut unit_plugs: EnumMap<UnitPlugType, PlugSet> = EnumMap::default();
        for plug_type in UnitPlugType::iter() {
            debug!(
                "Unit has {} input and {} output {} plugs",
                counts[plug_type].inputs, counts[plug_type].outputs, plug_type
            );
            for plug in 0..counts[plug_type].inputs {
                let addr = PlugAddress::unit(PlugDirection::Input, plug_type, plug);
                unit_plugs[plug_type].inputs.push(self.build_unit_plug(&addr)?);
            }
            for plug in 0..counts[plug_type].outputs {
                let addr = PlugAddress::unit(PlugDirection::Output, plug_type, plug);
                unit_plugs[plug_type].outputs.push(self.build_unit_plug(&addr)?);
            }
        }
        Ok(unit_plugs)
    }

    fn build_unit_plug(&mut self, addr: &PlugAddress) -> Result<Plug, DiscoveryError> {
        let mut plug = self.read_plug_attributes(addr)?;
        // Unit plugs answer the direction-appropriate query unconditionally;
        // a rejection here is a real fault.
        plug.connection = match addr.direction {
            PlugDirection::Output => PlugConnection::Input(self.device.get_plug_input(addr)?),
            PlugDirection::Input => PlugConnection::Outputs(self.device.get_plug_outputs(addr)?),
        };
        Ok(plug)
    }

    fn build_subunits(&mut self) -> Result<Vec<Subunit>, DiscoveryError> {
        let mut subunits = Vec::new();
        for entry in self.device.discover_subunits()? {
            if entry.id != 0 {
                return Err(DiscoveryError::UnsupportedSubunitId {
                    subunit_type: entry.subunit_type,
                    id: entry.id,
                });
            }
            let convention = self.conventions[entry.subunit_type];
            let target = subunit_target(entry.subunit_type, entry.id);
            let counts = self.device.get_subunit_plug_counts(target)?;

            let mut plugs = PlugSet::default();
            for plug in 0..counts.inputs {
                let addr = PlugAddress::subunit(
                    PlugDirection::Input,
                    entry.subunit_type,
                    entry.id,
                    plug,
                )?;
                plugs.inputs.push(self.build_subunit_plug(&addr, convention)?);
            }
            for plug in 0..counts.outputs {
                let addr = PlugAddress::subunit(
                    PlugDirection::Output,
                    entry.subunit_type,
                    entry.id,
                    plug,
                )?;
                plugs.outputs.push(self.build_subunit_plug(&addr, convention)?);
            }

            let function_blocks = self.build_function_blocks(&entry, convention, target)?;
            subunits.push(Subunit {
                subunit_type: entry.subunit_type,
                id: entry.id,
                plugs,
                function_blocks,
            });
        }
        Ok(subunits)
    }

    fn build_function_blocks(
        &mut self,
        entry: &bebob_protocol::subunit_info::SubunitEntry,
        convention: ConnectionConvention,
        target: u8,
    ) -> Result<Vec<FunctionBlock>, DiscoveryError> {
        let descriptors = self.device.function_block_descriptors(target)?;
        debug!(
            "Subunit {} has {} function blocks",
            entry.subunit_type,
            descriptors.len()
        );
        let mut function_blocks = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            function_blocks.push(self.build_function_block(entry, convention, &descriptor)?);
        }
        Ok(function_blocks)
    }

    fn build_function_block(
        &mut self,
        entry: &bebob_protocol::subunit_info::SubunitEntry,
        convention: ConnectionConvention,
        descriptor: &FunctionBlockDescriptor,
    ) -> Result<FunctionBlock, DiscoveryError> {
        let mut plugs = PlugSet::default();
        for plug in 0..descriptor.inputs {
            let addr = PlugAddress::function_block(
                PlugDirection::Input,
                entry.subunit_type,
                entry.id,
                descriptor.fb_type,
                descriptor.fb_id,
                plug,
            )?;
            plugs.inputs.push(self.build_subunit_plug(&addr, convention)?);
        }
        for plug in 0..descriptor.outputs {
            let addr = PlugAddress::function_block(
                PlugDirection::Output,
                entry.subunit_type,
                entry.id,
                descriptor.fb_type,
                descriptor.fb_id,
                plug,
            )?;
            plugs.outputs.push(self.build_subunit_plug(&addr, convention)?);
        }
        Ok(FunctionBlock {
            fb_type: descriptor.fb_type,
            fb_id: descriptor.fb_id,
            purpose: descriptor.purpose,
            plugs,
        })
    }

    fn build_subunit_plug(
        &mut self,
        addr: &PlugAddress,
        convention: ConnectionConvention,
    ) -> Result<Plug, DiscoveryError> {
        let mut plug = self.read_plug_attributes(addr)?;
        // Subunit and function block plugs may reject the connection query
        // outright; that only means the device has nothing to report.
        plug.connection = if convention.queries_input(addr.direction) {
            match self.device.get_plug_input(addr) {
                Ok(input) => PlugConnection::Input(input),
                Err(ProtocolError::Rejected) => PlugConnection::Unknown,
                Err(err) => return Err(err.into()),
            }
        } else {
            match self.device.get_plug_outputs(addr) {
                Ok(outputs) => PlugConnection::Outputs(outputs),
                Err(ProtocolError::Rejected) => PlugConnection::Unknown,
                Err(err) => return Err(err.into()),
            }
        };
        Ok(plug)
    }

    fn read_plug_attributes(&mut self, addr: &PlugAddress) -> Result<Plug, DiscoveryError> {
        let plug_type = self.device.get_plug_type(addr)?;
        let name = self.device.get_plug_name(addr)?;
        let channel_count = self.device.get_channel_count(addr)?;
        let mut channels = Vec::with_capacity(channel_count as usize);
        for position in 1..=channel_count {
            channels.push(self.device.get_channel_name(addr, position)?);
        }
        let mut clusters = Vec::new();
        if plug_type == PlugType::IsoStream && addr.is_isoc_unit() {
            let layout = self.device.get_cluster_layout(addr)?;
            for (index, entries) in layout.into_iter().enumerate() {
                let cluster = self.device.get_cluster_info(addr, (index + 1) as u8)?;
                clusters.push(Cluster {
                    name: cluster.name,
                    port_type: cluster.port_type,
                    entries,
                });
            }
        }
        debug!("Plug {addr:?}: {plug_type} \"{name}\", {channel_count} channels");
        Ok(Plug {
            addr: *addr,
            plug_type,
            name,
            channels,
            clusters,
            connection: PlugConnection::Unknown,
            formats: Vec::new(),
        })
    }

    fn attach_stream_formats(
        &mut self,
        unit_plugs: &mut EnumMap<UnitPlugType, PlugSet>,
    ) -> Result<(), DiscoveryError> {
        for plug_type in UnitPlugType::iter() {
            // Async plugs carry no audio streams.
            if plug_type == UnitPlugType::Async {
                continue;
            }
            let set = &mut unit_plugs[plug_type];
            for plug in set.inputs.iter_mut().chain(set.outputs.iter_mut()) {
                plug.formats = self.device.get_stream_format_list(&plug.addr)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedFcp;
    use bebob_types::{ChannelPosition, SamplingRate};

    fn plug_reply(
        addr: &PlugAddress,
        info_type: u8,
        data: &[u8],
    ) -> Result<Vec<u8>, ProtocolError> {
        let raw = addr.encode();
        let mut operands = vec![0xc0, raw[0], raw[1], raw[2], raw[3], raw[4], info_type];
        operands.extend_from_slice(data);
        Ok(operands)
    }

    fn name_reply(addr: &PlugAddress, name: &str) -> Result<Vec<u8>, ProtocolError> {
        let mut data = vec![name.len() as u8];
        data.extend_from_slice(name.as_bytes());
        plug_reply(addr, 0x01, &data)
    }

    fn format_reply(addr: &PlugAddress, index: u8, format: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let raw = addr.encode();
        let mut operands = vec![0xc1, raw[0], raw[1], raw[2], raw[3], raw[4], 0xff, index];
        operands.extend_from_slice(format);
        Ok(operands)
    }

    #[test]
    fn discovery_assembles_the_full_topology() {
        let isoc_in = PlugAddress::unit(PlugDirection::Input, UnitPlugType::Isoc, 0);
        let ext_in = PlugAddress::unit(PlugDirection::Input, UnitPlugType::External, 0);
        let music_in =
            PlugAddress::subunit(PlugDirection::Input, SubunitType::Music, 0, 0).unwrap();
        let music_out =
            PlugAddress::subunit(PlugDirection::Output, SubunitType::Music, 0, 0).unwrap();

        let mut sink_addr = vec![0x01];
        sink_addr.extend_from_slice(&music_in.encode());

        let mut fcp = ScriptedFcp::new(vec![
            // Unit info, then plug counts (no async plugs).
            Ok(vec![0x07, 0x60, 0x00, 0x07, 0xf5]),
            Ok(vec![0x00, 0x01, 0x00, 0x01, 0x00]),
            Err(ProtocolError::Rejected),
            // Isochronous input plug 0.
            plug_reply(&isoc_in, 0x00, &[0x00]),
            name_reply(&isoc_in, "Input"),
            plug_reply(&isoc_in, 0x02, &[0x02]),
            plug_reply(&isoc_in, 0x04, &[0x01, 0x01, b'L']),
            plug_reply(&isoc_in, 0x04, &[0x02, 0x01, b'R']),
            plug_reply(&isoc_in, 0x03, &[0x01, 0x02, 0x01, 0x01, 0x02, 0x02]),
            plug_reply(&isoc_in, 0x07, &[0x01, 0x0b, 0x04, b'M', b'a', b'i', b'n']),
            plug_reply(&isoc_in, 0x06, &sink_addr),
            // External input plug 0.
            plug_reply(&ext_in, 0x00, &[0x03]),
            name_reply(&ext_in, "WordClk"),
            plug_reply(&ext_in, 0x02, &[0x01]),
            plug_reply(&ext_in, 0x04, &[0x01, 0x02, b'W', b'C']),
            plug_reply(&ext_in, 0x06, &[0xff]),
            // One music subunit with one plug per direction.
            Ok(vec![0x00, 0x60, 0xff, 0xff]),
            Ok(vec![0x00, 0x01, 0x01]),
            plug_reply(&music_in, 0x00, &[0x03]),
            name_reply(&music_in, "SyncIn"),
            plug_reply(&music_in, 0x02, &[0x01]),
            plug_reply(&music_in, 0x04, &[0x01, 0x01, b's']),
            plug_reply(&music_in, 0x05, &[0xff; 6]),
            plug_reply(&music_out, 0x00, &[0x03]),
            name_reply(&music_out, "IntClk"),
            plug_reply(&music_out, 0x02, &[0x01]),
            plug_reply(&music_out, 0x04, &[0x01, 0x01, b'c']),
            Err(ProtocolError::Rejected),
            // No function blocks.
            Err(ProtocolError::Rejected),
            // Stream formats: one compound format on the isochronous input,
            // nothing on the external input.
            format_reply(&isoc_in, 0, &[0x90, 0x40, 0x03, 0x00, 0x01, 0x02, 0x06]),
            Err(ProtocolError::Rejected),
            Err(ProtocolError::Rejected),
        ]);

        let topology = TopologyBuilder::new(&mut fcp).build().unwrap();

        assert_eq!(topology.unit_info.unit_type, SubunitType::Music);
        assert_eq!(topology.unit_info.company_id.to_string(), "00:07:f5");

        let isoc = &topology.unit_plugs[UnitPlugType::Isoc].inputs[0];
        assert_eq!(isoc.name, "Input");
        assert_eq!(isoc.plug_type, PlugType::IsoStream);
        assert_eq!(isoc.channels, vec!["L", "R"]);
        assert_eq!(isoc.clusters.len(), 1);
        assert_eq!(isoc.clusters[0].name, "Main");
        assert_eq!(isoc.clusters[0].port_type, PortType::NoType);
        assert_eq!(
            isoc.clusters[0].entries,
            vec![
                ClusterEntry {
                    channel: 1,
                    position: ChannelPosition::LeftFront
                },
                ClusterEntry {
                    channel: 2,
                    position: ChannelPosition::RightFront
                },
            ]
        );
        assert_eq!(isoc.connection, PlugConnection::Outputs(vec![music_in]));
        assert_eq!(isoc.formats.len(), 1);
        assert_eq!(isoc.formats[0].sampling_rate, SamplingRate::R44100);
        assert_eq!(
            isoc.formats[0].formation,
            vec![
                bebob_types::DataType::MultiBitLinearAudioRaw,
                bebob_types::DataType::MultiBitLinearAudioRaw
            ]
        );

        let ext = &topology.unit_plugs[UnitPlugType::External].inputs[0];
        assert_eq!(ext.name, "WordClk");
        assert_eq!(ext.plug_type, PlugType::Sync);
        assert_eq!(ext.formats, vec![]);

        let music = topology.subunit(SubunitType::Music).unwrap();
        assert_eq!(music.plugs.inputs.len(), 1);
        assert_eq!(music.plugs.outputs.len(), 1);
        assert_eq!(music.plugs.inputs[0].connection, PlugConnection::Input(None));
        assert_eq!(music.plugs.outputs[0].connection, PlugConnection::Unknown);
        assert!(music.function_blocks.is_empty());

        // The music subunit follows the inverted convention: its input plug
        // answered the input-source query.
        let music_raw = music_in.encode();
        assert!(fcp.requests.iter().any(|(_, _, operands)| {
            operands.first() == Some(&0xc0)
                && operands.get(1..6) == Some(&music_raw[..5])
                && operands.get(6) == Some(&0x05)
        }));
    }

    #[test]
    fn non_zero_subunit_id_is_fatal() {
        let mut fcp = ScriptedFcp::new(vec![
            Ok(vec![0x07, 0x60, 0x00, 0x07, 0xf5]),
            Ok(vec![0x00, 0x00, 0x00, 0x00, 0x00]),
            Err(ProtocolError::Rejected),
            Ok(vec![0x00, 0x61, 0xff, 0xff]),
        ]);
        assert!(matches!(
            TopologyBuilder::new(&mut fcp).build(),
            Err(DiscoveryError::UnsupportedSubunitId {
                subunit_type: SubunitType::Music,
                id: 1
            })
        ));
    }

    #[test]
    fn malformed_plug_type_aborts_the_run() {
        let isoc_in = PlugAddress::unit(PlugDirection::Input, UnitPlugType::Isoc, 0);
        let mut fcp = ScriptedFcp::new(vec![
            Ok(vec![0x07, 0x60, 0x00, 0x07, 0xf5]),
            Ok(vec![0x00, 0x01, 0x00, 0x00, 0x00]),
            Err(ProtocolError::Rejected),
            plug_reply(&isoc_in, 0x00, &[0x09]),
        ]);
        assert!(matches!(
            TopologyBuilder::new(&mut fcp).build(),
            Err(DiscoveryError::Protocol(ProtocolError::MalformedResponse(_)))
        ));
    }

    #[test]
    fn convention_mapping_is_explicit() {
        let standard = ConnectionConvention::Standard;
        let inverted = ConnectionConvention::Inverted;
        assert!(standard.queries_input(PlugDirection::Output));
        assert!(!standard.queries_input(PlugDirection::Input));
        assert!(inverted.queries_input(PlugDirection::Input));
        assert!(!inverted.queries_input(PlugDirection::Output));
        assert_eq!(
            ConnectionConvention::default_for(SubunitType::Music),
            inverted
        );
        assert_eq!(
            ConnectionConvention::default_for(SubunitType::Audio),
            standard
        );
    }
}
