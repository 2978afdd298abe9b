use crate::error::DiscoveryError;
use crate::topology::DeviceTopology;
use bebob_protocol::address::PlugAddress;
use bebob_protocol::ccm::CcmCommands;
use bebob_protocol::transaction::FcpTransaction;
use bebob_types::{PlugDirection, PlugType, SubunitType, UnitPlugType};
use log::{debug, info};

/// Where a synchronization source candidate comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CandidateKind {
    /// The device's own clock, a music subunit output.
    InternalClock,
    /// An external input such as word clock or a digital interface.
    External,
    /// Recovery from the SYT field of an incoming isochronous stream.
    SytMatch,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteCandidate {
    pub name: String,
    pub addr: PlugAddress,
    pub kind: CandidateKind,
}

/// The synchronization routing picture for one device: the plug that
/// consumes the clock and every source that could feed it, split into
/// those the device agreed to and the full candidate list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignalRoute {
    pub destination: PlugAddress,
    /// The source currently routed to the destination, when one is selected
    /// and the device answers the query.
    pub active: Option<PlugAddress>,
    pub candidates: Vec<RouteCandidate>,
    pub feasible: Vec<RouteCandidate>,
}

/// Probes which clock sources a discovered device will actually accept.
pub struct SignalRouteResolver<'a, T: FcpTransaction> {
    device: &'a mut T,
}

impl<'a, T: FcpTransaction> SignalRouteResolver<'a, T> {
    pub fn new(device: &'a mut T) -> Self {
        Self { device }
    }

    pub fn resolve(&mut self, topology: &DeviceTopology) -> Result<SignalRoute, DiscoveryError> {
        let destination = sync_destination(topology)?;
        let candidates = sync_candidates(topology);
        let active = self.device.get_signal_source(&destination)?;
        info!(
            "Probing {} sync source candidates for {:?} (active: {:?})",
            candidates.len(),
            destination,
            active
        );

        let mut feasible = Vec::new();
        for candidate in &candidates {
            let accepted = self.device.ask_signal_source(&candidate.addr, &destination)?;
            debug!(
                "Sync source \"{}\" ({:?}): {}",
                candidate.name,
                candidate.kind,
                if accepted { "accepted" } else { "refused" }
            );
            if accepted {
                feasible.push(candidate.clone());
            }
        }
        Ok(SignalRoute {
            destination,
            active,
            candidates,
            feasible,
        })
    }
}

// The clock consumer is the music subunit's sync-typed input plug.
fn sync_destination(topology: &DeviceTopology) -> Result<PlugAddress, DiscoveryError> {
    let music = topology
        .subunit(SubunitType::Music)
        .ok_or(DiscoveryError::NoSyncDestination)?;
    music
        .plugs
        .inputs
        .iter()
        .position(|plug| plug.plug_type == PlugType::Sync)
        .map(|index| {
            PlugAddress::subunit(PlugDirection::Input, SubunitType::Music, music.id, index as u8)
        })
        .transpose()?
        .ok_or(DiscoveryError::NoSyncDestination)
}

fn sync_candidates(topology: &DeviceTopology) -> Vec<RouteCandidate> {
    let mut candidates = Vec::new();
    if let Some(music) = topology.subunit(SubunitType::Music) {
        for plug in &music.plugs.outputs {
            if plug.plug_type == PlugType::Sync {
                candidates.push(RouteCandidate {
                    name: plug.name.clone(),
                    addr: plug.addr,
                    kind: CandidateKind::InternalClock,
                });
            }
        }
    }
    for plug in &topology.unit_plugs[UnitPlugType::External].inputs {
        if matches!(
            plug.plug_type,
            PlugType::Sync | PlugType::Digital | PlugType::Clock
        ) {
            candidates.push(RouteCandidate {
                name: plug.name.clone(),
                addr: plug.addr,
                kind: CandidateKind::External,
            });
        }
    }
    for plug in &topology.unit_plugs[UnitPlugType::Isoc].inputs {
        if plug.plug_type == PlugType::Sync {
            candidates.push(RouteCandidate {
                name: plug.name.clone(),
                addr: plug.addr,
                kind: CandidateKind::SytMatch,
            });
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedFcp;
    use crate::topology::{Plug, PlugConnection, PlugSet, Subunit};
    use bebob_protocol::error::ProtocolError;
    use bebob_types::{CompanyId, UnitInfo};
    use enum_map::EnumMap;

    fn plug(addr: PlugAddress, plug_type: PlugType, name: &str) -> Plug {
        Plug {
            addr,
            plug_type,
            name: name.to_string(),
            channels: vec![],
            clusters: vec![],
            connection: PlugConnection::Unknown,
            formats: vec![],
        }
    }

    fn topology_with_sources() -> DeviceTopology {
        let mut unit_plugs: EnumMap<UnitPlugType, PlugSet> = EnumMap::default();
        unit_plugs[UnitPlugType::External].inputs.push(plug(
            PlugAddress::unit(PlugDirection::Input, UnitPlugType::External, 0),
            PlugType::Digital,
            "S/PDIF",
        ));
        unit_plugs[UnitPlugType::External].inputs.push(plug(
            PlugAddress::unit(PlugDirection::Input, UnitPlugType::External, 1),
            PlugType::Analog,
            "Mic",
        ));
        unit_plugs[UnitPlugType::Isoc].inputs.push(plug(
            PlugAddress::unit(PlugDirection::Input, UnitPlugType::Isoc, 0),
            PlugType::Sync,
            "SYT",
        ));
        let music = Subunit {
            subunit_type: SubunitType::Music,
            id: 0,
            plugs: PlugSet {
                inputs: vec![plug(
                    PlugAddress::subunit(PlugDirection::Input, SubunitType::Music, 0, 0).unwrap(),
                    PlugType::Sync,
                    "SyncIn",
                )],
                outputs: vec![plug(
                    PlugAddress::subunit(PlugDirection::Output, SubunitType::Music, 0, 0).unwrap(),
                    PlugType::Sync,
                    "IntClk",
                )],
            },
            function_blocks: vec![],
        };
        DeviceTopology {
            unit_info: UnitInfo {
                unit_type: SubunitType::Music,
                unit_id: 0,
                company_id: CompanyId([0x00, 0x07, 0xf5]),
            },
            unit_plugs,
            subunits: vec![music],
        }
    }

    #[test]
    fn feasible_sources_preserve_candidate_order() {
        let topology = topology_with_sources();
        // Word clock currently selected; then the internal clock is
        // accepted, S/PDIF refused, SYT accepted.
        let mut fcp = ScriptedFcp::new(vec![
            Ok(vec![0x00, 0xff, 0x80, 0x60, 0x00]),
            Ok(vec![]),
            Err(ProtocolError::Rejected),
            Ok(vec![]),
        ]);
        let route = SignalRouteResolver::new(&mut fcp).resolve(&topology).unwrap();

        assert_eq!(
            route.destination,
            PlugAddress::subunit(PlugDirection::Input, SubunitType::Music, 0, 0).unwrap()
        );
        assert_eq!(
            route.active,
            Some(PlugAddress::unit(
                PlugDirection::Input,
                UnitPlugType::External,
                0
            ))
        );
        let kinds: Vec<_> = route.candidates.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                CandidateKind::InternalClock,
                CandidateKind::External,
                CandidateKind::SytMatch
            ]
        );
        let feasible: Vec<_> = route.feasible.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(feasible, vec!["IntClk", "SYT"]);
    }

    #[test]
    fn analog_inputs_are_never_candidates() {
        let topology = topology_with_sources();
        let mut fcp = ScriptedFcp::new(vec![
            Err(ProtocolError::Rejected),
            Ok(vec![]),
            Ok(vec![]),
            Ok(vec![]),
        ]);
        let route = SignalRouteResolver::new(&mut fcp).resolve(&topology).unwrap();
        assert_eq!(route.active, None);
        assert!(route.candidates.iter().all(|c| c.name != "Mic"));
    }

    #[test]
    fn missing_sync_plug_is_reported() {
        let mut topology = topology_with_sources();
        topology.subunits[0].plugs.inputs[0].plug_type = PlugType::Analog;
        let mut fcp = ScriptedFcp::new(vec![]);
        assert!(matches!(
            SignalRouteResolver::new(&mut fcp).resolve(&topology),
            Err(DiscoveryError::NoSyncDestination)
        ));
    }
}
