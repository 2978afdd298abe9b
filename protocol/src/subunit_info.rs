use crate::error::ProtocolError;
use crate::transaction::{FcpTransaction, Opcode, UNIT_TARGET};
use bebob_types::{FunctionBlockPurpose, SubunitType};
use log::debug;

const ABSENT: u8 = 0xff;

// A function block page carries at most five descriptor entries.
const ENTRIES_PER_PAGE: usize = 5;
const ENTRY_LEN: usize = 5;

// Entries start after the echoed page number and function block type filter.
const FIRST_ENTRY: usize = 2;

/// One subunit reported by the SUBUNIT INFO command.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SubunitEntry {
    pub subunit_type: SubunitType,
    pub id: u8,
}

/// One entry of a subunit's function block descriptor table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FunctionBlockDescriptor {
    pub fb_type: u8,
    pub fb_id: u8,
    pub purpose: FunctionBlockPurpose,
    pub inputs: u8,
    pub outputs: u8,
}

fn parse_entry(slot: &[u8]) -> Result<FunctionBlockDescriptor, ProtocolError> {
    let purpose = FunctionBlockPurpose::from_repr(slot[2]).ok_or_else(|| {
        ProtocolError::MalformedResponse(format!(
            "function block purpose {:#04x} out of range",
            slot[2]
        ))
    })?;
    Ok(FunctionBlockDescriptor {
        fb_type: slot[0],
        fb_id: slot[1],
        purpose,
        inputs: slot[3],
        outputs: slot[4],
    })
}

pub trait SubunitInfoCommands: FcpTransaction {
    /// The subunits the unit exposes, read from the three fixed slots of a
    /// single SUBUNIT INFO status response. A sentinel slot is empty.
    fn discover_subunits(&mut self) -> Result<Vec<SubunitEntry>, ProtocolError> {
        let response = self.status_request(
            UNIT_TARGET,
            Opcode::SubunitInfo,
            &[0x00, 0xff, 0xff, 0xff, 0xff],
        )?;
        let slots = response.get(1..4).ok_or_else(|| {
            ProtocolError::MalformedResponse("subunit info response too short".to_string())
        })?;
        let mut subunits = Vec::new();
        for slot in slots {
            if *slot == ABSENT {
                continue;
            }
            let subunit_type = SubunitType::from_repr(slot >> 3).ok_or_else(|| {
                ProtocolError::MalformedResponse(format!(
                    "subunit type {:#04x} out of range",
                    slot >> 3
                ))
            })?;
            subunits.push(SubunitEntry {
                subunit_type,
                id: slot & 0x07,
            });
        }
        debug!("Discovered subunits: {subunits:?}");
        Ok(subunits)
    }

    /// Pages through the function block descriptor table of one subunit.
    ///
    /// Pagination ends normally on a rejected page request or on a page
    /// whose first slot is the sentinel; both mean the table is exhausted,
    /// not that anything went wrong. A sentinel in any later slot is a hole
    /// in the page and is skipped.
    fn function_block_descriptors(
        &mut self,
        target: u8,
    ) -> Result<Vec<FunctionBlockDescriptor>, ProtocolError> {
        let mut descriptors = Vec::new();
        for page in 0..=0xff_u8 {
            let mut operands = [0xff_u8; 26];
            operands[0] = page;
            let response = match self.status_request(target, Opcode::SubunitInfo, &operands) {
                Ok(response) => response,
                Err(ProtocolError::Rejected) => break,
                Err(err) => return Err(err),
            };
            let mut exhausted = false;
            for i in 0..ENTRIES_PER_PAGE {
                let start = FIRST_ENTRY + i * ENTRY_LEN;
                let slot = response.get(start..start + ENTRY_LEN).ok_or_else(|| {
                    ProtocolError::MalformedResponse(
                        "function block page too short".to_string(),
                    )
                })?;
                if slot[0] == ABSENT {
                    if i == 0 {
                        exhausted = true;
                        break;
                    }
                    continue;
                }
                descriptors.push(parse_entry(slot)?);
            }
            if exhausted {
                break;
            }
        }
        Ok(descriptors)
    }
}

impl<T: FcpTransaction + ?Sized> SubunitInfoCommands for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedFcp;

    fn page_response(entries: &[[u8; 5]]) -> Result<Vec<u8>, ProtocolError> {
        let mut operands = vec![0xff_u8; FIRST_ENTRY + ENTRIES_PER_PAGE * ENTRY_LEN];
        for (i, entry) in entries.iter().enumerate() {
            let start = FIRST_ENTRY + i * ENTRY_LEN;
            operands[start..start + ENTRY_LEN].copy_from_slice(entry);
        }
        Ok(operands)
    }

    #[test]
    fn subunit_slots_decode_with_sentinels_skipped() {
        let mut fcp = ScriptedFcp::new(vec![Ok(vec![0x00, 0x60, 0xff, 0x08])]);
        let subunits = fcp.discover_subunits().unwrap();
        assert_eq!(
            subunits,
            vec![
                SubunitEntry {
                    subunit_type: SubunitType::Music,
                    id: 0
                },
                SubunitEntry {
                    subunit_type: SubunitType::Audio,
                    id: 0
                },
            ]
        );
        assert_eq!(fcp.requests[0].1, Opcode::SubunitInfo);
        assert_eq!(fcp.requests[0].0, UNIT_TARGET);
    }

    #[test]
    fn unknown_subunit_type_is_malformed() {
        let mut fcp = ScriptedFcp::new(vec![Ok(vec![0x00, 0xf0, 0xff, 0xff])]);
        assert!(matches!(
            fcp.discover_subunits(),
            Err(ProtocolError::MalformedResponse(_))
        ));
    }

    #[test]
    fn pagination_stops_at_a_sentinel_first_slot() {
        let full_page = page_response(&[
            [0x80, 0x01, 0x00, 0x02, 0x01],
            [0x80, 0x02, 0x00, 0x02, 0x01],
            [0x80, 0x03, 0x01, 0x01, 0x01],
            [0x80, 0x04, 0xff, 0x01, 0x01],
            [0x80, 0x05, 0x00, 0x01, 0x01],
        ]);
        // Second page starts with a sentinel, so further pages are never
        // requested even though the script would answer them.
        let mut fcp = ScriptedFcp::new(vec![
            full_page,
            page_response(&[]),
            page_response(&[[0x80, 0x06, 0x00, 0x01, 0x01]]),
        ]);
        let descriptors = fcp.function_block_descriptors(0x60).unwrap();
        assert_eq!(descriptors.len(), 5);
        assert_eq!(descriptors[2].purpose, FunctionBlockPurpose::OutputVolume);
        assert_eq!(descriptors[3].purpose, FunctionBlockPurpose::NothingSpecial);
        assert_eq!(fcp.requests.len(), 2);
        assert_eq!(fcp.requests[1].2[0], 0x01);
    }

    #[test]
    fn mid_page_sentinels_are_holes_not_terminators() {
        let sparse_page = page_response(&[
            [0x80, 0x01, 0x00, 0x02, 0x01],
            [0xff, 0xff, 0xff, 0xff, 0xff],
            [0x80, 0x03, 0x01, 0x01, 0x01],
            [0xff, 0xff, 0xff, 0xff, 0xff],
            [0x80, 0x05, 0x00, 0x01, 0x01],
        ]);
        // The sparse page does not end the table; the next page does.
        let mut fcp = ScriptedFcp::new(vec![sparse_page, page_response(&[])]);
        let descriptors = fcp.function_block_descriptors(0x60).unwrap();
        assert_eq!(descriptors.len(), 3);
        assert_eq!(descriptors[1].fb_id, 0x03);
        assert_eq!(fcp.requests.len(), 2);
    }

    #[test]
    fn pagination_treats_rejection_as_end_of_table() {
        let full_page = page_response(&[
            [0x80, 0x01, 0x00, 0x02, 0x01],
            [0x80, 0x02, 0x00, 0x02, 0x01],
            [0x80, 0x03, 0x00, 0x01, 0x01],
            [0x80, 0x04, 0x00, 0x01, 0x01],
            [0x80, 0x05, 0x00, 0x01, 0x01],
        ]);
        let mut fcp = ScriptedFcp::new(vec![full_page, Err(ProtocolError::Rejected)]);
        let descriptors = fcp.function_block_descriptors(0x60).unwrap();
        assert_eq!(descriptors.len(), 5);
        assert_eq!(fcp.requests.len(), 2);
    }

    #[test]
    fn immediate_rejection_yields_no_descriptors() {
        let mut fcp = ScriptedFcp::new(vec![Err(ProtocolError::Rejected)]);
        assert_eq!(fcp.function_block_descriptors(0x60).unwrap(), vec![]);
    }
}
