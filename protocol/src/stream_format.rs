use crate::address::PlugAddress;
use crate::error::ProtocolError;
use crate::transaction::{FcpTransaction, Opcode};
use bebob_types::{DataType, FormatKind, RateControl, SamplingRate};
use log::debug;
use std::thread::sleep;
use std::time::Duration;

// BridgeCo stream format support, list request subfunction.
const LIST_SUBFUNCTION: u8 = 0xc1;

// Format data starts after the echoed subfunction, five address bytes,
// one padding byte and the list index.
const FORMAT_DATA: usize = 8;

// DM1500 class devices tend to time out when the list is polled without a
// pause between requests.
const LIST_PACING: Duration = Duration::from_millis(100);

/// One stream format a unit plug supports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamFormat {
    pub kind: FormatKind,
    pub sampling_rate: SamplingRate,
    pub rate_control: RateControl,
    pub formation: Vec<DataType>,
}

fn rate(code: u8) -> Result<SamplingRate, ProtocolError> {
    SamplingRate::from_repr(code).ok_or_else(|| {
        ProtocolError::MalformedResponse(format!("sampling rate {code:#04x} out of range"))
    })
}

fn control(code: u8) -> Result<RateControl, ProtocolError> {
    RateControl::from_repr(code).ok_or_else(|| {
        ProtocolError::MalformedResponse(format!("rate control {code:#04x} out of range"))
    })
}

// Two format families share the 0x90 root: 0x90/0x00/0x40 is a stereo sync
// stream, 0x90/0x40 a compound format with explicit channel groups.
fn parse_format(data: &[u8]) -> Result<StreamFormat, ProtocolError> {
    match data {
        [0x90, 0x00, 0x40, rate_code, flags, ..] => Ok(StreamFormat {
            kind: FormatKind::Sync,
            sampling_rate: rate(*rate_code)?,
            rate_control: control(flags & 0x01)?,
            formation: vec![DataType::MultiBitLinearAudioRaw],
        }),
        [0x90, 0x40, rate_code, flags, entry_count, groups @ ..] => {
            let mut formation = Vec::new();
            for i in 0..*entry_count as usize {
                let group = groups.get(i * 2..i * 2 + 2).ok_or_else(|| {
                    ProtocolError::MalformedResponse(
                        "compound format channel groups truncated".to_string(),
                    )
                })?;
                for _ in 0..group[0] {
                    formation.push(DataType::from_tag(group[1]));
                }
            }
            Ok(StreamFormat {
                kind: FormatKind::Compound,
                sampling_rate: rate(*rate_code)?,
                rate_control: control(flags & 0x03)?,
                formation,
            })
        }
        _ => Err(ProtocolError::MalformedResponse(format!(
            "unsupported stream format prefix {:02x?}",
            &data[..data.len().min(3)]
        ))),
    }
}

pub trait StreamFormatCommands: FcpTransaction {
    /// Every stream format the plug supports, in the device's preference
    /// order. The device rejects the first index past the end of its list;
    /// that rejection is the designed exhaustion signal. Any other error
    /// propagates.
    fn get_stream_format_list(
        &mut self,
        addr: &PlugAddress,
    ) -> Result<Vec<StreamFormat>, ProtocolError> {
        let raw = addr.encode();
        let mut formats = Vec::new();
        for index in 0..0xff_u8 {
            // Pacing is a correctness requirement here, not politeness.
            sleep(LIST_PACING);
            let operands = [
                LIST_SUBFUNCTION,
                raw[0],
                raw[1],
                raw[2],
                raw[3],
                raw[4],
                0xff,
                index,
                0xff,
            ];
            let response =
                match self.status_request(addr.target(), Opcode::StreamFormatSupport, &operands)
                {
                    Ok(response) => response,
                    Err(ProtocolError::Rejected) => break,
                    Err(err) => return Err(err),
                };
            let data = response.get(FORMAT_DATA..).ok_or_else(|| {
                ProtocolError::MalformedResponse("stream format response too short".to_string())
            })?;
            formats.push(parse_format(data)?);
        }
        debug!("Plug {addr:?} supports {} stream formats", formats.len());
        Ok(formats)
    }
}

impl<T: FcpTransaction + ?Sized> StreamFormatCommands for T {}
