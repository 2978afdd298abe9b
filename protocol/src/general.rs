use crate::error::ProtocolError;
use crate::transaction::{FcpTransaction, Opcode, UNIT_TARGET};
use bebob_types::{CompanyId, SubunitType, UnitInfo};

pub trait GeneralCommands: FcpTransaction {
    /// Identification of the unit itself via the UNIT INFO command.
    fn get_unit_info(&mut self) -> Result<UnitInfo, ProtocolError> {
        let response = self.status_request(
            UNIT_TARGET,
            Opcode::UnitInfo,
            &[0xff, 0xff, 0xff, 0xff, 0xff],
        )?;
        let data = response.get(1..5).ok_or_else(|| {
            ProtocolError::MalformedResponse("unit info response too short".to_string())
        })?;
        let unit_type = SubunitType::from_repr(data[0] >> 3).ok_or_else(|| {
            ProtocolError::MalformedResponse(format!(
                "unit type {:#04x} out of range",
                data[0] >> 3
            ))
        })?;
        Ok(UnitInfo {
            unit_type,
            unit_id: data[0] & 0x07,
            company_id: CompanyId([data[1], data[2], data[3]]),
        })
    }
}

impl<T: FcpTransaction + ?Sized> GeneralCommands for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedFcp;

    #[test]
    fn unit_info_decodes_type_and_company() {
        let mut fcp = ScriptedFcp::new(vec![Ok(vec![0x07, 0x60, 0x00, 0x07, 0xf5])]);
        let info = fcp.get_unit_info().unwrap();
        assert_eq!(info.unit_type, SubunitType::Music);
        assert_eq!(info.unit_id, 0);
        assert_eq!(info.company_id.to_string(), "00:07:f5");
        assert_eq!(fcp.requests[0].1, Opcode::UnitInfo);
    }
}
