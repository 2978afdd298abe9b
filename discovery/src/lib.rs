pub mod error;
pub mod router;
pub mod topology;

#[cfg(test)]
pub(crate) mod test_support {
    use bebob_protocol::error::ProtocolError;
    use bebob_protocol::transaction::{FcpTransaction, Opcode};
    use std::collections::VecDeque;

    /// Replays canned response operands in order, recording every request.
    pub struct ScriptedFcp {
        responses: VecDeque<Result<Vec<u8>, ProtocolError>>,
        pub requests: Vec<(u8, Opcode, Vec<u8>)>,
    }

    impl ScriptedFcp {
        pub fn new(responses: Vec<Result<Vec<u8>, ProtocolError>>) -> Self {
            Self {
                responses: responses.into(),
                requests: Vec::new(),
            }
        }
    }

    impl FcpTransaction for ScriptedFcp {
        fn status_request(
            &mut self,
            target: u8,
            opcode: Opcode,
            operands: &[u8],
        ) -> Result<Vec<u8>, ProtocolError> {
            self.requests.push((target, opcode, operands.to_vec()));
            self.responses
                .pop_front()
                .unwrap_or(Err(ProtocolError::Rejected))
        }
    }
}
