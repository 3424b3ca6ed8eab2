use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{log::sol_log_data, program_error::ProgramError, pubkey::Pubkey};

/// Program log record, written as `[NAME, borsh(event)]` with `sol_log_data`
pub trait Event: BorshSerialize {
    const NAME: &'static [u8];
}

/// Emitted when a player enters the raffle
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct EnteredRaffle {
    pub player: Pubkey,
}

impl Event for EnteredRaffle {
    const NAME: &'static [u8] = b"EnteredRaffle";
}

/// Emitted when a round is closed and randomness requested
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct RequestedRaffleWinner {
    pub request_id: u64,
}

impl Event for RequestedRaffleWinner {
    const NAME: &'static [u8] = b"RequestedRaffleWinner";
}

/// Emitted when the pool is paid out
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct PickedWinner {
    pub winner: Pubkey,
    pub amount: u64,
    /// Number of rounds completed, this one included
    pub round: u64,
}

impl Event for PickedWinner {
    const NAME: &'static [u8] = b"PickedWinner";
}

pub fn emit<E: Event>(event: &E) -> Result<(), ProgramError> {
    let data = event
        .try_to_vec()
        .map_err(|_| ProgramError::InvalidArgument)?;
    sol_log_data(&[E::NAME, data.as_slice()]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_program::program_stubs::{set_syscall_stubs, SyscallStubs};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_picked_winner_layout() {
        let event = PickedWinner {
            winner: Pubkey::new_unique(),
            amount: 30,
            round: 2,
        };
        let data = event.try_to_vec().unwrap();
        assert_eq!(data.len(), 32 + 8 + 8);
        assert_eq!(&data[..32], event.winner.as_ref());
        assert_eq!(PickedWinner::try_from_slice(&data).unwrap(), event);
    }

    struct CapturedLogs(Arc<Mutex<Vec<Vec<Vec<u8>>>>>);

    impl SyscallStubs for CapturedLogs {
        fn sol_log_data(&self, fields: &[&[u8]]) {
            self.0
                .lock()
                .unwrap()
                .push(fields.iter().map(|field| field.to_vec()).collect());
        }
    }

    #[test]
    fn test_emit_logs_name_and_payload() {
        let logs = Arc::new(Mutex::new(Vec::new()));
        let previous = set_syscall_stubs(Box::new(CapturedLogs(logs.clone())));

        let event = RequestedRaffleWinner { request_id: 7 };
        let result = emit(&event);
        set_syscall_stubs(previous);
        result.unwrap();

        let logs = logs.lock().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(
            logs[0],
            vec![b"RequestedRaffleWinner".to_vec(), 7u64.to_le_bytes().to_vec()]
        );
    }
}
