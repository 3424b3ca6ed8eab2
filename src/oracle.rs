//! Randomness coordinator interface.
//!
//! The raffle asks a coordinator program for random words through
//! [`RandomnessOracle`]. The coordinator answers later by invoking the
//! raffle's `FulfillRandomWords` instruction, signed by its authority PDA
//! (see [`find_coordinator_address`]).

use solana_program::{
    account_info::AccountInfo,
    instruction::{AccountMeta, Instruction},
    msg,
    program::{get_return_data, invoke_signed},
    program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::{
    error::RaffleError,
    instruction::{pack_words, unpack_bytes32, unpack_u16, unpack_u32, unpack_u64, unpack_words},
};

/// Seed of the coordinator's state account, which also signs callbacks
pub const COORDINATOR_SEED: &[u8] = b"coordinator";

/// Find the coordinator state/authority address for a coordinator program
pub fn find_coordinator_address(coordinator_program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[COORDINATOR_SEED], coordinator_program_id)
}

/// Parameters of one randomness request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RandomnessRequest {
    /// Randomness key the coordinator proves against
    pub key_hash: [u8; 32],
    pub subscription_id: u64,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
}

/// Source of verifiable randomness.
///
/// `request_random_words` registers a request and returns its id; the words
/// arrive later through the raffle's callback carrying that same id.
pub trait RandomnessOracle {
    fn request_random_words(&mut self, request: &RandomnessRequest) -> Result<u64, ProgramError>;
}

/// Instructions understood by a randomness coordinator
#[derive(Clone, Debug, PartialEq)]
pub enum CoordinatorInstruction {
    /// Create the coordinator state account
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Payer
    /// 1. `[writable]` Coordinator state (PDA, seeds `["coordinator"]`)
    /// 2. `[]` The system program
    Initialize,

    /// Register a randomness request; the id is returned as return data
    ///
    /// Accounts expected:
    /// 0. `[writable]` Coordinator state
    /// 1. `[signer]` Consumer account the callback will be addressed to
    RequestRandomWords(RandomnessRequest),

    /// Deliver random words to a consumer program
    ///
    /// Accounts expected:
    /// 0. `[signer]` Fulfiller
    /// 1. `[writable]` Coordinator state
    /// 2. `[]` Consumer program
    /// 3.. Accounts forwarded to the consumer callback
    FulfillRandomWords {
        request_id: u64,
        random_words: Vec<u64>,
    },
}

impl CoordinatorInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input
            .split_first()
            .ok_or(RaffleError::InvalidInstructionData)?;

        Ok(match tag {
            0 => Self::Initialize,
            1 => {
                let (key_hash, rest) = unpack_bytes32(rest)?;
                let (subscription_id, rest) = unpack_u64(rest)?;
                let (request_confirmations, rest) = unpack_u16(rest)?;
                let (callback_gas_limit, rest) = unpack_u32(rest)?;
                let (num_words, _) = unpack_u32(rest)?;
                Self::RequestRandomWords(RandomnessRequest {
                    key_hash,
                    subscription_id,
                    request_confirmations,
                    callback_gas_limit,
                    num_words,
                })
            }
            2 => {
                let (request_id, rest) = unpack_u64(rest)?;
                let (random_words, _) = unpack_words(rest)?;
                Self::FulfillRandomWords {
                    request_id,
                    random_words,
                }
            }
            _ => return Err(RaffleError::InvalidInstructionData.into()),
        })
    }

    pub fn pack(&self) -> Result<Vec<u8>, ProgramError> {
        let mut buf = Vec::new();
        match self {
            Self::Initialize => buf.push(0),
            Self::RequestRandomWords(request) => {
                buf.push(1);
                buf.extend_from_slice(&request.key_hash);
                buf.extend_from_slice(&request.subscription_id.to_le_bytes());
                buf.extend_from_slice(&request.request_confirmations.to_le_bytes());
                buf.extend_from_slice(&request.callback_gas_limit.to_le_bytes());
                buf.extend_from_slice(&request.num_words.to_le_bytes());
            }
            Self::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                buf.push(2);
                buf.extend_from_slice(&request_id.to_le_bytes());
                pack_words(random_words, &mut buf)?;
            }
        }
        Ok(buf)
    }
}

/// Requests randomness from a coordinator program by CPI, signing as the
/// consumer PDA.
pub struct CoordinatorClient<'a, 'info> {
    pub coordinator_program: &'a AccountInfo<'info>,
    pub coordinator_state: &'a AccountInfo<'info>,
    pub consumer: &'a AccountInfo<'info>,
    pub consumer_seeds: &'a [&'a [u8]],
}

impl<'a, 'info> RandomnessOracle for CoordinatorClient<'a, 'info> {
    fn request_random_words(&mut self, request: &RandomnessRequest) -> Result<u64, ProgramError> {
        let instruction = Instruction {
            program_id: *self.coordinator_program.key,
            accounts: vec![
                AccountMeta::new(*self.coordinator_state.key, false),
                AccountMeta::new_readonly(*self.consumer.key, true),
            ],
            data: CoordinatorInstruction::RequestRandomWords(request.clone()).pack()?,
        };

        invoke_signed(
            &instruction,
            &[
                self.coordinator_state.clone(),
                self.consumer.clone(),
                self.coordinator_program.clone(),
            ],
            &[self.consumer_seeds],
        )?;

        let (program_id, data) = get_return_data().ok_or(RaffleError::MissingRequestId)?;
        if program_id != *self.coordinator_program.key {
            msg!("Return data set by {} instead of the coordinator", program_id);
            return Err(RaffleError::MissingRequestId.into());
        }
        let (request_id, _) =
            unpack_u64(&data).map_err(|_| ProgramError::from(RaffleError::MissingRequestId))?;

        msg!("Coordinator accepted randomness request {}", request_id);
        Ok(request_id)
    }
}
