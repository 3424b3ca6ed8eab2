use arrayref::array_ref;
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    bpf_loader_upgradeable,
    pubkey::Pubkey,
    system_program,
};

use crate::{error::RaffleError, oracle, state::find_raffle_address};

/// Constructor parameters supplied by the deployer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaffleParams {
    /// Exact payment required per entry, in lamports
    pub entrance_fee: u64,
    /// Minimum round length in seconds
    pub interval: u64,
    /// Randomness key the coordinator signs with
    pub key_hash: [u8; 32],
    /// Coordinator subscription billed for requests
    pub subscription_id: u64,
    /// Compute budget granted to the callback
    pub callback_gas_limit: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RaffleInstruction {
    /// Create the raffle account and open the first round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The program's upgrade authority, funding the raffle account
    /// 1. `[writable]` The raffle account (PDA, seeds `["raffle"]`)
    /// 2. `[]` The randomness coordinator program
    /// 3. `[]` The system program
    /// 4. `[]` The raffle program's program data account
    InitializeRaffle(RaffleParams),

    /// Enter the current round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The player paying the entrance fee
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The system program
    EnterRaffle {
        /// Lamports transferred with the entry
        payment: u64,
    },

    /// Close the round and ask the coordinator for randomness.
    /// Anyone may send this once the interval has elapsed.
    ///
    /// Accounts expected:
    /// 0. `[signer]` Any caller
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The randomness coordinator program
    /// 3. `[writable]` The coordinator state account
    RequestWinner,

    /// Deliver randomness for the pending request and pay the winner
    ///
    /// Accounts expected:
    /// 0. `[signer]` The coordinator authority
    /// 1. `[writable]` The raffle account
    /// 2. `[writable]` The prize recipient (derived winner)
    FulfillRandomWords {
        request_id: u64,
        random_words: Vec<u64>,
    },
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input
            .split_first()
            .ok_or(RaffleError::InvalidInstructionData)?;

        Ok(match tag {
            0 => {
                let (entrance_fee, rest) = unpack_u64(rest)?;
                let (interval, rest) = unpack_u64(rest)?;
                let (key_hash, rest) = unpack_bytes32(rest)?;
                let (subscription_id, rest) = unpack_u64(rest)?;
                let (callback_gas_limit, _) = unpack_u32(rest)?;
                Self::InitializeRaffle(RaffleParams {
                    entrance_fee,
                    interval,
                    key_hash,
                    subscription_id,
                    callback_gas_limit,
                })
            }
            1 => {
                let (payment, _) = unpack_u64(rest)?;
                Self::EnterRaffle { payment }
            }
            2 => Self::RequestWinner,
            3 => {
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

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Result<Vec<u8>, ProgramError> {
        let mut buf = Vec::new();
        match self {
            Self::InitializeRaffle(params) => {
                buf.push(0);
                buf.extend_from_slice(&params.entrance_fee.to_le_bytes());
                buf.extend_from_slice(&params.interval.to_le_bytes());
                buf.extend_from_slice(&params.key_hash);
                buf.extend_from_slice(&params.subscription_id.to_le_bytes());
                buf.extend_from_slice(&params.callback_gas_limit.to_le_bytes());
            }
            Self::EnterRaffle { payment } => {
                buf.push(1);
                buf.extend_from_slice(&payment.to_le_bytes());
            }
            Self::RequestWinner => buf.push(2),
            Self::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                buf.push(3);
                buf.extend_from_slice(&request_id.to_le_bytes());
                pack_words(random_words, &mut buf)?;
            }
        }
        Ok(buf)
    }
}

pub(crate) fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
    if input.len() < 8 {
        return Err(RaffleError::InvalidInstructionData.into());
    }
    let (value, rest) = input.split_at(8);
    Ok((u64::from_le_bytes(*array_ref![value, 0, 8]), rest))
}

pub(crate) fn unpack_u32(input: &[u8]) -> Result<(u32, &[u8]), ProgramError> {
    if input.len() < 4 {
        return Err(RaffleError::InvalidInstructionData.into());
    }
    let (value, rest) = input.split_at(4);
    Ok((u32::from_le_bytes(*array_ref![value, 0, 4]), rest))
}

pub(crate) fn unpack_u16(input: &[u8]) -> Result<(u16, &[u8]), ProgramError> {
    if input.len() < 2 {
        return Err(RaffleError::InvalidInstructionData.into());
    }
    let (value, rest) = input.split_at(2);
    Ok((u16::from_le_bytes(*array_ref![value, 0, 2]), rest))
}

pub(crate) fn unpack_bytes32(input: &[u8]) -> Result<([u8; 32], &[u8]), ProgramError> {
    if input.len() < 32 {
        return Err(RaffleError::InvalidInstructionData.into());
    }
    let (value, rest) = input.split_at(32);
    Ok((*array_ref![value, 0, 32], rest))
}

/// Word lists travel as a one-byte count followed by little-endian u64s.
pub(crate) fn unpack_words(input: &[u8]) -> Result<(Vec<u64>, &[u8]), ProgramError> {
    let (count, mut rest) = input
        .split_first()
        .ok_or(RaffleError::InvalidInstructionData)?;
    let mut words = Vec::with_capacity(*count as usize);
    for _ in 0..*count {
        let (word, tail) = unpack_u64(rest)?;
        words.push(word);
        rest = tail;
    }
    Ok((words, rest))
}

pub(crate) fn pack_words(words: &[u64], buf: &mut Vec<u8>) -> Result<(), ProgramError> {
    let count = u8::try_from(words.len()).map_err(|_| RaffleError::TooManyRandomWords)?;
    buf.push(count);
    for word in words {
        buf.extend_from_slice(&word.to_le_bytes());
    }
    Ok(())
}

/// Find the program data account holding a program's upgrade authority
pub fn find_program_data_address(program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[program_id.as_ref()], &bpf_loader_upgradeable::id()).0
}

/// Create initialize_raffle instruction
pub fn initialize_raffle(
    program_id: &Pubkey,
    payer: &Pubkey,
    vrf_coordinator: &Pubkey,
    params: RaffleParams,
) -> Result<Instruction, ProgramError> {
    let (raffle, _) = find_raffle_address(program_id);
    let data = RaffleInstruction::InitializeRaffle(params).pack()?;

    let accounts = vec![
        AccountMeta::new(*payer, true),
        AccountMeta::new(raffle, false),
        AccountMeta::new_readonly(*vrf_coordinator, false),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(find_program_data_address(program_id), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create enter_raffle instruction
pub fn enter_raffle(
    program_id: &Pubkey,
    player: &Pubkey,
    payment: u64,
) -> Result<Instruction, ProgramError> {
    let (raffle, _) = find_raffle_address(program_id);
    let data = RaffleInstruction::EnterRaffle { payment }.pack()?;

    let accounts = vec![
        AccountMeta::new(*player, true),
        AccountMeta::new(raffle, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create request_winner instruction
pub fn request_winner(
    program_id: &Pubkey,
    caller: &Pubkey,
    vrf_coordinator: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let (raffle, _) = find_raffle_address(program_id);
    let (coordinator_state, _) = oracle::find_coordinator_address(vrf_coordinator);
    let data = RaffleInstruction::RequestWinner.pack()?;

    let accounts = vec![
        AccountMeta::new_readonly(*caller, true),
        AccountMeta::new(raffle, false),
        AccountMeta::new_readonly(*vrf_coordinator, false),
        AccountMeta::new(coordinator_state, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create fulfill_random_words instruction, as sent by the coordinator authority
pub fn fulfill_random_words(
    program_id: &Pubkey,
    oracle_authority: &Pubkey,
    winner: &Pubkey,
    request_id: u64,
    random_words: Vec<u64>,
) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::FulfillRandomWords {
        request_id,
        random_words,
    }
    .pack()?;

    let mut accounts = vec![AccountMeta::new_readonly(*oracle_authority, true)];
    accounts.extend(callback_accounts(program_id, winner));

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Accounts the coordinator must forward with a randomness callback,
/// after its own authority.
pub fn callback_accounts(program_id: &Pubkey, winner: &Pubkey) -> Vec<AccountMeta> {
    let (raffle, _) = find_raffle_address(program_id);
    vec![AccountMeta::new(raffle, false), AccountMeta::new(*winner, false)]
}
