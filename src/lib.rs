// VRF Raffle
// Fixed-fee raffle paid out with coordinator-supplied randomness

pub mod error;
pub mod events;
pub mod instruction;
pub mod processor;
pub mod state;

// Randomness coordinator interface
pub mod oracle;

#[cfg(not(feature = "no-entrypoint"))]
mod entrypoint;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    processor::Processor::process(program_id, accounts, instruction_data)
}
