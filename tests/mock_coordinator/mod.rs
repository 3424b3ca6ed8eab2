//! Randomness coordinator run next to the raffle in integration tests.
//!
//! Hands out sequential request ids and forwards whatever words the
//! fulfiller supplies to the consumer program, signed by the coordinator
//! authority. It performs no proof verification and does not check the id it
//! forwards, so consumers must do their own request matching.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    instruction::{AccountMeta, Instruction},
    msg,
    program::{invoke_signed, set_return_data},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_instruction, system_program,
    sysvar::{rent::Rent, Sysvar},
};

use vrf_raffle::{
    instruction::RaffleInstruction,
    oracle::{find_coordinator_address, CoordinatorInstruction, RandomnessRequest, COORDINATOR_SEED},
};

/// Coordinator state account data
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Default, PartialEq)]
pub struct CoordinatorState {
    pub is_initialized: bool,
    pub bump: u8,
    /// Requests accepted so far; ids start at 1
    pub request_count: u64,
    pub last_request_id: u64,
    pub last_consumer: Pubkey,
    pub last_subscription_id: u64,
    pub last_num_words: u32,
    pub last_fulfilled_request_id: u64,
}

impl CoordinatorState {
    pub const LEN: usize = 1 + 1 + 8 + 8 + 32 + 8 + 4 + 8;

    pub fn load(data: &[u8]) -> Result<Self, ProgramError> {
        let state =
            Self::deserialize(&mut &data[..]).map_err(|_| ProgramError::InvalidAccountData)?;
        if !state.is_initialized {
            return Err(ProgramError::UninitializedAccount);
        }
        Ok(state)
    }

    fn store(&self, data: &mut [u8]) -> Result<(), ProgramError> {
        let mut writer = data;
        self.serialize(&mut writer)
            .map_err(|_| ProgramError::AccountDataTooSmall)
    }
}

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    match CoordinatorInstruction::unpack(instruction_data)? {
        CoordinatorInstruction::Initialize => {
            msg!("Coordinator: Initialize");
            process_initialize(accounts, program_id)
        }
        CoordinatorInstruction::RequestRandomWords(request) => {
            msg!("Coordinator: Request Random Words");
            process_request_random_words(accounts, &request, program_id)
        }
        CoordinatorInstruction::FulfillRandomWords {
            request_id,
            random_words,
        } => {
            msg!("Coordinator: Fulfill Random Words");
            process_fulfill_random_words(accounts, request_id, random_words, program_id)
        }
    }
}

fn process_initialize(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let payer_info = next_account_info(account_info_iter)?;
    let state_info = next_account_info(account_info_iter)?;
    let system_program_info = next_account_info(account_info_iter)?;

    if !payer_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let (expected_state, bump_seed) = find_coordinator_address(program_id);
    if *state_info.key != expected_state {
        return Err(ProgramError::InvalidSeeds);
    }
    if state_info.owner == program_id {
        return Err(ProgramError::AccountAlreadyInitialized);
    }

    let rent = Rent::get()?;
    invoke_signed(
        &system_instruction::create_account(
            payer_info.key,
            state_info.key,
            rent.minimum_balance(CoordinatorState::LEN),
            CoordinatorState::LEN as u64,
            program_id,
        ),
        &[
            payer_info.clone(),
            state_info.clone(),
            system_program_info.clone(),
        ],
        &[&[COORDINATOR_SEED, &[bump_seed]]],
    )?;

    let state = CoordinatorState {
        is_initialized: true,
        bump: bump_seed,
        ..CoordinatorState::default()
    };
    state.store(&mut state_info.data.borrow_mut())
}

fn process_request_random_words(
    accounts: &[AccountInfo],
    request: &RandomnessRequest,
    program_id: &Pubkey,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let state_info = next_account_info(account_info_iter)?;
    let consumer_info = next_account_info(account_info_iter)?;

    if state_info.owner != program_id {
        return Err(ProgramError::IncorrectProgramId);
    }
    if !consumer_info.is_signer {
        msg!("Consumer must sign randomness requests");
        return Err(ProgramError::MissingRequiredSignature);
    }

    let mut state = CoordinatorState::load(&state_info.data.borrow())?;
    let request_id = state
        .request_count
        .checked_add(1)
        .ok_or(ProgramError::InvalidAccountData)?;

    state.request_count = request_id;
    state.last_request_id = request_id;
    state.last_consumer = *consumer_info.key;
    state.last_subscription_id = request.subscription_id;
    state.last_num_words = request.num_words;
    state.store(&mut state_info.data.borrow_mut())?;

    set_return_data(&request_id.to_le_bytes());
    msg!(
        "Request {} for {} words from {}",
        request_id,
        request.num_words,
        consumer_info.key
    );
    Ok(())
}

fn process_fulfill_random_words(
    accounts: &[AccountInfo],
    request_id: u64,
    random_words: Vec<u64>,
    program_id: &Pubkey,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let fulfiller_info = next_account_info(account_info_iter)?;
    let state_info = next_account_info(account_info_iter)?;
    let consumer_program_info = next_account_info(account_info_iter)?;
    let forwarded: Vec<AccountInfo> = account_info_iter.cloned().collect();

    if !fulfiller_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }
    if state_info.owner != program_id {
        return Err(ProgramError::IncorrectProgramId);
    }

    let mut state = CoordinatorState::load(&state_info.data.borrow())?;
    state.last_fulfilled_request_id = request_id;
    state.store(&mut state_info.data.borrow_mut())?;

    let mut metas = vec![AccountMeta::new_readonly(*state_info.key, true)];
    metas.extend(forwarded.iter().map(|account| AccountMeta {
        pubkey: *account.key,
        is_signer: false,
        is_writable: account.is_writable,
    }));

    let callback = Instruction {
        program_id: *consumer_program_info.key,
        accounts: metas,
        data: RaffleInstruction::FulfillRandomWords {
            request_id,
            random_words,
        }
        .pack()?,
    };

    let mut account_infos = vec![state_info.clone()];
    account_infos.extend(forwarded);
    account_infos.push(consumer_program_info.clone());

    invoke_signed(
        &callback,
        &account_infos,
        &[&[COORDINATOR_SEED, &[state.bump]]],
    )?;

    msg!(
        "Delivered randomness for request {} to {}",
        request_id,
        consumer_program_info.key
    );
    Ok(())
}

/// Create the coordinator initialize instruction
pub fn initialize(
    coordinator_program_id: &Pubkey,
    payer: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let (state, _) = find_coordinator_address(coordinator_program_id);
    Ok(Instruction {
        program_id: *coordinator_program_id,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(state, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: CoordinatorInstruction::Initialize.pack()?,
    })
}

/// Create the instruction that delivers `random_words` to `consumer_program_id`.
/// `callback_accounts` are forwarded after the coordinator authority.
pub fn fulfill_random_words(
    coordinator_program_id: &Pubkey,
    fulfiller: &Pubkey,
    consumer_program_id: &Pubkey,
    callback_accounts: Vec<AccountMeta>,
    request_id: u64,
    random_words: Vec<u64>,
) -> Result<Instruction, ProgramError> {
    let (state, _) = find_coordinator_address(coordinator_program_id);
    let mut accounts = vec![
        AccountMeta::new_readonly(*fulfiller, true),
        AccountMeta::new(state, false),
        AccountMeta::new_readonly(*consumer_program_id, false),
    ];
    accounts.extend(callback_accounts);

    Ok(Instruction {
        program_id: *coordinator_program_id,
        accounts,
        data: CoordinatorInstruction::FulfillRandomWords {
            request_id,
            random_words,
        }
        .pack()?,
    })
}
