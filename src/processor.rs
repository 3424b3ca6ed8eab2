// Raffle instruction handlers
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    bpf_loader_upgradeable::{self, UpgradeableLoaderState},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    program_utils::limited_deserialize,
    pubkey::Pubkey,
    system_instruction, system_program,
    sysvar::{clock::Clock, rent::Rent, Sysvar},
};

use crate::{
    error::RaffleError,
    events::{self, EnteredRaffle, PickedWinner, RequestedRaffleWinner},
    instruction::{find_program_data_address, RaffleInstruction, RaffleParams},
    oracle::{find_coordinator_address, CoordinatorClient},
    state::{find_raffle_address, Raffle, RaffleConfig, RAFFLE_SEED},
};

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::InitializeRaffle(params) => {
                msg!("Instruction: Initialize Raffle");
                Self::process_initialize_raffle(accounts, params, program_id)
            }
            RaffleInstruction::EnterRaffle { payment } => {
                msg!("Instruction: Enter Raffle");
                Self::process_enter_raffle(accounts, payment, program_id)
            }
            RaffleInstruction::RequestWinner => {
                msg!("Instruction: Request Winner");
                Self::process_request_winner(accounts, program_id)
            }
            RaffleInstruction::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(accounts, request_id, &random_words, program_id)
            }
        }
    }

    /// Create the raffle PDA and open the first round
    fn process_initialize_raffle(
        accounts: &[AccountInfo],
        params: RaffleParams,
        program_id: &Pubkey,
    ) -> ProgramResult {
        // Get accounts
        let account_info_iter = &mut accounts.iter();
        let payer_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let coordinator_program_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;
        let program_data_info = next_account_info(account_info_iter)?;

        // Verify the payer signed the transaction
        if !payer_info.is_signer {
            msg!("Payer must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        // Only the upgrade authority picks the coordinator
        Self::check_upgrade_authority(program_data_info, payer_info.key, program_id)?;

        // Verify that the provided raffle account is the expected PDA
        let (expected_raffle_pubkey, bump_seed) = find_raffle_address(program_id);
        if *raffle_info.key != expected_raffle_pubkey {
            msg!("Invalid raffle account address");
            return Err(ProgramError::InvalidSeeds);
        }

        if raffle_info.owner == program_id {
            msg!("Raffle account is already initialized");
            return Err(ProgramError::AccountAlreadyInitialized);
        }

        if !coordinator_program_info.executable {
            msg!("Coordinator {} is not a program", coordinator_program_info.key);
            return Err(RaffleError::InvalidCoordinator.into());
        }

        // Validate inputs
        let config = RaffleConfig::new(params, *coordinator_program_info.key);
        config.validate()?;

        // Create the raffle account with the correct PDA
        let bump = [bump_seed];
        let signer_seeds: &[&[u8]] = &[RAFFLE_SEED, &bump];
        Self::create_raffle_account(
            payer_info,
            raffle_info,
            system_program_info,
            signer_seeds,
            program_id,
        )?;

        // Save the raffle data
        let now = Clock::get()?.unix_timestamp;
        let raffle = Raffle::new(config, bump_seed, now);
        raffle.store(&mut raffle_info.data.borrow_mut())?;

        msg!(
            "Raffle initialized: Fee={}, Interval={}s, Coordinator={}",
            config.entrance_fee,
            config.interval,
            config.vrf_coordinator
        );
        Ok(())
    }

    fn process_enter_raffle(
        accounts: &[AccountInfo],
        payment: u64,
        program_id: &Pubkey,
    ) -> ProgramResult {
        // Get accounts
        let account_info_iter = &mut accounts.iter();
        let player_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        // Verify player is signer
        if !player_info.is_signer {
            msg!("Player must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut raffle = Self::load_raffle(raffle_info, program_id)?;
        raffle.enter(*player_info.key, payment)?;

        // Transfer the entrance fee into the pool
        invoke(
            &system_instruction::transfer(player_info.key, raffle_info.key, payment),
            &[
                player_info.clone(),
                raffle_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        raffle.store(&mut raffle_info.data.borrow_mut())?;
        events::emit(&EnteredRaffle {
            player: *player_info.key,
        })?;

        msg!(
            "Player {} entered, {} entries, pool {} lamports",
            player_info.key,
            raffle.player_count(),
            raffle.pool_balance()
        );
        Ok(())
    }

    /// Close the round and ask the coordinator for randomness.
    /// Payout happens only in the coordinator's callback.
    fn process_request_winner(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        // Get accounts
        let account_info_iter = &mut accounts.iter();
        let caller_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let coordinator_program_info = next_account_info(account_info_iter)?;
        let coordinator_state_info = next_account_info(account_info_iter)?;

        if !caller_info.is_signer {
            msg!("Caller must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut raffle = Self::load_raffle(raffle_info, program_id)?;

        // Verify the coordinator matches the configuration
        if *coordinator_program_info.key != raffle.config.vrf_coordinator {
            msg!(
                "Expected coordinator {}, got {}",
                raffle.config.vrf_coordinator,
                coordinator_program_info.key
            );
            return Err(RaffleError::InvalidCoordinator.into());
        }

        // Get current time
        let now = Clock::get()?.unix_timestamp;

        let bump_seed = [raffle.bump];
        let consumer_seeds: &[&[u8]] = &[RAFFLE_SEED, &bump_seed];
        let mut oracle = CoordinatorClient {
            coordinator_program: coordinator_program_info,
            coordinator_state: coordinator_state_info,
            consumer: raffle_info,
            consumer_seeds,
        };

        let request_id = raffle.request_winner(now, &mut oracle)?;

        raffle.store(&mut raffle_info.data.borrow_mut())?;
        events::emit(&RequestedRaffleWinner { request_id })?;

        msg!(
            "Requested winner for {} entries, request id {}",
            raffle.player_count(),
            request_id
        );
        Ok(())
    }

    /// Coordinator callback: pick the winner, pay the pool, reset the round
    fn process_fulfill_random_words(
        accounts: &[AccountInfo],
        request_id: u64,
        random_words: &[u64],
        program_id: &Pubkey,
    ) -> ProgramResult {
        // Get accounts
        let account_info_iter = &mut accounts.iter();
        let oracle_authority_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;

        let mut raffle = Self::load_raffle(raffle_info, program_id)?;

        // Verify the callback comes from the configured coordinator
        let (expected_authority, _) = find_coordinator_address(&raffle.config.vrf_coordinator);
        if !oracle_authority_info.is_signer || *oracle_authority_info.key != expected_authority {
            msg!(
                "Callback must be signed by coordinator authority {}",
                expected_authority
            );
            return Err(RaffleError::UnauthorizedOracle.into());
        }

        let now = Clock::get()?.unix_timestamp;
        let payout = raffle.fulfill_random_words(request_id, random_words, now)?;

        if *winner_info.key != payout.winner {
            msg!(
                "Winner account {} does not match derived winner {}",
                winner_info.key,
                payout.winner
            );
            return Err(RaffleError::WinnerAccountMismatch.into());
        }

        // Pay the pool out of the raffle account
        let raffle_lamports = raffle_info
            .lamports()
            .checked_sub(payout.amount)
            .ok_or(RaffleError::Overflow)?;
        let winner_lamports = winner_info
            .lamports()
            .checked_add(payout.amount)
            .ok_or(RaffleError::Overflow)?;
        **raffle_info.try_borrow_mut_lamports()? = raffle_lamports;
        **winner_info.try_borrow_mut_lamports()? = winner_lamports;

        raffle.store(&mut raffle_info.data.borrow_mut())?;
        events::emit(&PickedWinner {
            winner: payout.winner,
            amount: payout.amount,
            round: raffle.rounds_completed(),
        })?;

        msg!(
            "Winner {} paid {} lamports for request {}",
            payout.winner,
            payout.amount,
            request_id
        );
        Ok(())
    }

    fn load_raffle(raffle_info: &AccountInfo, program_id: &Pubkey) -> Result<Raffle, ProgramError> {
        if raffle_info.owner != program_id {
            msg!("Raffle account must be owned by the program");
            return Err(ProgramError::IncorrectProgramId);
        }

        let raffle = Raffle::load(&raffle_info.data.borrow())?;

        let expected = Pubkey::create_program_address(&[RAFFLE_SEED, &[raffle.bump]], program_id)?;
        if *raffle_info.key != expected {
            msg!("Invalid raffle account address");
            return Err(ProgramError::InvalidSeeds);
        }
        Ok(raffle)
    }

    fn check_upgrade_authority(
        program_data_info: &AccountInfo,
        authority: &Pubkey,
        program_id: &Pubkey,
    ) -> ProgramResult {
        if *program_data_info.key != find_program_data_address(program_id)
            || *program_data_info.owner != bpf_loader_upgradeable::id()
        {
            msg!("Invalid program data account");
            return Err(ProgramError::InvalidAccountData);
        }

        let state: UpgradeableLoaderState = limited_deserialize(
            &program_data_info.data.borrow(),
            UpgradeableLoaderState::size_of_programdata_metadata() as u64,
        )
        .map_err(|_| ProgramError::InvalidAccountData)?;

        match state {
            UpgradeableLoaderState::ProgramData {
                upgrade_authority_address: Some(upgrade_authority),
                ..
            } if upgrade_authority == *authority => Ok(()),
            _ => {
                msg!("{} is not the upgrade authority", authority);
                Err(RaffleError::UnauthorizedInitializer.into())
            }
        }
    }

    /// Allocate the raffle PDA. Lamports already sent to the address are kept
    /// and topped up to the rent-exempt minimum.
    fn create_raffle_account<'info>(
        payer_info: &AccountInfo<'info>,
        raffle_info: &AccountInfo<'info>,
        system_program_info: &AccountInfo<'info>,
        signer_seeds: &[&[u8]],
        program_id: &Pubkey,
    ) -> ProgramResult {
        // Get rent exemption amount
        let rent = Rent::get()?;
        let rent_lamports = rent.minimum_balance(Raffle::LEN);

        if raffle_info.lamports() == 0 {
            return invoke_signed(
                &system_instruction::create_account(
                    payer_info.key,
                    raffle_info.key,
                    rent_lamports,
                    Raffle::LEN as u64,
                    program_id,
                ),
                &[
                    payer_info.clone(),
                    raffle_info.clone(),
                    system_program_info.clone(),
                ],
                &[signer_seeds],
            );
        }

        if *raffle_info.owner != system_program::id() {
            msg!("Raffle address is held by {}", raffle_info.owner);
            return Err(ProgramError::AccountAlreadyInitialized);
        }

        msg!("Raffle address already funded, allocating in place");
        let top_up = rent_lamports.saturating_sub(raffle_info.lamports());
        if top_up > 0 {
            invoke(
                &system_instruction::transfer(payer_info.key, raffle_info.key, top_up),
                &[
                    payer_info.clone(),
                    raffle_info.clone(),
                    system_program_info.clone(),
                ],
            )?;
        }

        invoke_signed(
            &system_instruction::allocate(raffle_info.key, Raffle::LEN as u64),
            &[raffle_info.clone(), system_program_info.clone()],
            &[signer_seeds],
        )?;
        invoke_signed(
            &system_instruction::assign(raffle_info.key, program_id),
            &[raffle_info.clone(), system_program_info.clone()],
            &[signer_seeds],
        )
    }
}
