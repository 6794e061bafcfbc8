// Raffle Program - Instruction Processor
use borsh::BorshSerialize;
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack},
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::Sysvar,
};
use vrf_coordinator::{
    instruction::request_random_words,
    state::{
        find_authority_address, find_consumer_identity_address, RandomnessRequest, Subscription,
        CONSUMER_SEED,
    },
};

use crate::{
    error::RaffleError,
    events::RaffleEvent,
    instruction::{RaffleInstruction, FULFILL_RANDOM_WORDS_TAG},
    state::{held_balance, Raffle, RaffleConfig},
};

/// Block confirmations the coordinator waits before answering
pub const REQUEST_CONFIRMATIONS: u16 = 3;
/// Random words requested per draw
pub const NUM_WORDS: u32 = 1;

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::Initialize {
                entrance_fee,
                interval,
                gas_lane,
                subscription_id,
                callback_gas_limit,
            } => {
                msg!("Instruction: Initialize");
                Self::process_initialize(
                    program_id,
                    accounts,
                    entrance_fee,
                    interval,
                    gas_lane,
                    subscription_id,
                    callback_gas_limit,
                )
            }
            RaffleInstruction::Enter { payment } => {
                msg!("Instruction: Enter");
                Self::process_enter(program_id, accounts, payment)
            }
            RaffleInstruction::CheckUpkeep => {
                msg!("Instruction: Check Upkeep");
                Self::process_check_upkeep(program_id, accounts)
            }
            RaffleInstruction::PerformUpkeep => {
                msg!("Instruction: Perform Upkeep");
                Self::process_perform_upkeep(program_id, accounts)
            }
            RaffleInstruction::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(program_id, accounts, request_id, &random_words)
            }
        }
    }

    /// Loads an initialized raffle owned by this program
    fn load_raffle(program_id: &Pubkey, raffle_info: &AccountInfo) -> Result<Raffle, ProgramError> {
        if raffle_info.owner != program_id {
            msg!("Raffle account must be owned by the raffle program");
            return Err(ProgramError::IncorrectProgramId);
        }
        let raffle = Raffle::unpack(&raffle_info.data.borrow())?;
        if !raffle.is_initialized() {
            return Err(ProgramError::UninitializedAccount);
        }
        Ok(raffle)
    }

    /// Lamports of the raffle account available for the prize
    fn prize_pool(raffle_info: &AccountInfo) -> Result<u64, ProgramError> {
        let rent = Rent::get()?;
        Ok(held_balance(
            raffle_info.lamports(),
            rent.minimum_balance(raffle_info.data_len()),
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn process_initialize(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        entrance_fee: u64,
        interval: i64,
        gas_lane: [u8; 32],
        subscription_id: u64,
        callback_gas_limit: u32,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let coordinator_program_info = next_account_info(account_info_iter)?;
        let coordinator_config_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;

        if !authority_info.is_signer {
            msg!("Authority must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        if raffle_info.owner != program_id {
            msg!("Raffle account must be owned by the raffle program");
            return Err(ProgramError::IncorrectProgramId);
        }

        if raffle_info.data_len() != Raffle::LEN {
            msg!("Raffle account needs {} bytes", Raffle::LEN);
            return Err(ProgramError::InvalidAccountData);
        }

        let existing = Raffle::unpack(&raffle_info.data.borrow())?;
        if existing.is_initialized() {
            return Err(RaffleError::AlreadyInitialized.into());
        }

        if entrance_fee == 0 || interval < 0 || callback_gas_limit == 0 {
            msg!(
                "Invalid configuration: entrance_fee={}, interval={}, callback_gas_limit={}",
                entrance_fee,
                interval,
                callback_gas_limit
            );
            return Err(RaffleError::InvalidConfig.into());
        }

        // The subscription must belong to the given coordinator
        if coordinator_config_info.owner != coordinator_program_info.key
            || subscription_info.owner != coordinator_program_info.key
        {
            msg!("Coordinator accounts are not owned by {}", coordinator_program_info.key);
            return Err(RaffleError::InvalidCoordinator.into());
        }
        let subscription = Subscription::unpack(&subscription_info.data.borrow())?;
        if !subscription.is_initialized()
            || subscription.id != subscription_id
            || subscription.coordinator != *coordinator_config_info.key
        {
            msg!("Subscription {} does not match the coordinator", subscription_id);
            return Err(RaffleError::InvalidCoordinator.into());
        }

        let config = RaffleConfig {
            entrance_fee,
            interval,
            gas_lane,
            subscription_id,
            callback_gas_limit,
            vrf_coordinator: *coordinator_program_info.key,
            coordinator_state: *coordinator_config_info.key,
            subscription: *subscription_info.key,
        };
        let now = Clock::get()?.unix_timestamp;
        let raffle = Raffle::new(*authority_info.key, config, now);
        raffle.pack(&mut raffle_info.data.borrow_mut())?;

        msg!(
            "Raffle initialized: entrance_fee={}, interval={}, subscription_id={}",
            entrance_fee,
            interval,
            subscription_id
        );
        Ok(())
    }

    fn process_enter(program_id: &Pubkey, accounts: &[AccountInfo], payment: u64) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let player_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !player_info.is_signer {
            msg!("Player must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut raffle = Self::load_raffle(program_id, raffle_info)?;
        if let Err(err) = raffle.enter(payment, *player_info.key) {
            msg!(
                "Entry rejected: payment={}, entrance_fee={}, state={:?}",
                payment,
                raffle.entrance_fee(),
                raffle.raffle_state()
            );
            return Err(err.into());
        }

        invoke(
            &system_instruction::transfer(player_info.key, raffle_info.key, payment),
            &[
                player_info.clone(),
                raffle_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        raffle.pack(&mut raffle_info.data.borrow_mut())?;

        msg!(
            "Entered with {} lamports, {} players in this round",
            payment,
            raffle.number_of_players()
        );
        RaffleEvent::RaffleEnter {
            player: *player_info.key,
        }
        .emit();
        Ok(())
    }

    fn process_check_upkeep(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let raffle_info = next_account_info(account_info_iter)?;

        let raffle = Self::load_raffle(program_id, raffle_info)?;
        let now = Clock::get()?.unix_timestamp;
        let check = raffle.check_upkeep(now, Self::prize_pool(raffle_info)?);

        msg!(
            "Upkeep check: upkeep_needed={} reason={:?}",
            check.upkeep_needed,
            check.reason
        );
        let data = check
            .try_to_vec()
            .map_err(|err| ProgramError::BorshIoError(err.to_string()))?;
        set_return_data(&data);
        Ok(())
    }

    fn process_perform_upkeep(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let keeper_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let consumer_identity_info = next_account_info(account_info_iter)?;
        let raffle_program_info = next_account_info(account_info_iter)?;
        let coordinator_program_info = next_account_info(account_info_iter)?;
        let coordinator_config_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;
        let request_info = next_account_info(account_info_iter)?;

        if !keeper_info.is_signer {
            msg!("Keeper must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut raffle = Self::load_raffle(program_id, raffle_info)?;
        let now = Clock::get()?.unix_timestamp;
        let balance = Self::prize_pool(raffle_info)?;

        let check = raffle.check_upkeep(now, balance);
        if !check.upkeep_needed {
            msg!(
                "Upkeep not needed: balance={}, players={}, state={:?}, reason={:?}",
                balance,
                raffle.number_of_players(),
                raffle.raffle_state(),
                check.reason
            );
            return Err(RaffleError::UpkeepNotNeeded.into());
        }

        if *coordinator_program_info.key != raffle.config.vrf_coordinator
            || *coordinator_config_info.key != raffle.config.coordinator_state
            || *subscription_info.key != raffle.config.subscription
        {
            msg!("Coordinator accounts do not match the raffle configuration");
            return Err(RaffleError::InvalidCoordinator.into());
        }

        let (consumer_identity, bump_seed) = find_consumer_identity_address(program_id);
        if *consumer_identity_info.key != consumer_identity
            || raffle_program_info.key != program_id
        {
            msg!("Invalid consumer identity account");
            return Err(ProgramError::InvalidSeeds);
        }

        let request = request_random_words(
            coordinator_program_info.key,
            program_id,
            coordinator_config_info.key,
            subscription_info.key,
            request_info.key,
            keeper_info.key,
            raffle.config.gas_lane,
            raffle.config.subscription_id,
            REQUEST_CONFIRMATIONS,
            raffle.config.callback_gas_limit,
            NUM_WORDS,
            FULFILL_RANDOM_WORDS_TAG,
        )?;
        invoke_signed(
            &request,
            &[
                consumer_identity_info.clone(),
                raffle_program_info.clone(),
                coordinator_config_info.clone(),
                subscription_info.clone(),
                request_info.clone(),
                keeper_info.clone(),
                coordinator_program_info.clone(),
            ],
            &[&[CONSUMER_SEED, &[bump_seed]]],
        )?;

        // The coordinator records the assigned id in the request account
        let request = RandomnessRequest::unpack(&request_info.data.borrow())?;
        if request.consumer_program != *program_id {
            return Err(RaffleError::InvalidCoordinator.into());
        }

        raffle.begin_calculating(request.request_id, now, balance)?;
        raffle.pack(&mut raffle_info.data.borrow_mut())?;

        msg!(
            "Round closed with {} players and {} lamports",
            raffle.number_of_players(),
            balance
        );
        RaffleEvent::RequestedRaffleWinner {
            request_id: request.request_id,
        }
        .emit();
        Ok(())
    }

    fn process_fulfill_random_words(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        request_id: u64,
        random_words: &[u64],
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;

        let mut raffle = Self::load_raffle(program_id, raffle_info)?;

        let (authority, _) = find_authority_address(&raffle.config.vrf_coordinator);
        if !authority_info.is_signer || *authority_info.key != authority {
            msg!("Fulfilment must be signed by the coordinator authority {}", authority);
            return Err(RaffleError::UnauthorizedFulfillment.into());
        }

        let winner = raffle.pending_winner(request_id, random_words)?;
        if *winner_info.key != winner {
            msg!("Prize cannot be delivered: winner is {}", winner);
            return Err(RaffleError::TransferFailed.into());
        }

        let prize = Self::prize_pool(raffle_info)?;
        let now = Clock::get()?.unix_timestamp;
        raffle.resolve(request_id, random_words, now)?;
        raffle.pack(&mut raffle_info.data.borrow_mut())?;

        let raffle_lamports = raffle_info
            .lamports()
            .checked_sub(prize)
            .ok_or(RaffleError::TransferFailed)?;
        let winner_lamports = winner_info
            .lamports()
            .checked_add(prize)
            .ok_or(RaffleError::TransferFailed)?;
        **raffle_info.try_borrow_mut_lamports()? = raffle_lamports;
        **winner_info.try_borrow_mut_lamports()? = winner_lamports;

        msg!("Paid {} lamports to {}", prize, winner);
        RaffleEvent::WinnerPicked { winner }.emit();
        Ok(())
    }
}
