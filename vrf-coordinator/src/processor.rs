// VRF Coordinator - Instruction Processor
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    instruction::{AccountMeta, Instruction},
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack},
    pubkey::Pubkey,
    system_instruction,
    sysvar::Sysvar,
};

use crate::{
    error::CoordinatorError,
    instruction::{callback_data, CoordinatorInstruction},
    state::{
        derive_random_words, find_authority_address, find_consumer_identity_address,
        CoordinatorConfig, RandomnessRequest, Subscription, AUTHORITY_SEED,
        MAX_CALLBACK_GAS_LIMIT, MAX_CONSUMERS, MAX_NUM_WORDS, MAX_REQUEST_CONFIRMATIONS,
    },
};

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = CoordinatorInstruction::unpack(instruction_data)?;

        match instruction {
            CoordinatorInstruction::Initialize {
                base_fee,
                fee_per_word,
            } => {
                msg!("Instruction: Initialize");
                Self::process_initialize(program_id, accounts, base_fee, fee_per_word)
            }
            CoordinatorInstruction::CreateSubscription => {
                msg!("Instruction: Create Subscription");
                Self::process_create_subscription(program_id, accounts)
            }
            CoordinatorInstruction::FundSubscription { amount } => {
                msg!("Instruction: Fund Subscription");
                Self::process_fund_subscription(program_id, accounts, amount)
            }
            CoordinatorInstruction::AddConsumer { consumer } => {
                msg!("Instruction: Add Consumer");
                Self::process_add_consumer(program_id, accounts, consumer)
            }
            CoordinatorInstruction::RemoveConsumer { consumer } => {
                msg!("Instruction: Remove Consumer");
                Self::process_remove_consumer(program_id, accounts, consumer)
            }
            CoordinatorInstruction::RequestRandomWords {
                key_hash,
                subscription_id,
                minimum_confirmations,
                callback_gas_limit,
                num_words,
                callback_tag,
            } => {
                msg!("Instruction: Request Random Words");
                Self::process_request_random_words(
                    program_id,
                    accounts,
                    key_hash,
                    subscription_id,
                    minimum_confirmations,
                    callback_gas_limit,
                    num_words,
                    callback_tag,
                )
            }
            CoordinatorInstruction::FulfillRandomWords {
                request_id,
                override_words,
            } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(program_id, accounts, request_id, override_words)
            }
        }
    }

    fn process_initialize(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        base_fee: u64,
        fee_per_word: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;

        if !admin_info.is_signer {
            msg!("Admin must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        if config_info.owner != program_id {
            msg!("Config account must be owned by the coordinator");
            return Err(ProgramError::IncorrectProgramId);
        }

        let existing = CoordinatorConfig::unpack_unchecked(&config_info.data.borrow())?;
        if existing.is_initialized() {
            msg!("Config account is already initialized");
            return Err(CoordinatorError::AlreadyInitialized.into());
        }

        let config = CoordinatorConfig::new(*admin_info.key, base_fee, fee_per_word);
        CoordinatorConfig::pack(config, &mut config_info.data.borrow_mut())?;

        msg!(
            "Coordinator initialized: admin={}, base_fee={}, fee_per_word={}",
            admin_info.key,
            base_fee,
            fee_per_word
        );
        Ok(())
    }

    fn process_create_subscription(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let owner_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;

        if !owner_info.is_signer {
            msg!("Subscription owner must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        if config_info.owner != program_id || subscription_info.owner != program_id {
            return Err(ProgramError::IncorrectProgramId);
        }

        if subscription_info.data_len() != Subscription::LEN {
            msg!("Subscription account needs {} bytes", Subscription::LEN);
            return Err(ProgramError::InvalidAccountData);
        }

        let mut config = CoordinatorConfig::unpack(&config_info.data.borrow())?;
        let existing = Subscription::unpack(&subscription_info.data.borrow())?;
        if existing.is_initialized() {
            msg!("Subscription account is already in use");
            return Err(CoordinatorError::AlreadyInitialized.into());
        }

        let subscription_id = config.next_subscription_id;
        config.next_subscription_id = subscription_id
            .checked_add(1)
            .ok_or(CoordinatorError::Overflow)?;

        let subscription = Subscription {
            is_initialized: true,
            id: subscription_id,
            coordinator: *config_info.key,
            owner: *owner_info.key,
            balance: 0,
            request_count: 0,
            consumers: Vec::new(),
        };

        subscription.pack(&mut subscription_info.data.borrow_mut())?;
        CoordinatorConfig::pack(config, &mut config_info.data.borrow_mut())?;
        set_return_data(&subscription_id.to_le_bytes());

        msg!(
            "SubscriptionCreated: id={}, owner={}",
            subscription_id,
            owner_info.key
        );
        Ok(())
    }

    fn process_fund_subscription(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        amount: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let funder_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !funder_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        if subscription_info.owner != program_id {
            return Err(ProgramError::IncorrectProgramId);
        }

        let mut subscription = Subscription::unpack(&subscription_info.data.borrow())?;
        if !subscription.is_initialized() {
            return Err(CoordinatorError::InvalidSubscription.into());
        }

        invoke(
            &system_instruction::transfer(funder_info.key, subscription_info.key, amount),
            &[
                funder_info.clone(),
                subscription_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        let old_balance = subscription.balance;
        subscription.balance = old_balance
            .checked_add(amount)
            .ok_or(CoordinatorError::Overflow)?;
        subscription.pack(&mut subscription_info.data.borrow_mut())?;

        msg!(
            "SubscriptionFunded: id={}, old_balance={}, new_balance={}",
            subscription.id,
            old_balance,
            subscription.balance
        );
        Ok(())
    }

    /// Loads a subscription the signer in `owner_info` is allowed to manage
    fn load_owned_subscription(
        program_id: &Pubkey,
        owner_info: &AccountInfo,
        subscription_info: &AccountInfo,
    ) -> Result<Subscription, ProgramError> {
        if !owner_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        if subscription_info.owner != program_id {
            return Err(ProgramError::IncorrectProgramId);
        }

        let subscription = Subscription::unpack(&subscription_info.data.borrow())?;
        if !subscription.is_initialized() {
            return Err(CoordinatorError::InvalidSubscription.into());
        }
        if subscription.owner != *owner_info.key {
            msg!("Only the subscription owner can manage consumers");
            return Err(CoordinatorError::MustBeSubOwner.into());
        }
        Ok(subscription)
    }

    fn process_add_consumer(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        consumer: Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let owner_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;

        let mut subscription =
            Self::load_owned_subscription(program_id, owner_info, subscription_info)?;

        if subscription.is_consumer(&consumer) {
            msg!("Consumer {} already registered", consumer);
            return Ok(());
        }
        if subscription.consumers.len() >= MAX_CONSUMERS {
            return Err(CoordinatorError::TooManyConsumers.into());
        }

        subscription.consumers.push(consumer);
        subscription.pack(&mut subscription_info.data.borrow_mut())?;

        msg!("ConsumerAdded: id={}, consumer={}", subscription.id, consumer);
        Ok(())
    }

    fn process_remove_consumer(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        consumer: Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let owner_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;

        let mut subscription =
            Self::load_owned_subscription(program_id, owner_info, subscription_info)?;

        if !subscription.is_consumer(&consumer) {
            return Err(CoordinatorError::InvalidConsumer.into());
        }

        subscription.consumers.retain(|registered| *registered != consumer);
        // Shrinking the vec leaves stale bytes past its end; clear them
        subscription_info.data.borrow_mut().fill(0);
        subscription.pack(&mut subscription_info.data.borrow_mut())?;

        msg!("ConsumerRemoved: id={}, consumer={}", subscription.id, consumer);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn process_request_random_words(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        key_hash: [u8; 32],
        subscription_id: u64,
        minimum_confirmations: u16,
        callback_gas_limit: u32,
        num_words: u32,
        callback_tag: u8,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let consumer_identity_info = next_account_info(account_info_iter)?;
        let consumer_program_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;
        let request_info = next_account_info(account_info_iter)?;
        let requester_info = next_account_info(account_info_iter)?;

        // Only the consumer program itself can produce this signature
        let (expected_identity, _) = find_consumer_identity_address(consumer_program_info.key);
        if !consumer_identity_info.is_signer || *consumer_identity_info.key != expected_identity {
            msg!(
                "Request must be signed by the consumer identity of {}",
                consumer_program_info.key
            );
            return Err(CoordinatorError::InvalidConsumer.into());
        }

        if !requester_info.is_signer {
            msg!("Requester must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        if config_info.owner != program_id
            || subscription_info.owner != program_id
            || request_info.owner != program_id
        {
            return Err(ProgramError::IncorrectProgramId);
        }

        let mut config = CoordinatorConfig::unpack(&config_info.data.borrow())?;

        let mut subscription = Subscription::unpack(&subscription_info.data.borrow())?;
        if !subscription.is_initialized()
            || subscription.id != subscription_id
            || subscription.coordinator != *config_info.key
        {
            msg!("Subscription {} does not exist", subscription_id);
            return Err(CoordinatorError::InvalidSubscription.into());
        }

        if !subscription.is_consumer(consumer_program_info.key) {
            msg!(
                "Program {} is not a consumer of subscription {}",
                consumer_program_info.key,
                subscription_id
            );
            return Err(CoordinatorError::InvalidConsumer.into());
        }

        if minimum_confirmations > MAX_REQUEST_CONFIRMATIONS
            || callback_gas_limit > MAX_CALLBACK_GAS_LIMIT
            || num_words == 0
        {
            return Err(CoordinatorError::InvalidRequestConfig.into());
        }
        if num_words > MAX_NUM_WORDS {
            return Err(CoordinatorError::NumWordsTooBig.into());
        }

        if request_info.data_len() != RandomnessRequest::LEN {
            msg!("Request account needs {} bytes", RandomnessRequest::LEN);
            return Err(ProgramError::InvalidAccountData);
        }
        let existing = RandomnessRequest::unpack_unchecked(&request_info.data.borrow())?;
        if existing.is_initialized() {
            return Err(CoordinatorError::RequestAccountInUse.into());
        }

        let request_id = config.next_request_id;
        config.next_request_id = request_id
            .checked_add(1)
            .ok_or(CoordinatorError::Overflow)?;
        subscription.request_count = subscription
            .request_count
            .checked_add(1)
            .ok_or(CoordinatorError::Overflow)?;

        let request = RandomnessRequest {
            is_initialized: true,
            request_id,
            subscription_id,
            consumer_program: *consumer_program_info.key,
            requester: *requester_info.key,
            key_hash,
            minimum_confirmations,
            callback_gas_limit,
            num_words,
            callback_tag,
            request_slot: Clock::get()?.slot,
        };

        RandomnessRequest::pack(request, &mut request_info.data.borrow_mut())?;
        subscription.pack(&mut subscription_info.data.borrow_mut())?;
        CoordinatorConfig::pack(config, &mut config_info.data.borrow_mut())?;
        set_return_data(&request_id.to_le_bytes());

        msg!(
            "RandomWordsRequested: request_id={}, subscription_id={}, consumer={}, num_words={}",
            request_id,
            subscription_id,
            consumer_program_info.key,
            num_words
        );
        Ok(())
    }

    fn process_fulfill_random_words(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        request_id: u64,
        override_words: Option<Vec<u64>>,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let fulfiller_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let request_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;
        let authority_info = next_account_info(account_info_iter)?;
        let consumer_program_info = next_account_info(account_info_iter)?;
        let callback_infos: Vec<AccountInfo> = account_info_iter.cloned().collect();

        if !fulfiller_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        if config_info.owner != program_id || subscription_info.owner != program_id {
            return Err(ProgramError::IncorrectProgramId);
        }

        if request_info.owner != program_id || request_info.data_len() != RandomnessRequest::LEN {
            msg!("Request {} does not exist", request_id);
            return Err(CoordinatorError::NonexistentRequest.into());
        }
        let request = RandomnessRequest::unpack_unchecked(&request_info.data.borrow())?;
        if !request.is_initialized() || request.request_id != request_id {
            msg!("Request {} does not exist", request_id);
            return Err(CoordinatorError::NonexistentRequest.into());
        }

        let mut config = CoordinatorConfig::unpack(&config_info.data.borrow())?;
        if *fulfiller_info.key != config.admin {
            msg!("Fulfiller {} is not the coordinator admin", fulfiller_info.key);
            return Err(CoordinatorError::UnauthorizedFulfiller.into());
        }

        let mut subscription = Subscription::unpack(&subscription_info.data.borrow())?;
        if !subscription.is_initialized()
            || subscription.id != request.subscription_id
            || subscription.coordinator != *config_info.key
        {
            return Err(CoordinatorError::InvalidSubscription.into());
        }

        let (authority, bump_seed) = find_authority_address(program_id);
        if *authority_info.key != authority {
            msg!("Invalid coordinator authority account");
            return Err(ProgramError::InvalidSeeds);
        }

        if *consumer_program_info.key != request.consumer_program {
            msg!("Consumer program does not match the request");
            return Err(CoordinatorError::InvalidConsumer.into());
        }

        let random_words = match override_words {
            Some(words) => {
                if words.len() != request.num_words as usize {
                    msg!(
                        "Expected {} random words, got {}",
                        request.num_words,
                        words.len()
                    );
                    return Err(CoordinatorError::InvalidRandomWords.into());
                }
                words
            }
            None => derive_random_words(request_id, request.request_slot, request.num_words),
        };

        let payment = config
            .request_payment(request.num_words)
            .ok_or(CoordinatorError::Overflow)?;
        if subscription.balance < payment {
            msg!(
                "Subscription {} balance {} cannot cover payment {}",
                subscription.id,
                subscription.balance,
                payment
            );
            return Err(CoordinatorError::InsufficientBalance.into());
        }

        // Deliver the words; a failing callback aborts the whole fulfilment
        let mut callback_metas = vec![AccountMeta::new_readonly(authority, true)];
        callback_metas.extend(callback_infos.iter().map(|info| AccountMeta {
            pubkey: *info.key,
            is_signer: info.is_signer,
            is_writable: info.is_writable,
        }));
        let callback = Instruction {
            program_id: request.consumer_program,
            accounts: callback_metas,
            data: callback_data(request.callback_tag, request_id, &random_words)?,
        };

        let mut invoke_infos = vec![authority_info.clone(), consumer_program_info.clone()];
        invoke_infos.extend(callback_infos);
        invoke_signed(&callback, &invoke_infos, &[&[AUTHORITY_SEED, &[bump_seed]]])?;

        // Charge the subscription
        subscription.balance -= payment;
        config.fees_collected = config
            .fees_collected
            .checked_add(payment)
            .ok_or(CoordinatorError::Overflow)?;
        let subscription_lamports = subscription_info
            .lamports()
            .checked_sub(payment)
            .ok_or(CoordinatorError::InsufficientBalance)?;
        let config_lamports = config_info
            .lamports()
            .checked_add(payment)
            .ok_or(CoordinatorError::Overflow)?;
        **subscription_info.try_borrow_mut_lamports()? = subscription_lamports;
        **config_info.try_borrow_mut_lamports()? = config_lamports;

        subscription.pack(&mut subscription_info.data.borrow_mut())?;
        CoordinatorConfig::pack(config, &mut config_info.data.borrow_mut())?;

        // Close the request, its rent goes to the fulfiller
        let refund = request_info.lamports();
        let fulfiller_lamports = fulfiller_info
            .lamports()
            .checked_add(refund)
            .ok_or(CoordinatorError::Overflow)?;
        **request_info.try_borrow_mut_lamports()? = 0;
        **fulfiller_info.try_borrow_mut_lamports()? = fulfiller_lamports;
        request_info.try_borrow_mut_data()?.fill(0);

        msg!(
            "RandomWordsFulfilled: request_id={}, payment={}",
            request_id,
            payment
        );
        Ok(())
    }
}
