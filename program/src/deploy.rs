// Raffle Program - Deployment
//
// Instruction sequences that provision a raffle together with its
// randomness provider. On a development network the coordinator is deployed
// alongside the raffle; elsewhere an existing coordinator and subscription
// are used.
use solana_program::{
    instruction::Instruction,
    native_token::LAMPORTS_PER_SOL,
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack},
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
};
use vrf_coordinator::{
    instruction as coordinator_instruction,
    state::{CoordinatorConfig, Subscription},
};

use crate::{instruction, state::Raffle};

/// Networks the coordinator is deployed on as part of the raffle deployment
pub const DEVELOPMENT_NETWORKS: [&str; 2] = ["localnet", "program-test"];

pub fn is_development_network(name: &str) -> bool {
    DEVELOPMENT_NETWORKS.contains(&name)
}

/// Key hash of the 30 gwei Sepolia gas lane, reused as the local lane
pub const DEFAULT_GAS_LANE: [u8; 32] = [
    0x47, 0x4e, 0x34, 0xa0, 0x77, 0xdf, 0x58, 0x80, 0x7d, 0xbe, 0x9c, 0x96, 0xd3, 0xc0, 0x09, 0xb2,
    0x3b, 0x3c, 0x6d, 0x0c, 0xce, 0x43, 0x3e, 0x59, 0xbb, 0xf5, 0xb3, 0x4f, 0x82, 0x3b, 0xc5, 0x6c,
];

/// Parameters of a raffle deployment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployConfig {
    /// Raffle entrance fee, in lamports
    pub entrance_fee: u64,
    /// Round length, in seconds
    pub interval: i64,
    pub gas_lane: [u8; 32],
    pub callback_gas_limit: u32,
    /// Lamports the new subscription is funded with
    pub subscription_fund_amount: u64,
    /// Coordinator premium per request
    pub base_fee: u64,
    /// Coordinator charge per random word
    pub fee_per_word: u64,
}

impl DeployConfig {
    /// Settings used on development networks
    pub fn local() -> Self {
        Self {
            entrance_fee: LAMPORTS_PER_SOL / 100,
            interval: 30,
            gas_lane: DEFAULT_GAS_LANE,
            callback_gas_limit: 500_000,
            subscription_fund_amount: 2 * LAMPORTS_PER_SOL,
            base_fee: LAMPORTS_PER_SOL / 4,
            fee_per_word: 1_000,
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self::local()
    }
}

/// Allocate and initialize the coordinator config account
pub fn deploy_coordinator(
    payer: &Pubkey,
    coordinator_program: &Pubkey,
    config_account: &Pubkey,
    rent: &Rent,
    deploy_config: &DeployConfig,
) -> Result<Vec<Instruction>, ProgramError> {
    Ok(vec![
        system_instruction::create_account(
            payer,
            config_account,
            rent.minimum_balance(CoordinatorConfig::LEN),
            CoordinatorConfig::LEN as u64,
            coordinator_program,
        ),
        coordinator_instruction::initialize(
            coordinator_program,
            payer,
            config_account,
            deploy_config.base_fee,
            deploy_config.fee_per_word,
        )?,
    ])
}

/// Allocate a subscription account and register it with the coordinator.
/// The assigned id is read back with [`subscription_id`].
pub fn create_subscription(
    owner: &Pubkey,
    coordinator_program: &Pubkey,
    config_account: &Pubkey,
    subscription_account: &Pubkey,
    rent: &Rent,
) -> Result<Vec<Instruction>, ProgramError> {
    Ok(vec![
        system_instruction::create_account(
            owner,
            subscription_account,
            rent.minimum_balance(Subscription::LEN),
            Subscription::LEN as u64,
            coordinator_program,
        ),
        coordinator_instruction::create_subscription(
            coordinator_program,
            owner,
            config_account,
            subscription_account,
        )?,
    ])
}

/// Id the coordinator assigned to a created subscription
pub fn subscription_id(subscription_data: &[u8]) -> Result<u64, ProgramError> {
    let subscription = Subscription::unpack(subscription_data)?;
    if !subscription.is_initialized() {
        return Err(ProgramError::UninitializedAccount);
    }
    Ok(subscription.id)
}

/// Fund the subscription and allow the raffle program to consume it
pub fn fund_and_register(
    owner: &Pubkey,
    coordinator_program: &Pubkey,
    subscription_account: &Pubkey,
    raffle_program: &Pubkey,
    amount: u64,
) -> Result<Vec<Instruction>, ProgramError> {
    Ok(vec![
        coordinator_instruction::fund_subscription(
            coordinator_program,
            owner,
            subscription_account,
            amount,
        )?,
        coordinator_instruction::add_consumer(
            coordinator_program,
            owner,
            subscription_account,
            raffle_program,
        )?,
    ])
}

/// Allocate and initialize the raffle account
#[allow(clippy::too_many_arguments)]
pub fn deploy_raffle(
    authority: &Pubkey,
    raffle_program: &Pubkey,
    raffle_account: &Pubkey,
    coordinator_program: &Pubkey,
    config_account: &Pubkey,
    subscription_account: &Pubkey,
    subscription_id: u64,
    rent: &Rent,
    deploy_config: &DeployConfig,
) -> Result<Vec<Instruction>, ProgramError> {
    Ok(vec![
        system_instruction::create_account(
            authority,
            raffle_account,
            rent.minimum_balance(Raffle::LEN),
            Raffle::LEN as u64,
            raffle_program,
        ),
        instruction::initialize(
            raffle_program,
            authority,
            raffle_account,
            coordinator_program,
            config_account,
            subscription_account,
            deploy_config.entrance_fee,
            deploy_config.interval,
            deploy_config.gas_lane,
            subscription_id,
            deploy_config.callback_gas_limit,
        )?,
    ])
}
