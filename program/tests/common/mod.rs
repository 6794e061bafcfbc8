#![allow(dead_code)]

use raffle::{
    client,
    deploy::{self, DeployConfig},
    events::RaffleEvent,
    process_instruction,
    state::Raffle,
};
use solana_program::{
    instruction::Instruction, native_token::LAMPORTS_PER_SOL, program_pack::Pack,
};
use solana_program_test::*;
use solana_sdk::{
    clock::Clock,
    instruction::InstructionError,
    pubkey::Pubkey,
    rent::Rent,
    signature::{Keypair, Signer},
    system_instruction,
    transaction::{Transaction, TransactionError},
};
use tokio::sync::{mpsc, oneshot};
use vrf_coordinator::state::RandomnessRequest;

pub struct Harness {
    pub context: ProgramTestContext,
    pub rent: Rent,
    pub raffle_program: Pubkey,
    pub coordinator_program: Pubkey,
    pub coordinator_config: Pubkey,
    pub subscription: Pubkey,
    pub subscription_id: u64,
    pub raffle_account: Pubkey,
    pub deploy_config: DeployConfig,
}

/// Deploys the coordinator, a funded subscription and a raffle consuming it
pub async fn setup(deploy_config: DeployConfig) -> Harness {
    let raffle_program = Pubkey::new_unique();
    let coordinator_program = Pubkey::new_unique();

    let mut program_test = ProgramTest::new(
        "raffle",
        raffle_program,
        processor!(process_instruction),
    );
    program_test.add_program(
        "vrf_coordinator",
        coordinator_program,
        processor!(vrf_coordinator::process_instruction),
    );

    let mut context = program_test.start_with_context().await;
    let rent = context.banks_client.get_rent().await.unwrap();
    let payer = context.payer.pubkey();

    let config_keypair = Keypair::new();
    let ixs = deploy::deploy_coordinator(
        &payer,
        &coordinator_program,
        &config_keypair.pubkey(),
        &rent,
        &deploy_config,
    )
    .unwrap();
    process(&mut context, &ixs, &[&config_keypair]).await.unwrap();

    let subscription_keypair = Keypair::new();
    let ixs = deploy::create_subscription(
        &payer,
        &coordinator_program,
        &config_keypair.pubkey(),
        &subscription_keypair.pubkey(),
        &rent,
    )
    .unwrap();
    process(&mut context, &ixs, &[&subscription_keypair])
        .await
        .unwrap();

    let subscription_account = context
        .banks_client
        .get_account(subscription_keypair.pubkey())
        .await
        .unwrap()
        .unwrap();
    let subscription_id = deploy::subscription_id(&subscription_account.data).unwrap();

    let ixs = deploy::fund_and_register(
        &payer,
        &coordinator_program,
        &subscription_keypair.pubkey(),
        &raffle_program,
        deploy_config.subscription_fund_amount,
    )
    .unwrap();
    process(&mut context, &ixs, &[]).await.unwrap();

    let mut harness = Harness {
        context,
        rent,
        raffle_program,
        coordinator_program,
        coordinator_config: config_keypair.pubkey(),
        subscription: subscription_keypair.pubkey(),
        subscription_id,
        raffle_account: Pubkey::default(),
        deploy_config,
    };
    harness.raffle_account = harness.deploy_raffle().await;
    harness
}

/// Sends `ixs` paid by the context payer, with `signers` signing alongside
pub async fn process(
    context: &mut ProgramTestContext,
    ixs: &[Instruction],
    signers: &[&Keypair],
) -> Result<(), TransactionError> {
    process_with_logs(context, ixs, signers).await.0
}

/// Like [`process`], also returning the transaction's log messages
pub async fn process_with_logs(
    context: &mut ProgramTestContext,
    ixs: &[Instruction],
    signers: &[&Keypair],
) -> (Result<(), TransactionError>, Vec<String>) {
    let blockhash = context
        .banks_client
        .get_new_latest_blockhash(&context.last_blockhash)
        .await
        .unwrap();
    context.last_blockhash = blockhash;

    let mut all_signers: Vec<&Keypair> = vec![&context.payer];
    all_signers.extend_from_slice(signers);
    let mut transaction = Transaction::new_with_payer(ixs, Some(&context.payer.pubkey()));
    transaction.sign(&all_signers, blockhash);

    // Simulation runs against the same bank state, so its logs are the ones
    // the processed transaction emits
    let simulation = context
        .banks_client
        .simulate_transaction(transaction.clone())
        .await
        .unwrap();
    let logs = simulation
        .simulation_details
        .map(|details| details.logs)
        .unwrap_or_default();

    let result = context
        .banks_client
        .process_transaction(transaction)
        .await
        .map_err(|err| err.unwrap());
    (result, logs)
}

/// Asserts that `result` failed with custom program error `code`
pub fn assert_custom_error(result: Result<(), TransactionError>, code: u32) {
    match result {
        Err(TransactionError::InstructionError(_, InstructionError::Custom(actual))) => {
            assert_eq!(actual, code, "unexpected custom error")
        }
        other => panic!("expected custom error {}, got {:?}", code, other),
    }
}

/// Resolves with the first winner announced in the log lines fed to the sender
pub fn winner_listener() -> (mpsc::UnboundedSender<String>, oneshot::Receiver<Pubkey>) {
    let (log_sender, mut log_receiver) = mpsc::unbounded_channel::<String>();
    let (winner_sender, winner_receiver) = oneshot::channel();

    tokio::spawn(async move {
        while let Some(line) = log_receiver.recv().await {
            if let Some(RaffleEvent::WinnerPicked { winner }) = RaffleEvent::from_log(&line) {
                let _ = winner_sender.send(winner);
                return;
            }
        }
    });

    (log_sender, winner_receiver)
}

impl Harness {
    pub async fn process(
        &mut self,
        ixs: &[Instruction],
        signers: &[&Keypair],
    ) -> Result<(), TransactionError> {
        process(&mut self.context, ixs, signers).await
    }

    pub async fn process_with_logs(
        &mut self,
        ixs: &[Instruction],
        signers: &[&Keypair],
    ) -> (Result<(), TransactionError>, Vec<String>) {
        process_with_logs(&mut self.context, ixs, signers).await
    }

    pub fn payer(&self) -> Pubkey {
        self.context.payer.pubkey()
    }

    /// Deploys another raffle on the same subscription
    pub async fn deploy_raffle(&mut self) -> Pubkey {
        let raffle_keypair = Keypair::new();
        let ixs = deploy::deploy_raffle(
            &self.payer(),
            &self.raffle_program,
            &raffle_keypair.pubkey(),
            &self.coordinator_program,
            &self.coordinator_config,
            &self.subscription,
            self.subscription_id,
            &self.rent,
            &self.deploy_config,
        )
        .unwrap();
        self.process(&ixs, &[&raffle_keypair]).await.unwrap();
        raffle_keypair.pubkey()
    }

    pub async fn lamports(&mut self, account: Pubkey) -> u64 {
        self.context
            .banks_client
            .get_balance(account)
            .await
            .unwrap()
    }

    pub async fn fetch_raffle_at(&mut self, raffle_account: Pubkey) -> Raffle {
        let account = self
            .context
            .banks_client
            .get_account(raffle_account)
            .await
            .unwrap()
            .unwrap();
        Raffle::unpack(&account.data).unwrap()
    }

    pub async fn fetch_raffle(&mut self) -> Raffle {
        let raffle_account = self.raffle_account;
        self.fetch_raffle_at(raffle_account).await
    }

    /// Lamports the raffle holds above its rent-exempt minimum
    pub async fn held_balance(&mut self, raffle_account: Pubkey) -> u64 {
        let lamports = self.lamports(raffle_account).await;
        lamports - self.rent.minimum_balance(Raffle::LEN)
    }

    /// A fresh system account holding one SOL
    pub async fn new_player(&mut self) -> Keypair {
        let player = Keypair::new();
        let ix = system_instruction::transfer(&self.payer(), &player.pubkey(), LAMPORTS_PER_SOL);
        self.process(&[ix], &[]).await.unwrap();
        player
    }

    pub async fn enter(
        &mut self,
        raffle_account: Pubkey,
        player: &Keypair,
        payment: u64,
    ) -> Result<(), TransactionError> {
        let ix = raffle::instruction::enter(
            &self.raffle_program,
            &player.pubkey(),
            &raffle_account,
            payment,
        )
        .unwrap();
        self.process(&[ix], &[player]).await
    }

    /// Moves the cluster clock forward
    pub async fn warp_seconds(&mut self, seconds: i64) {
        let mut clock = self
            .context
            .banks_client
            .get_sysvar::<Clock>()
            .await
            .unwrap();
        clock.unix_timestamp += seconds;
        self.context.set_sysvar(&clock);
    }

    /// Runs `CheckUpkeep` and returns the logged decision line
    pub async fn check_upkeep(&mut self, raffle_account: Pubkey) -> String {
        let ix = raffle::instruction::check_upkeep(&self.raffle_program, &raffle_account).unwrap();
        let (result, logs) = self.process_with_logs(&[ix], &[]).await;
        result.unwrap();
        logs.into_iter()
            .find(|line| line.contains("Upkeep check:"))
            .unwrap()
    }

    /// Closes the round, returning the request account and the logs
    pub async fn perform_upkeep(
        &mut self,
        raffle_account: Pubkey,
    ) -> (Pubkey, Result<(), TransactionError>, Vec<String>) {
        let raffle = self.fetch_raffle_at(raffle_account).await;
        let request_keypair = Keypair::new();
        let ixs = client::upkeep_instructions(
            &self.raffle_program,
            &self.payer(),
            &raffle_account,
            &raffle,
            &request_keypair.pubkey(),
            &self.rent,
        )
        .unwrap();
        let (result, logs) = self.process_with_logs(&ixs, &[&request_keypair]).await;
        (request_keypair.pubkey(), result, logs)
    }

    pub async fn fetch_request(&mut self, request_account: Pubkey) -> RandomnessRequest {
        let account = self
            .context
            .banks_client
            .get_account(request_account)
            .await
            .unwrap()
            .unwrap();
        RandomnessRequest::unpack(&account.data).unwrap()
    }

    /// Fulfils the raffle's pending request through the coordinator, signed
    /// by the coordinator admin
    pub async fn fulfill(
        &mut self,
        raffle_account: Pubkey,
        request_account: Pubkey,
        override_words: Option<Vec<u64>>,
    ) -> (Result<(), TransactionError>, Vec<String>) {
        let raffle = self.fetch_raffle_at(raffle_account).await;
        let request = self.fetch_request(request_account).await;
        let ixs = client::fulfill_instructions(
            &self.raffle_program,
            &self.payer(),
            &raffle_account,
            &raffle,
            &request_account,
            &request,
            override_words,
        )
        .unwrap();
        self.process_with_logs(&ixs, &[]).await
    }
}
