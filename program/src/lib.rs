// Raffle Program
// Players enter a round by paying the entrance fee. Once the round interval
// has elapsed a keeper closes it and requests randomness from the VRF
// coordinator, whose callback picks the winner and pays out the pot.

pub mod client;
pub mod deploy;
pub mod error;
pub mod events;
pub mod instruction;
pub mod processor;
pub mod state;

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
