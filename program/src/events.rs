// Raffle Program - Events
//
// Events are single log lines of the form `raffle-event <Kind> <value>` so
// that clients can pick them out of transaction logs.
use solana_program::{msg, pubkey::Pubkey};
use std::str::FromStr;

pub const EVENT_PREFIX: &str = "raffle-event";
const PROGRAM_LOG_PREFIX: &str = "Program log: ";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleEvent {
    RaffleEnter { player: Pubkey },
    RequestedRaffleWinner { request_id: u64 },
    WinnerPicked { winner: Pubkey },
}

impl RaffleEvent {
    pub fn emit(&self) {
        msg!("{}", self.to_log());
    }

    pub fn to_log(&self) -> String {
        match self {
            Self::RaffleEnter { player } => format!("{} RaffleEnter {}", EVENT_PREFIX, player),
            Self::RequestedRaffleWinner { request_id } => {
                format!("{} RequestedRaffleWinner {}", EVENT_PREFIX, request_id)
            }
            Self::WinnerPicked { winner } => format!("{} WinnerPicked {}", EVENT_PREFIX, winner),
        }
    }

    /// Parses a log line, with or without the runtime's `Program log: ` prefix
    pub fn from_log(line: &str) -> Option<Self> {
        let line = line.strip_prefix(PROGRAM_LOG_PREFIX).unwrap_or(line);
        let mut parts = line.split_whitespace();
        if parts.next()? != EVENT_PREFIX {
            return None;
        }
        let kind = parts.next()?;
        let value = parts.next()?;
        if parts.next().is_some() {
            return None;
        }

        match kind {
            "RaffleEnter" => Some(Self::RaffleEnter {
                player: Pubkey::from_str(value).ok()?,
            }),
            "RequestedRaffleWinner" => Some(Self::RequestedRaffleWinner {
                request_id: value.parse().ok()?,
            }),
            "WinnerPicked" => Some(Self::WinnerPicked {
                winner: Pubkey::from_str(value).ok()?,
            }),
            _ => None,
        }
    }

    /// All events found in a transaction's log messages, in order
    pub fn collect<S: AsRef<str>>(logs: &[S]) -> Vec<Self> {
        logs.iter()
            .filter_map(|line| Self::from_log(line.as_ref()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_runtime_log_lines() {
        let player = Pubkey::new_unique();
        let line = format!("Program log: raffle-event RaffleEnter {}", player);
        assert_eq!(
            RaffleEvent::from_log(&line),
            Some(RaffleEvent::RaffleEnter { player })
        );
        assert_eq!(
            RaffleEvent::from_log("raffle-event RequestedRaffleWinner 3"),
            Some(RaffleEvent::RequestedRaffleWinner { request_id: 3 })
        );
    }

    #[test]
    fn ignores_other_lines() {
        assert_eq!(RaffleEvent::from_log("Program log: Instruction: Enter"), None);
        assert_eq!(RaffleEvent::from_log("raffle-event WinnerPicked nope"), None);
        assert_eq!(RaffleEvent::from_log("raffle-event Unknown 1"), None);
        assert_eq!(RaffleEvent::from_log("raffle-event RequestedRaffleWinner 1 2"), None);
    }

    #[test]
    fn collect_keeps_order() {
        let winner = Pubkey::new_unique();
        let logs = vec![
            "Program log: Instruction: Fulfill Random Words".to_string(),
            RaffleEvent::RequestedRaffleWinner { request_id: 1 }.to_log(),
            RaffleEvent::WinnerPicked { winner }.to_log(),
        ];
        assert_eq!(
            RaffleEvent::collect(&logs),
            vec![
                RaffleEvent::RequestedRaffleWinner { request_id: 1 },
                RaffleEvent::WinnerPicked { winner },
            ]
        );
    }
}
