//! Majority arithmetic and the Prepare-phase value selection rule.

use thiserror::Error;

use crate::paxos::{Accepted, PrepareResult, ProposalNumber};

/// Why a proposer gave up on a Prepare. Retrying with a higher proposal
/// number is always allowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Abandoned {
    #[error("insufficient acceptor responses ({promised} of {acceptors} promised)")]
    InsufficientPromises { promised: usize, acceptors: usize },
    #[error("proposal number {proposal} overtaken by promise {promised}")]
    Preempted {
        proposal: ProposalNumber,
        promised: ProposalNumber,
    },
}

/// Strict majority of `total`. Exactly half is not enough.
pub fn is_majority(count: usize, total: usize) -> bool {
    count * 2 > total
}

/// Decides whether a Prepare for `proposal` may go on to Accept, and with
/// which value.
///
/// `responses` holds replies from reachable acceptors only; `total` is the
/// size of the whole roster. If any responder has accepted something, the
/// value of the highest-numbered acceptance wins over `candidate`.
pub fn select_value<V: Clone>(
    proposal: ProposalNumber,
    candidate: V,
    responses: &[PrepareResult<V>],
    total: usize,
) -> Result<V, Abandoned> {
    let promised = responses
        .iter()
        .filter(|r| r.promised == proposal)
        .count();
    if !is_majority(promised, total) {
        return Err(Abandoned::InsufficientPromises {
            promised,
            acceptors: total,
        });
    }

    let mut latest: Option<&Accepted<V>> = None;
    for response in responses {
        if response.promised > proposal {
            return Err(Abandoned::Preempted {
                proposal,
                promised: response.promised,
            });
        }
        if let Some(accepted) = &response.accepted {
            if latest.map_or(true, |l| accepted.number > l.number) {
                latest = Some(accepted);
            }
        }
    }

    Ok(latest.map_or(candidate, |accepted| accepted.value.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn promised(n: ProposalNumber) -> PrepareResult<u64> {
        PrepareResult {
            accepted: None,
            promised: n,
        }
    }

    fn holding(n: ProposalNumber, number: ProposalNumber, value: u64) -> PrepareResult<u64> {
        PrepareResult {
            accepted: Some(Accepted { number, value }),
            promised: n,
        }
    }

    #[test]
    fn majority_is_strict() {
        assert!(!is_majority(2, 5));
        assert!(is_majority(3, 5));
        assert!(!is_majority(2, 4));
        assert!(is_majority(3, 4));
        assert!(is_majority(1, 1));
        assert!(!is_majority(0, 0));
    }

    #[test]
    fn two_of_five_abandons() {
        let responses = vec![promised(0), promised(0)];
        assert_eq!(
            select_value(0, 7, &responses, 5),
            Err(Abandoned::InsufficientPromises {
                promised: 2,
                acceptors: 5
            })
        );
    }

    #[test]
    fn fresh_roster_keeps_candidate() {
        let responses = vec![promised(3), promised(3), promised(3)];
        assert_eq!(select_value(3, 7, &responses, 5), Ok(7));
    }

    #[test]
    fn adopts_highest_accepted_value() {
        let responses = vec![holding(9, 5, 42), holding(9, 2, 11), promised(9)];
        assert_eq!(select_value(9, 100, &responses, 5), Ok(42));
    }

    #[test]
    fn newer_promise_preempts_even_with_quorum() {
        let responses = vec![promised(4), promised(4), promised(4), promised(8)];
        assert_eq!(
            select_value(4, 1, &responses, 5),
            Err(Abandoned::Preempted {
                proposal: 4,
                promised: 8
            })
        );
    }

    #[test]
    fn responses_promising_others_do_not_count() {
        let responses = vec![promised(6), promised(6), promised(11)];
        assert_eq!(
            select_value(6, 1, &responses, 3),
            Err(Abandoned::Preempted {
                proposal: 6,
                promised: 11
            })
        );
        assert_eq!(
            select_value(6, 1, &responses, 5),
            Err(Abandoned::InsufficientPromises {
                promised: 2,
                acceptors: 5
            })
        );
    }
}
