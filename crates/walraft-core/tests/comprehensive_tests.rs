//! # comprehensive raft tests
//!
//! why: verify all raft consensus scenarios work correctly
//! relations: tests walraft-core
//! what: election, vote handling, replication, log matching, commit, apply, driver scenarios

use serde_json::json;
use walraft_core::{Command, LogEntry, NodeState, RaftConfig, RaftError, RaftMessage, RaftNode};

fn cmd(key: &str, value: &str) -> Command {
    Command::new().with(key, value)
}

/// make `node` leader of a fresh term with the vote of `voter`
fn elect(node: &mut RaftNode, voter: u64) {
    node.start_election().unwrap();
    let term = node.current_term;
    assert!(node.handle_vote_response(term, true, voter).unwrap());
}

// =============================================================================
// SECTION 1: INITIALIZATION TESTS
// =============================================================================

mod initialization {
    use super::*;

    #[test]
    fn new_node_starts_as_follower() {
        let node = RaftNode::new(1, vec![1, 2, 3]);
        assert_eq!(node.state, NodeState::Follower);
        assert_eq!(node.current_term, 0);
        assert_eq!(node.voted_for, None);
        assert!(node.log.is_empty());
        assert_eq!(node.commit_index, 0);
        assert_eq!(node.last_applied, 0);
        assert!(node.state_machine.is_empty());
    }

    #[test]
    fn node_knows_cluster_membership() {
        let node = RaftNode::new(1, vec![1, 2, 3]);
        assert_eq!(node.cluster_nodes, vec![1, 2, 3]);
        assert_eq!(node.peers().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn custom_config_is_applied() {
        let config = RaftConfig {
            election_timeout_min: 200,
            election_timeout_max: 400,
            heartbeat_interval: 100,
            ..RaftConfig::default()
        };
        let node = RaftNode::with_config(1, vec![1, 2, 3], config).unwrap();
        assert_eq!(node.config.election_timeout_min, 200);
        assert_eq!(node.config.election_timeout_max, 400);
        assert_eq!(node.config.heartbeat_interval, 100);
    }

    #[test]
    fn default_config_values() {
        let config = RaftConfig::default();
        assert_eq!(config.election_timeout_min, 150);
        assert_eq!(config.election_timeout_max, 300);
        assert_eq!(config.heartbeat_interval, 50);
        assert_eq!(config.rng_seed, None);
    }
}

// =============================================================================
// SECTION 2: QUORUM CALCULATION TESTS
// =============================================================================

mod quorum {
    use super::*;

    #[test]
    fn quorum_sizes() {
        assert_eq!(RaftNode::new(1, vec![1]).quorum_size(), 1);
        assert_eq!(RaftNode::new(1, vec![1, 2]).quorum_size(), 2);
        assert_eq!(RaftNode::new(1, vec![1, 2, 3]).quorum_size(), 2);
        assert_eq!(RaftNode::new(1, vec![1, 2, 3, 4]).quorum_size(), 3);
        assert_eq!(RaftNode::new(1, vec![1, 2, 3, 4, 5]).quorum_size(), 3);
    }

    #[test]
    fn has_quorum_with_majority() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.votes_received = vec![1, 2];
        assert!(node.has_quorum());
    }

    #[test]
    fn no_quorum_with_minority() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.votes_received = vec![1];
        assert!(!node.has_quorum());
    }
}

// =============================================================================
// SECTION 3: ELECTION TESTS
// =============================================================================

mod election {
    use super::*;

    #[test]
    fn start_election_becomes_candidate() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);

        node.start_election().unwrap();

        assert_eq!(node.state, NodeState::Candidate);
        assert_eq!(node.current_term, 1);
        assert_eq!(node.voted_for, Some(1));
        assert_eq!(node.votes_received, vec![1]);
    }

    #[test]
    fn start_election_returns_vote_request_with_log_info() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.log.push(LogEntry::new(1, 1, cmd("a", "1")));
        node.log.push(LogEntry::new(2, 2, cmd("b", "2")));
        node.current_term = 2;

        let request = node.start_election().unwrap();

        assert_eq!(
            request,
            RaftMessage::VoteRequest {
                term: 3,
                candidate_id: 1,
                last_log_index: 2,
                last_log_term: 2,
            }
        );
    }

    #[test]
    fn majority_vote_wins_election() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.start_election().unwrap();

        let became_leader = node.handle_vote_response(1, true, 2).unwrap();

        assert!(became_leader);
        assert_eq!(node.state, NodeState::Leader);
        assert_eq!(node.leader_id, Some(1));
    }

    #[test]
    fn single_vote_not_enough_in_five_node_cluster() {
        let mut node = RaftNode::new(1, vec![1, 2, 3, 4, 5]);
        node.start_election().unwrap();

        assert!(!node.handle_vote_response(1, true, 2).unwrap());
        assert_eq!(node.state, NodeState::Candidate);
    }

    #[test]
    fn rejected_votes_dont_count() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.start_election().unwrap();

        assert!(!node.handle_vote_response(1, false, 2).unwrap());
        assert_eq!(node.votes_received.len(), 1);
    }

    #[test]
    fn losing_majority_reverts_to_follower() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.start_election().unwrap();

        node.handle_vote_response(1, false, 2).unwrap();
        assert_eq!(node.state, NodeState::Candidate);
        node.handle_vote_response(1, false, 3).unwrap();

        assert_eq!(node.state, NodeState::Follower);
        assert_eq!(node.current_term, 1);
        // the vote already cast in term 1 stands
        assert_eq!(node.voted_for, Some(1));
        assert!(!node.request_vote(1, 2, 0, 0).unwrap());
    }

    #[test]
    fn stale_vote_response_ignored() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.start_election().unwrap(); // term 1
        node.start_election().unwrap(); // term 2

        assert!(!node.handle_vote_response(1, true, 2).unwrap());
        assert_eq!(node.state, NodeState::Candidate);
    }

    #[test]
    fn vote_response_with_higher_term_steps_down() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.start_election().unwrap();

        node.handle_vote_response(5, false, 2).unwrap();

        assert_eq!(node.state, NodeState::Follower);
        assert_eq!(node.current_term, 5);
        assert_eq!(node.voted_for, None);
    }

    #[test]
    fn only_candidate_processes_vote_responses() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);

        assert!(!node.handle_vote_response(0, true, 2).unwrap());
        assert_eq!(node.state, NodeState::Follower);
    }

    #[test]
    fn single_node_wins_election_immediately() {
        let mut node = RaftNode::new(1, vec![1]);
        node.start_election().unwrap();
        assert!(node.is_leader());
    }
}

// =============================================================================
// SECTION 4: VOTE REQUEST HANDLING TESTS
// =============================================================================

mod vote_requests {
    use super::*;

    fn granted(response: &RaftMessage) -> bool {
        match response {
            RaftMessage::VoteResponse { vote_granted, .. } => *vote_granted,
            other => panic!("expected VoteResponse, got {other:?}"),
        }
    }

    #[test]
    fn grant_vote_to_valid_candidate() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);

        let (response, should_reset) = node.handle_vote_request(1, 2, 0, 0).unwrap();

        assert_eq!(response, RaftMessage::VoteResponse { term: 1, vote_granted: true });
        assert!(should_reset);
        assert_eq!(node.voted_for, Some(2));
    }

    #[test]
    fn reject_vote_for_lower_term() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.current_term = 5;

        let (response, should_reset) = node.handle_vote_request(3, 2, 0, 0).unwrap();

        assert_eq!(response, RaftMessage::VoteResponse { term: 5, vote_granted: false });
        assert!(!should_reset);
    }

    #[test]
    fn higher_term_request_demotes_leader() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        elect(&mut node, 2);

        node.handle_vote_request(5, 3, 0, 0).unwrap();

        assert_eq!(node.current_term, 5);
        assert_eq!(node.state, NodeState::Follower);
    }

    #[test]
    fn at_most_one_vote_per_term() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.handle_vote_request(1, 2, 0, 0).unwrap();

        let (response, _) = node.handle_vote_request(1, 3, 0, 0).unwrap();

        assert!(!granted(&response));
        assert_eq!(node.voted_for, Some(2));
    }

    #[test]
    fn can_revote_for_same_candidate() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.handle_vote_request(1, 2, 0, 0).unwrap();

        let (response, _) = node.handle_vote_request(1, 2, 0, 0).unwrap();

        assert!(granted(&response));
    }

    #[test]
    fn direct_request_vote_matches_message_form() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        assert!(node.request_vote(1, 2, 0, 0).unwrap());
        assert!(!node.request_vote(1, 3, 0, 0).unwrap());
        assert!(node.request_vote(2, 3, 0, 0).unwrap());
    }

    #[test]
    fn candidate_refuses_rivals_in_its_term() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.start_election().unwrap();

        let (response, _) = node.handle_vote_request(1, 2, 0, 0).unwrap();

        assert!(!granted(&response));
    }

    #[test]
    fn reject_candidate_with_stale_log_term() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.log.push(LogEntry::new(5, 1, cmd("a", "1")));
        node.current_term = 5;

        let (response, _) = node.handle_vote_request(5, 2, 1, 3).unwrap();

        assert!(!granted(&response), "should reject candidate with stale log");
    }

    #[test]
    fn reject_candidate_with_shorter_log_same_term() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.log.push(LogEntry::new(1, 1, cmd("a", "1")));
        node.log.push(LogEntry::new(1, 2, cmd("b", "2")));
        node.current_term = 1;

        let (response, _) = node.handle_vote_request(1, 2, 1, 1).unwrap();

        assert!(!granted(&response), "should reject candidate with shorter log");
    }

    #[test]
    fn grant_vote_to_candidate_with_higher_term_log() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.log.push(LogEntry::new(1, 1, cmd("a", "1")));
        node.current_term = 2;

        let (response, _) = node.handle_vote_request(2, 2, 1, 5).unwrap();

        assert!(granted(&response));
    }

    #[test]
    fn term_never_decreases() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.current_term = 10;

        node.handle_vote_request(5, 2, 0, 0).unwrap();

        assert_eq!(node.current_term, 10);
    }

    #[test]
    fn voted_for_resets_on_term_change() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.handle_vote_request(1, 2, 0, 0).unwrap();

        node.handle_vote_request(2, 3, 0, 0).unwrap();

        assert_eq!(node.voted_for, Some(3));
    }

    #[test]
    fn same_term_step_down_keeps_vote() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.handle_vote_request(1, 2, 0, 0).unwrap();

        node.become_follower(1).unwrap();

        assert_eq!(node.voted_for, Some(2));
    }
}

// =============================================================================
// SECTION 5: LEADER ELECTION STATE MANAGEMENT
// =============================================================================

mod leader_state {
    use super::*;

    #[test]
    fn become_leader_clears_votes() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        elect(&mut node, 2);
        assert!(node.votes_received.is_empty());
    }

    #[test]
    fn become_leader_initializes_next_and_match_index() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.log.push(LogEntry::new(1, 1, cmd("a", "1")));
        node.current_term = 1;
        elect(&mut node, 2);

        assert_eq!(node.next_index.get(&2), Some(&2));
        assert_eq!(node.next_index.get(&3), Some(&2));
        assert_eq!(node.match_index.get(&2), Some(&0));
        assert_eq!(node.match_index.get(&3), Some(&0));
    }

    #[test]
    fn become_follower_clears_election_state() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.start_election().unwrap();
        node.votes_received.push(2);

        node.become_follower(5).unwrap();

        assert_eq!(node.state, NodeState::Follower);
        assert_eq!(node.current_term, 5);
        assert_eq!(node.voted_for, None);
        assert!(node.votes_received.is_empty());
    }
}

// =============================================================================
// SECTION 6: LOG REPLICATION (LEADER SIDE)
// =============================================================================

mod log_replication {
    use super::*;

    #[test]
    fn propose_adds_to_log() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        elect(&mut node, 2);

        let entry = node.propose(cmd("key", "value")).unwrap();

        assert_eq!(entry.term, 1);
        assert_eq!(entry.index, 1);
        assert_eq!(entry.command, cmd("key", "value"));
        assert_eq!(node.log.len(), 1);
    }

    #[test]
    fn propose_increments_index() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        elect(&mut node, 2);

        for i in 0..3 {
            node.propose(cmd("k", &i.to_string())).unwrap();
        }

        let indexes: Vec<u64> = node.log.iter().map(|e| e.index).collect();
        assert_eq!(indexes, vec![1, 2, 3]);
    }

    #[test]
    fn follower_cannot_propose() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        let result = node.propose(cmd("k", "v"));
        assert!(matches!(result, Err(RaftError::NotLeader { node: 1, leader: None })));
        assert!(node.log.is_empty());
    }

    #[test]
    fn caught_up_peer_gets_empty_heartbeat() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        elect(&mut node, 2);

        let heartbeat = node.create_append_entries(2).unwrap();

        assert!(heartbeat.is_heartbeat());
        match heartbeat {
            RaftMessage::AppendEntries { term, leader_id, prev_log_index, .. } => {
                assert_eq!(term, 1);
                assert_eq!(leader_id, 1);
                assert_eq!(prev_log_index, 0);
            }
            other => panic!("expected AppendEntries, got {other:?}"),
        }
    }

    #[test]
    fn create_append_entries_includes_pending_entries() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        elect(&mut node, 2);
        node.propose(cmd("a", "1")).unwrap();
        node.propose(cmd("b", "2")).unwrap();

        match node.create_append_entries(2).unwrap() {
            RaftMessage::AppendEntries { entries, .. } => assert_eq!(entries.len(), 2),
            other => panic!("expected AppendEntries, got {other:?}"),
        }
    }

    #[test]
    fn append_entries_respect_batch_limit() {
        let config = RaftConfig { max_append_entries: 2, ..RaftConfig::default() };
        let mut node = RaftNode::with_config(1, vec![1, 2, 3], config).unwrap();
        elect(&mut node, 2);
        for i in 0..5 {
            node.propose(cmd("k", &i.to_string())).unwrap();
        }

        match node.create_append_entries(3).unwrap() {
            RaftMessage::AppendEntries { entries, .. } => assert_eq!(entries.len(), 2),
            other => panic!("expected AppendEntries, got {other:?}"),
        }
    }

    #[test]
    fn non_leader_cannot_create_append_entries() {
        let node = RaftNode::new(1, vec![1, 2, 3]);
        assert!(node.create_append_entries(2).is_none());
        assert!(node.broadcast_append_entries().is_empty());
    }
}

// =============================================================================
// SECTION 7: APPEND ENTRIES HANDLING (FOLLOWER SIDE)
// =============================================================================

mod append_entries_handling {
    use super::*;

    fn success(response: &RaftMessage) -> bool {
        match response {
            RaftMessage::AppendEntriesResponse { success, .. } => *success,
            other => panic!("expected AppendEntriesResponse, got {other:?}"),
        }
    }

    #[test]
    fn reject_append_entries_with_lower_term() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.current_term = 5;

        let (response, should_reset) =
            node.handle_append_entries(3, 2, 0, 0, vec![], 0).unwrap();

        assert_eq!(
            response,
            RaftMessage::AppendEntriesResponse { term: 5, success: false, match_index: 0 }
        );
        assert!(!should_reset);
    }

    #[test]
    fn accept_heartbeat_from_valid_leader() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);

        let (response, should_reset) =
            node.handle_append_entries(1, 2, 0, 0, vec![], 0).unwrap();

        assert!(success(&response));
        assert!(should_reset);
        assert_eq!(node.leader_id, Some(2));
    }

    #[test]
    fn candidate_steps_down_on_append_entries() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.start_election().unwrap();

        node.handle_append_entries(1, 2, 0, 0, vec![], 0).unwrap();

        assert_eq!(node.state, NodeState::Follower);
        assert_eq!(node.current_term, 1);
    }

    #[test]
    fn reject_when_prev_index_beyond_log() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);

        let (response, _) = node
            .handle_append_entries(1, 2, 3, 1, vec![LogEntry::new(1, 4, cmd("a", "1"))], 0)
            .unwrap();

        assert!(!success(&response));
        assert!(node.log.is_empty());
    }

    #[test]
    fn reject_when_prev_term_differs() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.log.push(LogEntry::new(1, 1, cmd("a", "1")));
        node.current_term = 1;

        let (response, _) = node.handle_append_entries(1, 2, 1, 99, vec![], 0).unwrap();

        assert!(!success(&response));
    }

    #[test]
    fn append_entries_adds_new_entries() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        let entries = vec![
            LogEntry::new(1, 1, cmd("a", "1")),
            LogEntry::new(1, 2, cmd("b", "2")),
        ];

        let (response, _) = node.handle_append_entries(1, 2, 0, 0, entries, 0).unwrap();

        assert_eq!(
            response,
            RaftMessage::AppendEntriesResponse { term: 1, success: true, match_index: 2 }
        );
        assert_eq!(node.log.len(), 2);
        assert_eq!(node.log[1].command, cmd("b", "2"));
    }

    #[test]
    fn append_entries_truncates_conflicting_entries() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.log.push(LogEntry::new(1, 1, cmd("old", "1")));
        node.log.push(LogEntry::new(1, 2, cmd("old", "2")));
        node.log.push(LogEntry::new(1, 3, cmd("old", "3")));
        node.current_term = 1;

        let entries = vec![LogEntry::new(2, 2, cmd("new", "2"))];
        node.handle_append_entries(2, 2, 1, 1, entries, 0).unwrap();

        assert_eq!(node.log.len(), 2);
        assert_eq!(node.log[1].term, 2);
        assert_eq!(node.log[1].command, cmd("new", "2"));
    }

    #[test]
    fn duplicate_append_keeps_matching_suffix() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.log.push(LogEntry::new(1, 1, cmd("a", "1")));
        node.log.push(LogEntry::new(1, 2, cmd("b", "2")));
        node.current_term = 1;

        let (response, _) = node
            .handle_append_entries(1, 2, 0, 0, vec![LogEntry::new(1, 1, cmd("a", "1"))], 0)
            .unwrap();

        assert!(success(&response));
        assert_eq!(node.log.len(), 2);
    }

    #[test]
    fn append_entries_updates_commit_index_and_applies() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.log.push(LogEntry::new(1, 1, cmd("role", "engineer")));

        node.handle_append_entries(1, 2, 1, 1, vec![], 1).unwrap();

        assert_eq!(node.commit_index, 1);
        assert_eq!(node.last_applied, 1);
        assert_eq!(node.state_machine.get("role"), Some(&json!("engineer")));
    }

    #[test]
    fn commit_index_capped_at_matched_prefix() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.log.push(LogEntry::new(1, 1, cmd("a", "1")));

        node.handle_append_entries(1, 2, 1, 1, vec![], 100).unwrap();

        assert_eq!(node.commit_index, 1);
    }

    #[test]
    fn direct_append_entry_enforces_log_matching() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);

        assert!(!node.append_entry(1, 1, 1, LogEntry::new(1, 2, cmd("b", "2"))).unwrap());
        assert!(node.append_entry(1, 0, 0, LogEntry::new(1, 1, cmd("a", "1"))).unwrap());
        assert!(node.append_entry(1, 1, 1, LogEntry::new(1, 2, cmd("b", "2"))).unwrap());
        assert_eq!(node.last_log_index(), 2);
        assert_eq!(node.commit_index, 0, "direct appends carry no commit");
    }
}

// =============================================================================
// SECTION 8: APPEND ENTRIES RESPONSE HANDLING
// =============================================================================

mod append_entries_response {
    use super::*;

    #[test]
    fn success_response_updates_match_index() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        elect(&mut node, 2);
        node.propose(cmd("k", "v")).unwrap();

        node.handle_append_entries_response(1, true, 2, 1).unwrap();

        assert_eq!(node.match_index.get(&2), Some(&1));
        assert_eq!(node.next_index.get(&2), Some(&2));
    }

    #[test]
    fn failure_response_decrements_next_index() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        elect(&mut node, 2);
        node.propose(cmd("k", "v")).unwrap();
        node.next_index.insert(2, 5);

        node.handle_append_entries_response(1, false, 2, 0).unwrap();

        assert_eq!(node.next_index.get(&2), Some(&4));
    }

    #[test]
    fn next_index_never_drops_below_one() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        elect(&mut node, 2);

        node.handle_append_entries_response(1, false, 2, 0).unwrap();
        node.handle_append_entries_response(1, false, 2, 0).unwrap();

        assert_eq!(node.next_index.get(&2), Some(&1));
    }

    #[test]
    fn higher_term_response_causes_step_down() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        elect(&mut node, 2);

        node.handle_append_entries_response(5, false, 2, 0).unwrap();

        assert_eq!(node.state, NodeState::Follower);
        assert_eq!(node.current_term, 5);
    }

    #[test]
    fn non_leader_ignores_append_entries_response() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        assert!(!node.handle_append_entries_response(0, true, 2, 1).unwrap());
    }
}

// =============================================================================
// SECTION 9: COMMIT INDEX ADVANCEMENT
// =============================================================================

mod commit_advancement {
    use super::*;

    #[test]
    fn commit_on_majority_replication() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        elect(&mut node, 2);
        node.propose(cmd("role", "engineer")).unwrap();

        let updated = node.handle_append_entries_response(1, true, 2, 1).unwrap();

        assert!(updated);
        assert_eq!(node.commit_index, 1);
        assert_eq!(node.state_machine.get("role"), Some(&json!("engineer")));
    }

    #[test]
    fn no_commit_without_quorum() {
        let mut node = RaftNode::new(1, vec![1, 2, 3, 4, 5]);
        node.start_election().unwrap();
        node.handle_vote_response(1, true, 2).unwrap();
        node.handle_vote_response(1, true, 3).unwrap();
        node.propose(cmd("k", "v")).unwrap();

        let updated = node.handle_append_entries_response(1, true, 2, 1).unwrap();

        assert!(!updated);
        assert_eq!(node.commit_index, 0);
        assert!(node.state_machine.is_empty());
    }

    #[test]
    fn entries_from_previous_term_commit_only_behind_current_term() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.log.push(LogEntry::new(1, 1, cmd("old", "1")));
        node.current_term = 1;
        elect(&mut node, 2); // term 2

        assert!(!node.handle_append_entries_response(2, true, 2, 1).unwrap());
        assert_eq!(node.commit_index, 0);

        node.propose(cmd("new", "2")).unwrap();
        assert!(node.handle_append_entries_response(2, true, 2, 2).unwrap());
        assert_eq!(node.commit_index, 2);
        assert_eq!(node.last_applied, 2);
    }

    #[test]
    fn single_node_commits_on_propose() {
        let mut node = RaftNode::new(1, vec![1]);
        node.start_election().unwrap();

        node.propose(cmd("k", "v")).unwrap();

        assert_eq!(node.commit_index, 1);
        assert_eq!(node.last_applied, 1);
    }
}

// =============================================================================
// SECTION 10: LOG HELPER FUNCTIONS
// =============================================================================

mod log_helpers {
    use super::*;

    #[test]
    fn last_log_index_and_term() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        assert_eq!(node.last_log_index(), 0);
        assert_eq!(node.last_log_term(), 0);

        node.log.push(LogEntry::new(3, 1, cmd("a", "1")));
        node.log.push(LogEntry::new(5, 2, cmd("b", "2")));

        assert_eq!(node.last_log_index(), 2);
        assert_eq!(node.last_log_term(), 5);
    }

    #[test]
    fn get_entry_and_term() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.log.push(LogEntry::new(5, 1, cmd("a", "1")));

        assert_eq!(node.get_entry(1).map(|e| e.term), Some(5));
        assert!(node.get_entry(0).is_none());
        assert!(node.get_entry(2).is_none());
        assert_eq!(node.get_term_at(1), 5);
        assert_eq!(node.get_term_at(100), 0);
    }
}

// =============================================================================
// SECTION 11: STATE MACHINE APPLICATION
// =============================================================================

mod state_machine {
    use super::*;

    #[test]
    fn apply_committed_returns_entries_in_order() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.log.push(LogEntry::new(1, 1, cmd("a", "1")));
        node.log.push(LogEntry::new(1, 2, cmd("a", "2")));
        node.commit_index = 2;

        let applied = node.apply_committed();

        assert_eq!(applied.iter().map(|e| e.index).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(node.last_applied, 2);
        assert_eq!(node.state_machine.get("a"), Some(&json!("2")));
    }

    #[test]
    fn apply_committed_is_idempotent() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.log.push(LogEntry::new(1, 1, cmd("a", "1")));
        node.commit_index = 1;

        assert_eq!(node.apply_committed().len(), 1);
        assert!(node.apply_committed().is_empty());
    }

    #[test]
    fn nothing_applied_beyond_commit() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.log.push(LogEntry::new(1, 1, cmd("a", "1")));
        node.log.push(LogEntry::new(1, 2, cmd("b", "2")));
        node.commit_index = 1;

        node.apply_committed();

        assert_eq!(node.last_applied, 1);
        assert!(node.state_machine.get("b").is_none());
    }
}

// =============================================================================
// SECTION 12: DRIVERS (TICK AND STEP)
// =============================================================================

mod drivers {
    use super::*;

    #[test]
    fn leader_heartbeats_every_interval() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        elect(&mut node, 2);

        let mut rounds = 0;
        for _ in 0..100 {
            let out = node.tick().unwrap();
            if !out.is_empty() {
                assert_eq!(out.len(), 2);
                assert!(out.iter().all(|e| e.message.is_heartbeat()));
                rounds += 1;
            }
        }
        assert_eq!(rounds, 2);
    }

    #[test]
    fn heartbeat_resets_follower_timer() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        for _ in 0..140 {
            assert!(node.tick().unwrap().is_empty());
        }
        node.handle_append_entries(1, 2, 0, 0, vec![], 0).unwrap();

        assert!(node.ticks_until_election() >= 150);
    }

    #[test]
    fn step_answers_vote_request() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        let request = RaftMessage::VoteRequest {
            term: 1,
            candidate_id: 2,
            last_log_index: 0,
            last_log_term: 0,
        };

        let out = node.step(2, request).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, 2);
        assert_eq!(out[0].message, RaftMessage::VoteResponse { term: 1, vote_granted: true });
    }

    #[test]
    fn winning_vote_triggers_heartbeats() {
        let mut node = RaftNode::new(1, vec![1, 2, 3]);
        node.start_election().unwrap();

        let out = node
            .step(2, RaftMessage::VoteResponse { term: 1, vote_granted: true })
            .unwrap();

        assert!(node.is_leader());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn rejected_append_is_retried_with_earlier_prefix() {
        let mut leader = RaftNode::new(1, vec![1, 2, 3]);
        leader.log.push(LogEntry::new(1, 1, cmd("a", "1")));
        leader.current_term = 1;
        elect(&mut leader, 2);
        leader.propose(cmd("b", "2")).unwrap();
        leader.next_index.insert(3, 2);

        let out = leader
            .step(3, RaftMessage::AppendEntriesResponse { term: 2, success: false, match_index: 0 })
            .unwrap();

        assert_eq!(out.len(), 1);
        match &out[0].message {
            RaftMessage::AppendEntries { prev_log_index, entries, .. } => {
                assert_eq!(*prev_log_index, 0);
                assert_eq!(entries.len(), 2);
            }
            other => panic!("expected AppendEntries, got {other:?}"),
        }
    }
}
