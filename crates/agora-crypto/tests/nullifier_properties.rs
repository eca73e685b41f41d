//! Property tests for nullifier derivation.

use std::collections::HashSet;

use agora_core::PollId;
use agora_crypto::{derive_nullifier, verify_nullifier, UserSecret};
use proptest::prelude::*;

proptest! {
    #[test]
    fn derive_then_verify(poll in "[A-Za-z0-9_-]{1,40}", bytes in prop::collection::vec(any::<u8>(), 32..64)) {
        let poll = PollId::new(poll).unwrap();
        let secret = UserSecret::from_slice(&bytes).unwrap();
        let n = derive_nullifier(&poll, &secret);
        prop_assert!(verify_nullifier(&poll, &secret, &n));
        prop_assert_eq!(n, derive_nullifier(&poll, &secret));
    }

    #[test]
    fn different_polls_give_different_nullifiers(a in "[a-z]{1,20}", b in "[a-z]{1,20}") {
        prop_assume!(a != b);
        let secret = UserSecret::generate();
        let na = derive_nullifier(&PollId::new(a).unwrap(), &secret);
        let nb = derive_nullifier(&PollId::new(b).unwrap(), &secret);
        prop_assert_ne!(na, nb);
    }
}

#[test]
fn no_collisions_across_a_large_sample() {
    let polls: Vec<PollId> = (0..20).map(|i| PollId::new(format!("poll-{i}")).unwrap()).collect();
    let secrets: Vec<UserSecret> = (0..250).map(|_| UserSecret::generate()).collect();
    let mut seen = HashSet::new();
    for poll in &polls {
        for secret in &secrets {
            assert!(seen.insert(derive_nullifier(poll, secret)));
        }
    }
    assert_eq!(seen.len(), 5000);
}
