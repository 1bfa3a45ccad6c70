//! Side-pot partitioning: worked examples plus a property check that
//! no chips are ever created or destroyed, whatever the stack sizes.

use proptest::prelude::*;

use holdem_sync::game::{Blinds, Chips, GameId, Phase, PlayerId, RulesEngine};

fn table(stacks: &[Chips]) -> (RulesEngine, Vec<PlayerId>) {
    let mut engine = RulesEngine::new(GameId::new(), Blinds { small: 5, big: 10 }, 9);
    let ids: Vec<PlayerId> = stacks
        .iter()
        .enumerate()
        .map(|(seat, &stack)| {
            let id = PlayerId::new();
            engine
                .add_player(id, format!("p{seat}").into(), seat, stack)
                .unwrap();
            id
        })
        .collect();
    (engine, ids)
}

/// Shove every stack in preflop and let the board run out.
fn all_in_preflop(engine: &mut RulesEngine) {
    while engine.phase() == Phase::Preflop {
        if engine.is_betting_round_complete() {
            engine.advance_phase().unwrap();
            break;
        }
        let actor = engine.current_actor().expect("someone on the move");
        assert!(engine.all_in(actor));
        if !engine.is_betting_round_complete() {
            engine.set_next_player().unwrap();
        }
    }
    assert_eq!(engine.phase(), Phase::Ended);
}

#[test]
fn short_stack_caps_the_main_pot() {
    let (mut engine, _) = table(&[50, 200, 200]);
    engine.start_new_hand().unwrap();
    all_in_preflop(&mut engine);

    let snapshot = engine.snapshot();
    let amounts: Vec<Chips> = snapshot.side_pots.iter().map(|p| p.amount).collect();
    let eligible: Vec<usize> = snapshot.side_pots.iter().map(|p| p.eligible.len()).collect();
    // 50 from each of three seats, then 150 more from the two deep
    // stacks between themselves.
    assert_eq!(amounts, vec![150, 300]);
    assert_eq!(eligible, vec![3, 2]);
    assert_eq!(
        engine.seats().iter().map(|p| p.stack).sum::<Chips>(),
        50 + 200 + 200
    );
}

#[test]
fn staggered_stacks_build_one_pot_per_tier() {
    let (mut engine, _) = table(&[30, 80, 150, 400]);
    engine.start_new_hand().unwrap();
    all_in_preflop(&mut engine);

    let snapshot = engine.snapshot();
    let amounts: Vec<Chips> = snapshot.side_pots.iter().map(|p| p.amount).collect();
    let eligible: Vec<usize> = snapshot.side_pots.iter().map(|p| p.eligible.len()).collect();
    // Tiers at 30, 80, 150; the deepest stack's overage comes back to
    // it uncontested in the last pot.
    assert_eq!(amounts, vec![120, 150, 140, 250]);
    assert_eq!(eligible, vec![4, 3, 2, 1]);
    assert_eq!(
        engine.seats().iter().map(|p| p.stack).sum::<Chips>(),
        30 + 80 + 150 + 400
    );
}

#[test]
fn folded_chips_fill_pots_without_eligibility() {
    let (mut engine, _) = table(&[600, 600, 600]);
    engine.start_new_hand().unwrap();

    // Dealer raises, small blind calls, big blind folds its 10.
    let dealer = engine.current_actor().unwrap();
    assert!(engine.raise(dealer, 20));
    engine.set_next_player().unwrap();
    let sb = engine.current_actor().unwrap();
    assert!(engine.call(sb));
    engine.set_next_player().unwrap();
    let bb = engine.current_actor().unwrap();
    assert!(engine.fold(bb));
    assert!(engine.is_betting_round_complete());

    // Check it down from the flop.
    while matches!(engine.phase(), Phase::Preflop | Phase::Flop | Phase::Turn | Phase::River) {
        engine.advance_phase().unwrap();
        while !engine.is_betting_round_complete() {
            let actor = engine.current_actor().unwrap();
            assert!(engine.check(actor));
            if !engine.is_betting_round_complete() {
                engine.set_next_player().unwrap();
            }
        }
    }

    let snapshot = engine.snapshot();
    let pots = &snapshot.side_pots;
    // One pot: 30 each from the two contenders plus the folded 10.
    assert_eq!(pots.iter().map(|p| p.amount).sum::<Chips>(), 70);
    for pot in pots {
        assert!(!pot.eligible.iter().any(|id| *id == bb));
    }
    assert_eq!(
        engine.seats().iter().map(|p| p.stack).sum::<Chips>(),
        3 * 600
    );
}

#[test]
fn departed_player_chips_stay_in_the_pot() {
    let (mut engine, _) = table(&[600, 600, 600]);
    engine.start_new_hand().unwrap();

    // Everyone puts in 30 preflop.
    let dealer = engine.current_actor().unwrap();
    assert!(engine.raise(dealer, 20));
    engine.set_next_player().unwrap();
    while !engine.is_betting_round_complete() {
        let actor = engine.current_actor().unwrap();
        assert!(engine.call(actor));
        if !engine.is_betting_round_complete() {
            engine.set_next_player().unwrap();
        }
    }

    // The dealer walks away mid-hand; its 30 stays behind.
    let dealer_stack = engine
        .seats()
        .iter()
        .find(|p| p.id == dealer)
        .unwrap()
        .stack;
    assert!(engine.remove_player(dealer));
    assert_eq!(engine.snapshot().pot, 90);

    while matches!(engine.phase(), Phase::Preflop | Phase::Flop | Phase::Turn | Phase::River) {
        engine.advance_phase().unwrap();
        while !engine.is_betting_round_complete() {
            let actor = engine.current_actor().unwrap();
            assert!(engine.check(actor));
            if !engine.is_betting_round_complete() {
                engine.set_next_player().unwrap();
            }
        }
    }

    assert_eq!(engine.phase(), Phase::Ended);
    // The two remaining seats split everything the table ever held,
    // minus what the departed player took with them.
    assert_eq!(
        engine.seats().iter().map(|p| p.stack).sum::<Chips>(),
        3 * 600 - dealer_stack
    );
}

proptest! {
    #[test]
    fn all_in_showdowns_conserve_chips(stacks in prop::collection::vec(1u32..500, 2..6)) {
        let bankroll: Chips = stacks.iter().sum();
        let (mut engine, _) = table(&stacks);
        engine.start_new_hand().unwrap();
        all_in_preflop(&mut engine);

        let snapshot = engine.snapshot();
        prop_assert_eq!(
            engine.seats().iter().map(|p| p.stack).sum::<Chips>(),
            bankroll
        );
        prop_assert_eq!(snapshot.pot, 0);
        let mut previous_eligible = usize::MAX;
        for pot in &snapshot.side_pots {
            prop_assert!(!pot.eligible.is_empty());
            // Later tiers serve fewer and fewer deep stacks.
            prop_assert!(pot.eligible.len() <= previous_eligible);
            previous_eligible = pot.eligible.len();
        }
    }
}
