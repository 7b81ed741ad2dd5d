//! Property and table tests for the order state machine and totals.

use common::{CustomerId, ProductId};
use domain::{CustomerTier, Money, Order, OrderError, OrderLine, OrderStatus, PricingPolicy};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Action {
    Confirm,
    Process,
    Ship,
    Deliver,
    Cancel,
}

const ACTIONS: [Action; 5] = [
    Action::Confirm,
    Action::Process,
    Action::Ship,
    Action::Deliver,
    Action::Cancel,
];

fn apply(order: &mut Order, action: Action) -> Result<(), OrderError> {
    match action {
        Action::Confirm => order.confirm(),
        Action::Process => order.process(),
        Action::Ship => order.ship("TRK0001"),
        Action::Deliver => order.deliver(),
        Action::Cancel => order.cancel("changed mind"),
    }
}

/// Status the action leads to, or `None` when the action is illegal.
fn expected(status: OrderStatus, action: Action) -> Option<OrderStatus> {
    use OrderStatus::*;
    match (status, action) {
        (Pending, Action::Confirm) => Some(Confirmed),
        (Confirmed, Action::Process) => Some(Processing),
        (Processing, Action::Ship) => Some(Shipped),
        (Shipped, Action::Deliver) => Some(Delivered),
        (Delivered | Cancelled, Action::Cancel) => None,
        (_, Action::Cancel) => Some(Cancelled),
        _ => None,
    }
}

fn seeded_order(lines: &[(i64, u32)]) -> Order {
    let mut order = Order::new(CustomerId::new(1), "Ada Lovelace", "ada@example.com");
    for (i, (cents, quantity)) in lines.iter().enumerate() {
        order
            .add_line(OrderLine::new(
                ProductId::new(i as i64 + 1),
                format!("Product {i}"),
                format!("SKU-{i}"),
                Money::from_cents(*cents),
                *quantity,
            ))
            .unwrap();
    }
    order
}

fn assert_totals_identity(order: &Order) {
    let lines: Money = order.lines().iter().map(OrderLine::subtotal).sum();
    assert_eq!(order.subtotal(), lines);
    assert_eq!(
        order.final_amount(),
        order.subtotal() - order.discount_amount() + order.tax_amount() + order.shipping_amount()
    );
}

mod state_machine {
    use super::*;

    #[test]
    fn test_every_status_action_pair_matches_table() {
        for start in OrderStatus::ALL {
            for action in ACTIONS {
                let mut order = seeded_order(&[(1000, 1)]);
                // Walk to the start status along the happy path.
                let path: &[Action] = match start {
                    OrderStatus::Pending => &[],
                    OrderStatus::Confirmed => &[Action::Confirm],
                    OrderStatus::Processing => &[Action::Confirm, Action::Process],
                    OrderStatus::Shipped => &[Action::Confirm, Action::Process, Action::Ship],
                    OrderStatus::Delivered => &[
                        Action::Confirm,
                        Action::Process,
                        Action::Ship,
                        Action::Deliver,
                    ],
                    OrderStatus::Cancelled => &[Action::Cancel],
                };
                for step in path {
                    apply(&mut order, *step).unwrap();
                }
                assert_eq!(order.status(), start);

                let before = order.clone();
                let result = apply(&mut order, action);
                match expected(start, action) {
                    Some(next) => {
                        assert!(result.is_ok(), "{start} {action:?} should succeed");
                        assert_eq!(order.status(), next);
                        assert!(start.can_transition_to(next));
                    }
                    None => {
                        assert!(
                            matches!(result, Err(OrderError::InvalidStateTransition { .. })),
                            "{start} {action:?} should be rejected"
                        );
                        assert_eq!(order, before, "rejected call must not mutate");
                    }
                }
            }
        }
    }

    #[test]
    fn test_terminal_statuses_reject_everything() {
        for start in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            assert!(start.is_terminal());
            for next in OrderStatus::ALL {
                assert!(!start.can_transition_to(next));
            }
        }
    }
}

mod totals {
    use super::*;

    proptest! {
        #[test]
        fn test_final_amount_identity_holds_after_pricing(
            lines in prop::collection::vec((0i64..50_000, 1u32..20), 1..8),
            tier in prop::sample::select(vec![
                CustomerTier::Bronze,
                CustomerTier::Silver,
                CustomerTier::Gold,
                CustomerTier::Platinum,
            ]),
        ) {
            let mut order = seeded_order(&lines);
            PricingPolicy::default().apply(&mut order, tier).unwrap();
            assert_totals_identity(&order);
            prop_assert!(order.discount_amount() <= order.subtotal());
            prop_assert!(!order.final_amount().is_negative());
        }

        #[test]
        fn test_identity_survives_any_action_sequence(
            actions in prop::collection::vec(0usize..5, 0..10),
        ) {
            let mut order = seeded_order(&[(1999, 2), (500, 1)]);
            PricingPolicy::default().apply(&mut order, CustomerTier::Gold).unwrap();
            let priced = order.final_amount();

            for index in actions {
                let _ = apply(&mut order, ACTIONS[index]);
                assert_totals_identity(&order);
            }
            prop_assert_eq!(order.final_amount(), priced);
        }

        #[test]
        fn test_percent_never_exceeds_amount(cents in 0i64..10_000_000, bps in 0u32..=10_000) {
            let part = Money::from_cents(cents).percent(bps);
            prop_assert!(part.cents() <= cents);
            prop_assert!(part.cents() >= 0);
        }
    }
}
