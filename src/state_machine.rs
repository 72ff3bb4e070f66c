//! Order status transitions and the stock-compensation they trigger.

use crate::domain::{OrderEvent, OrderStatus};
use crate::error::IllegalTransition;

/// Pure transition table. Any pair not listed here is rejected.
///
/// `created` is never reached on the write path — orders are created
/// directly as `reserved` (see `OrderWriter::create`) — but `Cancel` still
/// accepts it as a formality, restoring no stock since `created` never
/// holds a reservation.
pub fn transition(current: OrderStatus, event: OrderEvent) -> Result<OrderStatus, IllegalTransition> {
    use OrderEvent::*;
    use OrderStatus::*;

    let next = match (current, event) {
        (Reserved, PaymentInitiated) => PaymentPending,
        (Reserved, PaymentSucceeded) | (PaymentPending, PaymentSucceeded) => Paid,
        (Reserved, PaymentFailed) | (PaymentPending, PaymentFailed) => Canceled,
        (Created, Cancel) | (Reserved, Cancel) | (PaymentPending, Cancel) => Canceled,
        _ => {
            return Err(IllegalTransition {
                from: current,
                event,
            })
        }
    };

    Ok(next)
}

/// Whether applying `event` from `current` would restore stock, i.e.
/// whether `current` holds a reservation that the resulting status does
/// not.
pub fn restores_stock(current: OrderStatus, event: OrderEvent) -> bool {
    current.holds_stock() && matches!(event, OrderEvent::PaymentFailed | OrderEvent::Cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderEvent::*;
    use OrderStatus::*;

    #[test]
    fn happy_path_to_paid() {
        assert_eq!(transition(Reserved, PaymentInitiated), Ok(PaymentPending));
        assert_eq!(transition(PaymentPending, PaymentSucceeded), Ok(Paid));
    }

    #[test]
    fn payment_failure_cancels() {
        assert_eq!(transition(Reserved, PaymentFailed), Ok(Canceled));
        assert_eq!(transition(PaymentPending, PaymentFailed), Ok(Canceled));
    }

    #[test]
    fn terminal_states_reject_everything() {
        for event in [PaymentInitiated, PaymentSucceeded, PaymentFailed, Cancel] {
            assert!(transition(Paid, event).is_err());
            assert!(transition(Canceled, event).is_err());
        }
    }

    #[test]
    fn cancel_from_created_restores_no_stock() {
        assert_eq!(transition(Created, Cancel), Ok(Canceled));
        assert!(!restores_stock(Created, Cancel));
    }

    #[test]
    fn cancel_from_reserved_restores_stock() {
        assert!(restores_stock(Reserved, Cancel));
        assert!(restores_stock(PaymentPending, Cancel));
    }

    #[test]
    fn payment_events_disallowed_from_created() {
        assert!(transition(Created, PaymentInitiated).is_err());
        assert!(transition(Created, PaymentSucceeded).is_err());
        assert!(transition(Created, PaymentFailed).is_err());
    }

    #[test]
    fn double_payment_initiation_rejected() {
        assert!(transition(PaymentPending, PaymentInitiated).is_err());
    }
}
