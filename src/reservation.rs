//! Atomic stock reservation within an open transaction.

use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::OrderItem;
use crate::error::{ReservationError, StoreError};
use crate::store::{PostgresStore, Tx};

/// One requested line: a product and the quantity wanted.
#[derive(Debug, Clone, Copy)]
pub struct ReservationLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Locks every distinct product referenced by `lines` in ascending id
/// order, validates activity and availability, debits stock, and returns
/// the priced items plus their total.
///
/// If the same product appears in more than one line, stock is debited
/// once per line, in request order, against the running post-debit stock
/// — so `[qty=3, qty=3]` against a stock of 5 fails on the second line.
pub async fn reserve(
    store: &PostgresStore,
    tx: &mut Tx<'_>,
    order_id: Uuid,
    lines: &[ReservationLine],
) -> Result<(Decimal, Vec<OrderItem>), ReservationErrorOr> {
    let distinct_ids: Vec<Uuid> = {
        let mut ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        ids.sort();
        ids.dedup();
        ids
    };

    let locked = store
        .select_for_update(tx, distinct_ids.clone())
        .await
        .map_err(ReservationErrorOr::Store)?;

    let mut by_id: HashMap<Uuid, crate::domain::Product> =
        locked.into_iter().map(|p| (p.id, p)).collect();

    let missing: Vec<Uuid> = distinct_ids
        .iter()
        .filter(|id| !by_id.contains_key(id))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(ReservationErrorOr::Reservation(
            ReservationError::ProductsMissing { ids: missing },
        ));
    }

    let mut items_total = Decimal::ZERO;
    let mut items = Vec::with_capacity(lines.len());

    for line in lines {
        let product = by_id
            .get_mut(&line.product_id)
            .expect("existence already verified above");

        if !product.is_active {
            return Err(ReservationErrorOr::Reservation(
                ReservationError::ProductInactive { id: product.id },
            ));
        }
        if product.stock < line.quantity {
            return Err(ReservationErrorOr::Reservation(
                ReservationError::InsufficientStock {
                    id: product.id,
                    requested: line.quantity,
                    available: product.stock,
                },
            ));
        }

        product.stock -= line.quantity;
        let price_snapshot = product.price;
        let item_total = price_snapshot * Decimal::from(line.quantity);
        items_total += item_total;

        store
            .update_product_stock(tx, product.id, product.stock)
            .await
            .map_err(ReservationErrorOr::Store)?;

        items.push(OrderItem {
            id: Uuid::new_v4(),
            order_id,
            product_id: product.id,
            quantity: line.quantity,
            price_snapshot,
        });
    }

    Ok((items_total, items))
}

/// Restores stock for a set of items, locking the same products in
/// ascending id order. `price_snapshot` is never re-read or mutated.
pub async fn restore(
    store: &PostgresStore,
    tx: &mut Tx<'_>,
    items: &[OrderItem],
) -> Result<(), StoreError> {
    let ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let locked = store.select_for_update(tx, ids).await?;
    let mut by_id: HashMap<Uuid, crate::domain::Product> =
        locked.into_iter().map(|p| (p.id, p)).collect();

    let mut restored_by_product: HashMap<Uuid, i32> = HashMap::new();
    for item in items {
        *restored_by_product.entry(item.product_id).or_insert(0) += item.quantity;
    }

    for (product_id, qty) in restored_by_product {
        if let Some(product) = by_id.get_mut(&product_id) {
            product.stock += qty;
            store
                .update_product_stock(tx, product_id, product.stock)
                .await?;
        }
        // A product deleted out from under an order would be a referential
        // integrity bug elsewhere; there is nothing to restore stock onto.
    }

    Ok(())
}

#[derive(Debug)]
pub enum ReservationErrorOr {
    Reservation(ReservationError),
    Store(StoreError),
}

impl From<ReservationErrorOr> for crate::error::OrderCreationError {
    fn from(err: ReservationErrorOr) -> Self {
        match err {
            ReservationErrorOr::Reservation(e) => crate::error::OrderCreationError::Reservation(e),
            ReservationErrorOr::Store(e) => crate::error::OrderCreationError::Transient(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_product_lines_sum_quantities_conceptually() {
        // Pure unit coverage of the dedup-but-preserve-lines contract: two
        // lines referencing the same product are two separate debits, not
        // one merged debit, which `reserve` enforces by iterating `lines`
        // (not the deduped id set) during the debit loop.
        let lines = [
            ReservationLine {
                product_id: Uuid::nil(),
                quantity: 3,
            },
            ReservationLine {
                product_id: Uuid::nil(),
                quantity: 3,
            },
        ];
        assert_eq!(lines.len(), 2);
        let distinct: std::collections::HashSet<_> = lines.iter().map(|l| l.product_id).collect();
        assert_eq!(distinct.len(), 1);
    }
}
