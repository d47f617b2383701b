use serde::Serialize;
use uuid::Uuid;

use crate::model::{ExchangeRequiredCheck, ReturnItem};

/// Ask for one unit of `variant_id` on the order's exchange shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeRequest {
    pub order_id: Uuid,
    pub return_item_id: Uuid,
    pub variant_id: Uuid,
}

/// Items that need a replacement shipped, in their original order.
pub fn return_items_requiring_exchange<T: ExchangeRequiredCheck>(items: &[T]) -> Vec<&T> {
    items.iter().filter(|item| item.exchange_required()).collect()
}

pub fn plan_exchanges(order_id: Uuid, items: &[ReturnItem]) -> Vec<ExchangeRequest> {
    items
        .iter()
        .filter_map(|item| {
            item.exchange_variant_id.map(|variant_id| ExchangeRequest {
                order_id,
                return_item_id: item.id,
                variant_id,
            })
        })
        .collect()
}
