//! Competitive-quote alerts
//!
//! When the best pair does not cross but the fractional spread is inside
//! the configured cap, each best-price holder gets one informational
//! nudge naming the counter-price. Throttled to one alert per
//! (contract, order) per counter-price.

use std::collections::HashMap;

use rust_decimal::Decimal;

use types::contract::ContractId;
use types::events::CompetitiveQuote;
use types::ids::OrderId;
use types::numeric::Price;
use types::order::Order;

#[derive(Default)]
pub struct AlertThrottle {
    /// Last counter-price alerted per (contract, order).
    sent: HashMap<(ContractId, OrderId), Price>,
}

impl AlertThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts due for this spread pair, if any. Records what it returns so
    /// the same situation never alerts twice.
    pub fn collect(&mut self, bid: &Order, offer: &Order, cap: Decimal) -> Vec<CompetitiveQuote> {
        let Some(spread) = bid.price.fractional_spread_to(offer.price) else {
            return Vec::new();
        };
        if spread > cap {
            return Vec::new();
        }

        let mut alerts = Vec::new();
        if self.record(&bid.contract, bid.id, offer.price) {
            alerts.push(CompetitiveQuote {
                user: bid.owner,
                contract: bid.contract.clone(),
                order_id: bid.id,
                side: bid.side,
                your_price: bid.price,
                counter_price: offer.price,
                message: format!(
                    "Best offer on {} is {}; raising your bid from {} to {} would trade immediately.",
                    bid.contract, offer.price, bid.price, offer.price
                ),
            });
        }
        if self.record(&offer.contract, offer.id, bid.price) {
            alerts.push(CompetitiveQuote {
                user: offer.owner,
                contract: offer.contract.clone(),
                order_id: offer.id,
                side: offer.side,
                your_price: offer.price,
                counter_price: bid.price,
                message: format!(
                    "Best bid on {} is {}; lowering your offer from {} to {} would trade immediately.",
                    offer.contract, bid.price, offer.price, bid.price
                ),
            });
        }
        alerts
    }

    /// True when this counter-price has not been alerted for this order.
    fn record(&mut self, contract: &ContractId, order: OrderId, counter: Price) -> bool {
        let key = (contract.clone(), order);
        if self.sent.get(&key) == Some(&counter) {
            return false;
        }
        self.sent.insert(key, counter);
        true
    }
}
