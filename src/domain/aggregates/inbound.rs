//! Inbound (purchasing) cart, grouped by vendor.

use std::collections::BTreeMap;

use crate::domain::aggregates::CartError;
use crate::domain::value_objects::{CurrencyId, ItemId, Money, PartnerId, Quantity};

#[derive(Clone, Debug, PartialEq)]
pub struct InboundLine {
    pub item_id: ItemId,
    pub name: String,
    pub quantity: Quantity,
    pub price: Money,
    pub currency_id: CurrencyId,
    /// Falls back to `price` when the catalog has no cost.
    pub cost: Option<Money>,
    pub cost_currency_id: CurrencyId,
}

impl InboundLine {
    pub fn effective_cost(&self) -> &Money { self.cost.as_ref().unwrap_or(&self.price) }
}

#[derive(Clone, Debug, Default)]
pub struct InboundCart {
    vendors: BTreeMap<PartnerId, BTreeMap<ItemId, InboundLine>>,
}

impl InboundCart {
    pub fn new() -> Self { Self::default() }
    pub fn is_empty(&self) -> bool { self.vendors.is_empty() }
    pub fn vendor_count(&self) -> usize { self.vendors.len() }

    /// Vendor groups in vendor-id order, each with its lines in item-id order.
    pub fn vendors(&self) -> impl Iterator<Item = (PartnerId, Vec<&InboundLine>)> {
        self.vendors.iter().map(|(vendor, lines)| (*vendor, lines.values().collect()))
    }

    pub fn add(&mut self, vendor: PartnerId, line: InboundLine) -> Result<(), CartError> {
        if line.quantity.is_zero() { return Err(CartError::InvalidQuantity(line.item_id)); }
        let group = self.vendors.entry(vendor).or_default();
        match group.get_mut(&line.item_id) {
            Some(existing) => existing.quantity = existing.quantity.add(line.quantity.value()),
            None => { group.insert(line.item_id, line); }
        }
        Ok(())
    }

    pub fn update_quantity(&mut self, vendor: PartnerId, item_id: ItemId, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 { return self.remove(vendor, item_id); }
        let line = self.vendors.get_mut(&vendor).and_then(|g| g.get_mut(&item_id)).ok_or(CartError::ItemNotFound(item_id))?;
        line.quantity = Quantity::new(quantity);
        Ok(())
    }

    pub fn remove(&mut self, vendor: PartnerId, item_id: ItemId) -> Result<(), CartError> {
        let group = self.vendors.get_mut(&vendor).ok_or(CartError::ItemNotFound(item_id))?;
        group.remove(&item_id).ok_or(CartError::ItemNotFound(item_id))?;
        if group.is_empty() { self.vendors.remove(&vendor); }
        Ok(())
    }

    pub fn remove_vendor(&mut self, vendor: PartnerId) { self.vendors.remove(&vendor); }
    pub fn clear(&mut self) { self.vendors.clear(); }
}
